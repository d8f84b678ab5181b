//! Full-rescan reconciliation.
//!
//! One pass walks the source folder, then inside a single transaction loads
//! the stored records, classifies every path against that snapshot and
//! applies the resulting inserts, updates and tombstones. Any failure rolls
//! the whole pass back.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use filetracker_model::{CollectionId, FileId, ReconcileReport, TrackedFile};

use crate::catalog::validate_source_folder;
use crate::database::infrastructure::sqlite::repositories::files::files_for_collection;
use crate::database::infrastructure::sqlite::repositories::truncate_to_millis;
use crate::database::path_key;
use crate::database::ports::collections::CollectionRepository;
use crate::database::sqlite::SqliteDatabase;
use crate::error::{Result, TrackerError};
use crate::scan::filters::PathFilter;
use crate::scan::locks::CollectionLocks;
use crate::scan::walk::{ObservedFile, walk_collection};

/// Default number of changed paths up to which a pass logs per-path detail.
pub const DEFAULT_REPORT_DETAIL_THRESHOLD: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    pub id: FileId,
    pub path: String,
    pub modified: DateTime<Utc>,
    /// The record was a tombstone and its path exists again.
    pub revived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTombstone {
    pub id: FileId,
    pub path: String,
}

/// Writes derived from one consistent snapshot of stored records.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub inserts: Vec<ObservedFile>,
    pub updates: Vec<PlannedUpdate>,
    pub tombstones: Vec<PlannedTombstone>,
    pub unchanged: usize,
}

impl ReconcilePlan {
    pub fn report(&self) -> ReconcileReport {
        ReconcileReport {
            new: self.inserts.len(),
            modified: self.updates.len(),
            unchanged: self.unchanged,
            removed: self.tombstones.len(),
        }
    }
}

/// Classify the observed files against the stored records.
///
/// - not stored: insert, dirty
/// - stored tombstone that exists again: revive, dirty, counted modified
/// - stored with an older modification time: update, dirty
/// - stored with an equal or newer time: unchanged
/// - stored live but not observed: tombstone, dirty
/// - stored tombstone still absent: untouched
pub fn plan(before: &[TrackedFile], observed: &[ObservedFile]) -> ReconcilePlan {
    let stored: HashMap<&str, &TrackedFile> = before
        .iter()
        .filter_map(|file| path_key(&file.file_path).map(|key| (key, file)))
        .collect();

    let mut plan = ReconcilePlan::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(observed.len());

    for file in observed {
        if !seen.insert(file.path.as_str()) {
            continue;
        }
        match stored.get(file.path.as_str()) {
            None => plan.inserts.push(file.clone()),
            Some(record) if record.deleted => plan.updates.push(PlannedUpdate {
                id: record.id,
                path: file.path.clone(),
                modified: file.modified,
                revived: true,
            }),
            Some(record) if file.modified > record.last_modified => {
                plan.updates.push(PlannedUpdate {
                    id: record.id,
                    path: file.path.clone(),
                    modified: file.modified,
                    revived: false,
                })
            }
            Some(_) => plan.unchanged += 1,
        }
    }

    for (path, record) in &stored {
        if record.deleted || seen.contains(path) {
            continue;
        }
        plan.tombstones.push(PlannedTombstone {
            id: record.id,
            path: (*path).to_string(),
        });
    }
    plan.tombstones.sort_by(|a, b| a.path.cmp(&b.path));

    plan
}

#[derive(Clone)]
pub struct Reconciler {
    db: Arc<SqliteDatabase>,
    collections: Arc<dyn CollectionRepository>,
    locks: CollectionLocks,
    report_detail_threshold: usize,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("db", &self.db)
            .field("report_detail_threshold", &self.report_detail_threshold)
            .finish()
    }
}

impl Reconciler {
    pub fn new(
        db: Arc<SqliteDatabase>,
        collections: Arc<dyn CollectionRepository>,
        locks: CollectionLocks,
    ) -> Self {
        Self {
            db,
            collections,
            locks,
            report_detail_threshold: DEFAULT_REPORT_DETAIL_THRESHOLD,
        }
    }

    pub fn with_report_detail_threshold(mut self, threshold: usize) -> Self {
        self.report_detail_threshold = threshold;
        self
    }

    /// Run one pass for `collection_id`. Two passes on the same collection
    /// never interleave.
    pub async fn reconcile(&self, collection_id: CollectionId) -> Result<ReconcileReport> {
        let _guard = self.locks.lock(collection_id).await;
        let started = Instant::now();

        let collection = self
            .collections
            .get(collection_id)
            .await?
            .ok_or(TrackerError::CollectionNotFound(collection_id))?;

        // An unmounted or deleted folder must not tombstone the collection.
        validate_source_folder(&collection.source_folder)?;

        let filter = PathFilter::for_collection(&collection, &[]);
        let walk = walk_collection(filter).await?;

        let mut tx = self.db.pool().begin().await?;

        let touched = sqlx::query("UPDATE collections SET updated_at = ? WHERE id = ?")
            .bind(truncate_to_millis(Utc::now()))
            .bind(collection_id.as_i64())
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(TrackerError::CollectionNotFound(collection_id));
        }

        let before = files_for_collection(&mut *tx, collection_id).await?;
        let plan = plan(&before, &walk.files);
        apply_plan(&mut *tx, collection_id, &plan).await?;
        tx.commit().await?;

        let report = plan.report();
        if report.changed() <= self.report_detail_threshold {
            log_plan_detail(collection_id, &plan);
        }
        info!(
            collection_id = %collection_id,
            new = report.new,
            modified = report.modified,
            unchanged = report.unchanged,
            removed = report.removed,
            skipped = walk.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reconciliation complete"
        );

        Ok(report)
    }

    /// Reconcile every collection, one at a time. A failing collection does
    /// not stop the others.
    pub async fn reconcile_all(
        &self,
    ) -> Result<Vec<(CollectionId, Result<ReconcileReport>)>> {
        let collections = self.collections.list().await?;
        let mut outcomes = Vec::with_capacity(collections.len());
        for collection in collections {
            let outcome = self.reconcile(collection.id).await;
            if let Err(err) = &outcome {
                warn!(collection_id = %collection.id, "Reconciliation failed: {err}");
            }
            outcomes.push((collection.id, outcome));
        }
        Ok(outcomes)
    }
}

async fn apply_plan(
    conn: &mut SqliteConnection,
    collection_id: CollectionId,
    plan: &ReconcilePlan,
) -> Result<()> {
    for file in &plan.inserts {
        sqlx::query(
            r#"
            INSERT INTO files
                (file_path, original_url, last_modified, dirty, deleted, collection_id)
            VALUES (?, NULL, ?, 1, 0, ?)
            ON CONFLICT (file_path, collection_id) DO UPDATE SET
                last_modified = excluded.last_modified,
                dirty = 1,
                deleted = 0
            "#,
        )
        .bind(&file.path)
        .bind(file.modified)
        .bind(collection_id.as_i64())
        .execute(&mut *conn)
        .await?;
    }

    for update in &plan.updates {
        sqlx::query("UPDATE files SET last_modified = ?, dirty = 1, deleted = 0 WHERE id = ?")
            .bind(update.modified)
            .bind(update.id.as_i64())
            .execute(&mut *conn)
            .await?;
    }

    for tombstone in &plan.tombstones {
        sqlx::query("UPDATE files SET deleted = 1, dirty = 1 WHERE id = ?")
            .bind(tombstone.id.as_i64())
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

fn log_plan_detail(collection_id: CollectionId, plan: &ReconcilePlan) {
    for file in &plan.inserts {
        debug!(collection_id = %collection_id, path = %file.path, "new");
    }
    for update in &plan.updates {
        let kind = if update.revived { "revived" } else { "modified" };
        debug!(collection_id = %collection_id, path = %update.path, kind, "modified");
    }
    for tombstone in &plan.tombstones {
        debug!(collection_id = %collection_id, path = %tombstone.path, "removed");
    }
}
