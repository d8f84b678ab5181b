use std::path::{MAIN_SEPARATOR, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use tracing::{debug, info};

use filetracker_model::{
    CollectionId, FileCounts, FileId, FileQuery, NewTrackedFile, TrackedFile,
};

use super::{is_foreign_key_violation, truncate_to_millis};
use crate::database::path_key;
use crate::database::ports::files::FileRepository;
use crate::error::{Result, TrackerError};

const SELECT_COLUMNS: &str = r#"
    SELECT id, file_path, original_url, last_modified, dirty, deleted, collection_id
    FROM files
"#;

#[derive(Clone, Debug)]
pub struct SqliteFileRepository {
    pool: SqlitePool,
}

impl SqliteFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn map_write_error(err: sqlx::Error, collection_id: CollectionId) -> TrackerError {
    if is_foreign_key_violation(&err) {
        TrackerError::CollectionNotFound(collection_id)
    } else {
        TrackerError::Database(err)
    }
}

/// Every record of a collection, tombstones included. Used by the
/// reconciler inside its transaction.
pub(crate) async fn files_for_collection<'e, E>(
    executor: E,
    collection_id: CollectionId,
) -> Result<Vec<TrackedFile>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query_as::<_, FileRow>(&format!(
        "{SELECT_COLUMNS} WHERE collection_id = ? ORDER BY file_path"
    ))
    .bind(collection_id.as_i64())
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

#[async_trait]
impl FileRepository for SqliteFileRepository {
    async fn record_change(
        &self,
        collection_id: CollectionId,
        file_path: &str,
        observed_at: DateTime<Utc>,
        deleted: bool,
    ) -> Result<FileId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO files
                (file_path, original_url, last_modified, dirty, deleted, collection_id)
            VALUES (?, NULL, ?, 1, ?, ?)
            ON CONFLICT (file_path, collection_id) DO UPDATE SET
                dirty = 1,
                deleted = excluded.deleted,
                last_modified = CASE
                    WHEN excluded.deleted = 1 THEN files.last_modified
                    ELSE excluded.last_modified
                END
            RETURNING id
            "#,
        )
        .bind(file_path)
        .bind(truncate_to_millis(observed_at))
        .bind(deleted)
        .bind(collection_id.as_i64())
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_write_error(e, collection_id))?;

        debug!(
            collection_id = %collection_id,
            path = file_path,
            deleted,
            "Recorded file change"
        );
        Ok(FileId(id))
    }

    async fn tombstone_under(&self, collection_id: CollectionId, dir: &str) -> Result<u64> {
        let mut prefix = dir.trim_end_matches(MAIN_SEPARATOR).to_string();
        prefix.push(MAIN_SEPARATOR);

        let result = sqlx::query(
            r#"
            UPDATE files
            SET deleted = 1, dirty = 1
            WHERE collection_id = ?
              AND deleted = 0
              AND substr(file_path, 1, length(?)) = ?
            "#,
        )
        .bind(collection_id.as_i64())
        .bind(&prefix)
        .bind(&prefix)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn add_file(
        &self,
        collection_id: CollectionId,
        file: &NewTrackedFile,
    ) -> Result<TrackedFile> {
        let file_path = path_key(&file.file_path).ok_or_else(|| {
            TrackerError::InvalidInput(format!(
                "file path {} is not valid UTF-8",
                file.file_path.display()
            ))
        })?;
        let last_modified = truncate_to_millis(file.last_modified.unwrap_or_else(Utc::now));

        let row = sqlx::query_as::<_, FileRow>(
            r#"
            INSERT INTO files
                (file_path, original_url, last_modified, dirty, deleted, collection_id)
            VALUES (?, ?, ?, ?, 0, ?)
            ON CONFLICT (file_path, collection_id) DO UPDATE SET
                original_url = COALESCE(excluded.original_url, files.original_url),
                last_modified = excluded.last_modified,
                dirty = excluded.dirty,
                deleted = 0
            RETURNING id, file_path, original_url, last_modified, dirty, deleted, collection_id
            "#,
        )
        .bind(file_path)
        .bind(&file.original_url)
        .bind(last_modified)
        .bind(file.dirty)
        .bind(collection_id.as_i64())
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_write_error(e, collection_id))?;

        Ok(row.into())
    }

    async fn get(&self, id: FileId) -> Result<Option<TrackedFile>> {
        let row = sqlx::query_as::<_, FileRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.as_i64())
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn get_by_path(
        &self,
        collection_id: CollectionId,
        file_path: &str,
    ) -> Result<Option<TrackedFile>> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "{SELECT_COLUMNS} WHERE collection_id = ? AND file_path = ?"
        ))
        .bind(collection_id.as_i64())
        .bind(file_path)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Into::into))
    }

    async fn query(&self, query: &FileQuery) -> Result<Vec<TrackedFile>> {
        if query.is_contradictory() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        builder.push(" WHERE 1 = 1");
        if let Some(collection_id) = query.collection_id {
            builder
                .push(" AND collection_id = ")
                .push_bind(collection_id.as_i64());
        }
        if let Some(dirty) = query.dirty_constraint() {
            builder.push(" AND dirty = ").push_bind(dirty);
        }
        if let Some(deleted) = query.deleted {
            builder.push(" AND deleted = ").push_bind(deleted);
        }
        builder.push(" ORDER BY collection_id, file_path");

        let rows = builder
            .build_query_as::<FileRow>()
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_dirty(&self, id: FileId, dirty: bool) -> Result<TrackedFile> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            UPDATE files SET dirty = ?
            WHERE id = ?
            RETURNING id, file_path, original_url, last_modified, dirty, deleted, collection_id
            "#,
        )
        .bind(dirty)
        .bind(id.as_i64())
        .fetch_optional(self.pool())
        .await?;

        row.map(Into::into).ok_or(TrackerError::FileNotFound(id))
    }

    async fn set_collection_dirty(&self, collection_id: CollectionId, dirty: bool) -> Result<u64> {
        let mut tx = self.pool().begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM collections WHERE id = ?")
            .bind(collection_id.as_i64())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(TrackerError::CollectionNotFound(collection_id));
        }

        let result = sqlx::query("UPDATE files SET dirty = ? WHERE collection_id = ?")
            .bind(dirty)
            .bind(collection_id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            collection_id = %collection_id,
            dirty,
            rows = result.rows_affected(),
            "Bulk dirty flag update"
        );
        Ok(result.rows_affected())
    }

    async fn remove(&self, id: FileId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id.as_i64())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_processed_tombstones(&self, collection_id: CollectionId) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM files WHERE collection_id = ? AND deleted = 1 AND dirty = 0")
                .bind(collection_id.as_i64())
                .execute(self.pool())
                .await?;

        if result.rows_affected() > 0 {
            info!(
                collection_id = %collection_id,
                purged = result.rows_affected(),
                "Purged processed tombstones"
            );
        }
        Ok(result.rows_affected())
    }

    async fn counts(&self, collection_id: Option<CollectionId>) -> Result<FileCounts> {
        let (total, dirty, processed, deleted): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(dirty), 0),
                COALESCE(SUM(CASE WHEN dirty = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(deleted), 0)
            FROM files
            WHERE ? IS NULL OR collection_id = ?
            "#,
        )
        .bind(collection_id.map(|id| id.as_i64()))
        .bind(collection_id.map(|id| id.as_i64()))
        .fetch_one(self.pool())
        .await?;

        Ok(FileCounts {
            total: total.max(0) as u64,
            dirty: dirty.max(0) as u64,
            processed: processed.max(0) as u64,
            deleted: deleted.max(0) as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FileRow {
    id: i64,
    file_path: String,
    original_url: Option<String>,
    last_modified: DateTime<Utc>,
    dirty: bool,
    deleted: bool,
    collection_id: i64,
}

impl From<FileRow> for TrackedFile {
    fn from(row: FileRow) -> Self {
        TrackedFile {
            id: FileId(row.id),
            file_path: PathBuf::from(row.file_path),
            original_url: row.original_url,
            last_modified: row.last_modified,
            dirty: row.dirty,
            deleted: row.deleted,
            collection_id: CollectionId(row.collection_id),
        }
    }
}
