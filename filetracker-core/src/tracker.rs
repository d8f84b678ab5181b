//! `FileTracker`: the single entry point an outer layer (REST, CLI) drives.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use filetracker_model::{
    Collection, CollectionId, CollectionStats, CollectionUpdate, FileId, FileQuery,
    NewCollection, NewTrackedFile, ReconcileReport, ResumeReport, TrackedFile,
    TrackerStatistics, WatchSettings, WatchSettingsPatch,
};

use crate::application::unit_of_work::AppUnitOfWork;
use crate::catalog::CollectionService;
use crate::database::{DatabaseContext, StoreOptions};
use crate::error::{Result, TrackerError};
use crate::scan::locks::CollectionLocks;
use crate::scan::reconcile::{DEFAULT_REPORT_DETAIL_THRESHOLD, Reconciler};
use crate::scan::supervisor::{SupervisorConfig, WatchSupervisor};
use crate::status::StatusAggregator;

#[derive(Debug, Clone)]
pub struct TrackerOptions {
    pub supervisor: SupervisorConfig,
    pub report_detail_threshold: usize,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            supervisor: SupervisorConfig::default(),
            report_detail_threshold: DEFAULT_REPORT_DETAIL_THRESHOLD,
        }
    }
}

#[derive(Clone)]
pub struct FileTracker {
    context: DatabaseContext,
    uow: Arc<AppUnitOfWork>,
    catalog: CollectionService,
    reconciler: Reconciler,
    supervisor: Arc<WatchSupervisor>,
    status: StatusAggregator,
    locks: CollectionLocks,
}

impl fmt::Debug for FileTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTracker")
            .field("context", &self.context)
            .field("supervisor", &self.supervisor)
            .finish()
    }
}

impl FileTracker {
    /// Connect to `url`, apply migrations and compose every service.
    pub async fn open(
        url: &str,
        store_options: &StoreOptions,
        options: TrackerOptions,
    ) -> Result<Self> {
        let context = DatabaseContext::connect(url, store_options).await?;
        context.sqlite().initialize_schema().await?;
        Ok(Self::from_context(context, options))
    }

    pub fn from_context(context: DatabaseContext, options: TrackerOptions) -> Self {
        let uow = context.unit_of_work();
        let locks = CollectionLocks::new();
        let catalog = CollectionService::new(Arc::clone(&uow.collections));
        let reconciler = Reconciler::new(
            context.sqlite(),
            Arc::clone(&uow.collections),
            locks.clone(),
        )
        .with_report_detail_threshold(options.report_detail_threshold);
        let supervisor = Arc::new(WatchSupervisor::new(Arc::clone(&uow), options.supervisor));
        let status = StatusAggregator::new(Arc::clone(&uow), Arc::clone(&supervisor));

        Self {
            context,
            uow,
            catalog,
            reconciler,
            supervisor,
            status,
            locks,
        }
    }

    pub fn context(&self) -> &DatabaseContext {
        &self.context
    }

    pub fn unit_of_work(&self) -> Arc<AppUnitOfWork> {
        Arc::clone(&self.uow)
    }

    pub fn supervisor(&self) -> Arc<WatchSupervisor> {
        Arc::clone(&self.supervisor)
    }

    // Collections

    pub async fn create_collection(&self, collection: NewCollection) -> Result<Collection> {
        self.catalog.create(collection).await
    }

    pub async fn get_collection(&self, id: CollectionId) -> Result<Collection> {
        self.catalog.get(id).await
    }

    pub async fn collection_by_name(&self, name: &str) -> Result<Option<Collection>> {
        self.catalog.get_by_name(name).await
    }

    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        self.catalog.list().await
    }

    /// Update a collection. A running watcher is restarted so it picks up
    /// the new folder and filters. The update stands even if that restart
    /// fails; the failure is logged and the collection is left unwatched or
    /// on its previous watcher.
    pub async fn update_collection(
        &self,
        id: CollectionId,
        update: CollectionUpdate,
    ) -> Result<Collection> {
        let updated = self.catalog.update(id, update).await?;
        if self.supervisor.is_watching(id).await
            && let Err(err) = self.supervisor.restart(id, None).await
        {
            warn!(collection_id = %id, "Collection updated but watcher restart failed: {err}");
        }
        Ok(updated)
    }

    /// Delete a collection and all of its files, then stop its watcher and
    /// drop its persisted watch settings.
    pub async fn delete_collection(&self, id: CollectionId) -> Result<()> {
        let guard = self.locks.lock(id).await;
        let deleted = self.catalog.delete(id).await?;
        drop(guard);
        if !deleted {
            return Err(TrackerError::CollectionNotFound(id));
        }
        self.locks.forget(id);
        self.supervisor.forget(id).await
    }

    // Files

    pub async fn list_files(&self, query: FileQuery) -> Result<Vec<TrackedFile>> {
        self.uow.files.query(&query).await
    }

    pub async fn get_file(&self, id: FileId) -> Result<TrackedFile> {
        self.uow
            .files
            .get(id)
            .await?
            .ok_or(TrackerError::FileNotFound(id))
    }

    pub async fn set_file_dirty(&self, id: FileId, dirty: bool) -> Result<TrackedFile> {
        self.uow.files.set_dirty(id, dirty).await
    }

    /// Bulk flip. Never interleaves with a reconciliation of the same
    /// collection.
    pub async fn set_collection_dirty(&self, id: CollectionId, dirty: bool) -> Result<u64> {
        let _guard = self.locks.lock(id).await;
        self.uow.files.set_collection_dirty(id, dirty).await
    }

    pub async fn add_file(&self, id: CollectionId, file: NewTrackedFile) -> Result<TrackedFile> {
        self.uow.files.add_file(id, &file).await
    }

    pub async fn remove_file(&self, id: FileId) -> Result<()> {
        if self.uow.files.remove(id).await? {
            Ok(())
        } else {
            Err(TrackerError::FileNotFound(id))
        }
    }

    pub async fn purge_processed_tombstones(&self, id: CollectionId) -> Result<u64> {
        let _guard = self.locks.lock(id).await;
        self.uow.files.purge_processed_tombstones(id).await
    }

    // Reconciliation

    pub async fn reconcile(&self, id: CollectionId) -> Result<ReconcileReport> {
        self.reconciler.reconcile(id).await
    }

    pub async fn reconcile_all(&self) -> Result<Vec<(CollectionId, Result<ReconcileReport>)>> {
        self.reconciler.reconcile_all().await
    }

    // Watch control

    pub async fn start_watch(
        &self,
        id: CollectionId,
        patch: Option<WatchSettingsPatch>,
    ) -> Result<WatchSettings> {
        self.supervisor.start(id, patch).await
    }

    pub async fn stop_watch(&self, id: CollectionId) -> Result<bool> {
        self.supervisor.stop(id).await
    }

    pub async fn restart_watch(
        &self,
        id: CollectionId,
        patch: Option<WatchSettingsPatch>,
    ) -> Result<WatchSettings> {
        self.supervisor.restart(id, patch).await
    }

    pub async fn is_watching(&self, id: CollectionId) -> bool {
        self.supervisor.is_watching(id).await
    }

    pub async fn watch_settings(&self, id: CollectionId) -> Result<Option<WatchSettings>> {
        self.supervisor.load_settings(id).await
    }

    pub async fn resume_watchers(&self) -> Result<ResumeReport> {
        self.supervisor.resume_all().await
    }

    // Status

    pub async fn collection_stats(&self, id: CollectionId) -> Result<CollectionStats> {
        self.status.collection_stats(id).await
    }

    pub async fn statistics(&self) -> Result<TrackerStatistics> {
        self.status.statistics().await
    }

    /// Stop every watcher (persisted flags untouched) and close the pool.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
        self.context.sqlite().close().await;
        info!("File tracker shut down");
    }
}
