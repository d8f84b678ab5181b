//! Read-only status reporting over the store and the supervisor.

use std::fmt;
use std::sync::Arc;

use filetracker_model::{CollectionId, CollectionStats, FileCounts, TrackerStatistics};

use crate::application::unit_of_work::AppUnitOfWork;
use crate::error::{Result, TrackerError};
use crate::scan::supervisor::WatchSupervisor;

#[derive(Clone)]
pub struct StatusAggregator {
    uow: Arc<AppUnitOfWork>,
    supervisor: Arc<WatchSupervisor>,
}

impl fmt::Debug for StatusAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusAggregator").finish_non_exhaustive()
    }
}

impl StatusAggregator {
    pub fn new(uow: Arc<AppUnitOfWork>, supervisor: Arc<WatchSupervisor>) -> Self {
        Self { uow, supervisor }
    }

    pub async fn collection_stats(&self, collection_id: CollectionId) -> Result<CollectionStats> {
        let collection = self
            .uow
            .collections
            .get(collection_id)
            .await?
            .ok_or(TrackerError::CollectionNotFound(collection_id))?;
        let files = self.uow.files.counts(Some(collection_id)).await?;
        let watcher = self.supervisor.status(collection_id).await;

        Ok(CollectionStats {
            collection_id,
            name: collection.name,
            source_folder: collection.source_folder,
            files,
            updated_at: collection.updated_at,
            watcher,
        })
    }

    pub async fn statistics(&self) -> Result<TrackerStatistics> {
        let collections = self.uow.collections.list().await?;
        let mut per_collection = Vec::with_capacity(collections.len());
        let mut totals = FileCounts::default();

        for collection in collections {
            let files = self.uow.files.counts(Some(collection.id)).await?;
            totals += files;
            per_collection.push(CollectionStats {
                collection_id: collection.id,
                name: collection.name,
                source_folder: collection.source_folder,
                files,
                updated_at: collection.updated_at,
                watcher: self.supervisor.status(collection.id).await,
            });
        }

        Ok(TrackerStatistics {
            collections: per_collection.len() as u64,
            files: totals,
            active_watchers: self.supervisor.active_watchers().await.len(),
            per_collection,
        })
    }
}
