use async_trait::async_trait;
use chrono::{DateTime, Utc};

use filetracker_model::{
    CollectionId, FileCounts, FileId, FileQuery, NewTrackedFile, TrackedFile,
};

use crate::error::Result;

#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Insert-or-update a single path observed by the live watcher. The row
    /// always ends up dirty; `deleted` selects between a live record stamped
    /// with `observed_at` and a tombstone that keeps its last known time.
    async fn record_change(
        &self,
        collection_id: CollectionId,
        file_path: &str,
        observed_at: DateTime<Utc>,
        deleted: bool,
    ) -> Result<FileId>;

    /// Tombstone every live record located beneath `dir`.
    async fn tombstone_under(&self, collection_id: CollectionId, dir: &str) -> Result<u64>;

    /// Manual registration with provenance. Collapses into an update when the
    /// path is already tracked.
    async fn add_file(
        &self,
        collection_id: CollectionId,
        file: &NewTrackedFile,
    ) -> Result<TrackedFile>;

    async fn get(&self, id: FileId) -> Result<Option<TrackedFile>>;

    async fn get_by_path(
        &self,
        collection_id: CollectionId,
        file_path: &str,
    ) -> Result<Option<TrackedFile>>;

    async fn query(&self, query: &FileQuery) -> Result<Vec<TrackedFile>>;

    async fn set_dirty(&self, id: FileId, dirty: bool) -> Result<TrackedFile>;

    /// Flip `dirty` for every file in the collection, returning rows touched.
    async fn set_collection_dirty(&self, collection_id: CollectionId, dirty: bool) -> Result<u64>;

    /// Remove a single record. Only downstream processors call this.
    async fn remove(&self, id: FileId) -> Result<bool>;

    /// Delete tombstones that were already consumed (`deleted` and not
    /// `dirty`).
    async fn purge_processed_tombstones(&self, collection_id: CollectionId) -> Result<u64>;

    async fn counts(&self, collection_id: Option<CollectionId>) -> Result<FileCounts>;
}
