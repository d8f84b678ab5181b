use async_trait::async_trait;

use filetracker_model::{Collection, CollectionId, NewCollection};

use crate::error::Result;

#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// Insert a collection. A duplicate name surfaces as
    /// [`TrackerError::AlreadyExists`](crate::error::TrackerError::AlreadyExists).
    async fn create(&self, collection: &NewCollection) -> Result<Collection>;
    async fn get(&self, id: CollectionId) -> Result<Option<Collection>>;
    async fn get_by_name(&self, name: &str) -> Result<Option<Collection>>;
    async fn list(&self) -> Result<Vec<Collection>>;
    /// Persist every mutable field of `collection` and bump `updated_at`.
    async fn update(&self, collection: &Collection) -> Result<Collection>;
    /// Delete a collection and, through the cascade, all of its files.
    async fn delete(&self, id: CollectionId) -> Result<bool>;
    async fn count(&self) -> Result<u64>;
}
