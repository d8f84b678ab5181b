//! Collection catalogue: validation and CRUD on top of the repository port.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use filetracker_model::{Collection, CollectionId, CollectionUpdate, NewCollection};

use crate::database::ports::collections::CollectionRepository;
use crate::error::{Result, TrackerError};

/// Check that `path` is an absolute, existing directory and return its
/// canonical form.
pub fn validate_source_folder(path: &Path) -> Result<PathBuf> {
    let invalid = |reason: &str| TrackerError::InvalidSourceFolder {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if path.as_os_str().is_empty() {
        return Err(invalid("path is empty"));
    }
    if !path.is_absolute() {
        return Err(invalid("path must be absolute"));
    }

    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => invalid("folder does not exist"),
        _ => invalid(&e.to_string()),
    })?;
    if !metadata.is_dir() {
        return Err(invalid("path is not a directory"));
    }

    let canonical = std::fs::canonicalize(path).map_err(|e| invalid(&e.to_string()))?;
    if canonical.to_str().is_none() {
        return Err(invalid("path is not valid UTF-8"));
    }
    Ok(canonical)
}

#[derive(Clone)]
pub struct CollectionService {
    repo: Arc<dyn CollectionRepository>,
}

impl std::fmt::Debug for CollectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionService")
            .field("repo", &std::any::type_name_of_val(self.repo.as_ref()))
            .finish()
    }
}

impl CollectionService {
    pub fn new(repo: Arc<dyn CollectionRepository>) -> Self {
        Self { repo }
    }

    /// Validate and insert a collection. Nothing is written when validation
    /// fails.
    pub async fn create(&self, collection: NewCollection) -> Result<Collection> {
        let mut collection = collection.normalized()?;
        collection.source_folder = validate_source_folder(&collection.source_folder)?;
        self.repo.create(&collection).await
    }

    pub async fn get(&self, id: CollectionId) -> Result<Collection> {
        self.repo
            .get(id)
            .await?
            .ok_or(TrackerError::CollectionNotFound(id))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Collection>> {
        self.repo.get_by_name(name.trim()).await
    }

    pub async fn list(&self) -> Result<Vec<Collection>> {
        self.repo.list().await
    }

    pub async fn update(&self, id: CollectionId, update: CollectionUpdate) -> Result<Collection> {
        let existing = self.get(id).await?;
        if update.is_empty() {
            return Ok(existing);
        }

        let mut merged = update.apply_to(&existing)?;
        if update.source_folder.is_some() {
            merged.source_folder = validate_source_folder(&merged.source_folder)?;
        }

        let updated = self.repo.update(&merged).await?;
        info!(collection_id = %id, name = %updated.name, "Collection updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: CollectionId) -> Result<bool> {
        self.repo.delete(id).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.repo.count().await
    }
}
