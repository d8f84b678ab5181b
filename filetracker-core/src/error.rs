use std::path::PathBuf;

use filetracker_model::{CollectionId, FileId, ModelError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Invalid source folder {}: {reason}", path.display())]
    InvalidSourceFolder { path: PathBuf, reason: String },

    #[error("Collection already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Collection not found: {0}")]
    CollectionNotFound(CollectionId),

    #[error("File not found: {0}")]
    FileNotFound(FileId),

    #[error("Collection {0} is already being watched")]
    AlreadyWatching(CollectionId),

    #[error("Watch error for collection {collection_id}: {message}")]
    Watch {
        collection_id: CollectionId,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ModelError> for TrackerError {
    fn from(err: ModelError) -> Self {
        TrackerError::InvalidInput(err.to_string())
    }
}

impl TrackerError {
    /// Rejections caused by the request itself rather than the store or the
    /// filesystem.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TrackerError::InvalidSourceFolder { .. }
                | TrackerError::AlreadyExists(_)
                | TrackerError::InvalidInput(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TrackerError::CollectionNotFound(_) | TrackerError::FileNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
