use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::ids::{CollectionId, FileId};

/// One tracked path inside a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackedFile {
    pub id: FileId,
    pub file_path: PathBuf,
    /// Provenance string supplied by whoever registered the file; never
    /// derived from the filesystem.
    pub original_url: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub dirty: bool,
    pub deleted: bool,
    pub collection_id: CollectionId,
}

impl TrackedFile {
    pub fn status(&self) -> FileStatus {
        FileStatus::from_flags(self.dirty, self.deleted)
    }

    /// A processed file has no change waiting for a downstream consumer.
    pub fn is_processed(&self) -> bool {
        !self.dirty
    }
}

/// The four flag combinations downstream processors rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FileStatus {
    Clean,
    Dirty,
    /// Tombstone already consumed downstream.
    Deleted,
    /// Tombstone waiting for a downstream consumer.
    DirtyDeleted,
}

impl FileStatus {
    pub fn from_flags(dirty: bool, deleted: bool) -> Self {
        match (dirty, deleted) {
            (false, false) => FileStatus::Clean,
            (true, false) => FileStatus::Dirty,
            (false, true) => FileStatus::Deleted,
            (true, true) => FileStatus::DirtyDeleted,
        }
    }

    pub fn is_dirty(self) -> bool {
        matches!(self, FileStatus::Dirty | FileStatus::DirtyDeleted)
    }

    pub fn is_deleted(self) -> bool {
        matches!(self, FileStatus::Deleted | FileStatus::DirtyDeleted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Clean => "clean",
            FileStatus::Dirty => "dirty",
            FileStatus::Deleted => "deleted",
            FileStatus::DirtyDeleted => "dirty_deleted",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter for bulk file queries. Every field is optional; unset fields do
/// not constrain the result.
///
/// `processed` is the inverse of `dirty`. When both are set and disagree the
/// query is contradictory and matches nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileQuery {
    pub collection_id: Option<CollectionId>,
    pub dirty: Option<bool>,
    pub processed: Option<bool>,
    pub deleted: Option<bool>,
}

impl FileQuery {
    pub fn for_collection(collection_id: CollectionId) -> Self {
        Self {
            collection_id: Some(collection_id),
            ..Self::default()
        }
    }

    pub fn dirty(mut self, dirty: bool) -> Self {
        self.dirty = Some(dirty);
        self
    }

    pub fn processed(mut self, processed: bool) -> Self {
        self.processed = Some(processed);
        self
    }

    pub fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    /// Collapse `dirty` and `processed` into a single constraint on the
    /// `dirty` column.
    pub fn dirty_constraint(&self) -> Option<bool> {
        self.dirty.or(self.processed.map(|processed| !processed))
    }

    pub fn is_contradictory(&self) -> bool {
        matches!((self.dirty, self.processed), (Some(d), Some(p)) if d == p)
    }

    pub fn matches(&self, file: &TrackedFile) -> bool {
        if self.is_contradictory() {
            return false;
        }
        self.collection_id.is_none_or(|id| id == file.collection_id)
            && self.dirty_constraint().is_none_or(|d| d == file.dirty)
            && self.deleted.is_none_or(|d| d == file.deleted)
    }
}

/// Manual registration of a file, used by downstream callers that track
/// provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewTrackedFile {
    pub file_path: PathBuf,
    pub original_url: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub dirty: bool,
}

impl NewTrackedFile {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            original_url: None,
            last_modified: None,
            dirty: true,
        }
    }

    pub fn with_original_url(mut self, url: impl Into<String>) -> Self {
        self.original_url = Some(url.into());
        self
    }

    pub fn with_dirty(mut self, dirty: bool) -> Self {
        self.dirty = dirty;
        self
    }
}
