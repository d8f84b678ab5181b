use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::ids::CollectionId;
use crate::watch::WatchSettings;

/// File counts by flag. `processed` counts records with `dirty = false`,
/// tombstones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileCounts {
    pub total: u64,
    pub dirty: u64,
    pub processed: u64,
    pub deleted: u64,
}

impl std::ops::AddAssign for FileCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.total += rhs.total;
        self.dirty += rhs.dirty;
        self.processed += rhs.processed;
        self.deleted += rhs.deleted;
    }
}

/// Live counters for one running watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WatcherStatus {
    pub collection_id: CollectionId,
    pub started_at: DateTime<Utc>,
    pub events_applied: u64,
    pub events_debounced: u64,
    pub events_failed: u64,
    pub last_error: Option<String>,
    pub settings: WatchSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollectionStats {
    pub collection_id: CollectionId,
    pub name: String,
    pub source_folder: PathBuf,
    pub files: FileCounts,
    /// Bumped by every completed reconciliation pass.
    pub updated_at: DateTime<Utc>,
    pub watcher: Option<WatcherStatus>,
}

impl CollectionStats {
    pub fn is_watched(&self) -> bool {
        self.watcher.is_some()
    }
}

/// Global roll-up across every collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackerStatistics {
    pub collections: u64,
    pub files: FileCounts,
    pub active_watchers: usize,
    pub per_collection: Vec<CollectionStats>,
}
