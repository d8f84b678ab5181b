//! Core data model definitions shared across filetracker crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod collection;
pub mod error;
pub mod files;
pub mod ids;
pub mod scan;
pub mod stats;
pub mod watch;

// Intentionally curated re-exports for downstream consumers.
pub use collection::{Collection, CollectionUpdate, NewCollection};
pub use error::{ModelError, Result as ModelResult};
pub use files::{FileQuery, FileStatus, NewTrackedFile, TrackedFile};
pub use ids::{CollectionId, FileId};
pub use scan::{ReconcileReport, ResumeReport, SkippedWatch};
pub use stats::{CollectionStats, FileCounts, TrackerStatistics, WatcherStatus};
pub use watch::{
    ChangeType, DEFAULT_PROCESS_INTERVAL_SECS, MAX_PROCESS_INTERVAL_SECS, WatchSettings,
    WatchSettingsPatch,
};
