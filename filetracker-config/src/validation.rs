//! Guard rails applied after every layer has been merged.

use std::fmt;

use thiserror::Error;

use filetracker_model::collection::normalize_folder_names;
use filetracker_model::{MAX_PROCESS_INTERVAL_SECS, ModelError};

use crate::models::TrackerConfig;

/// Intervals above this are allowed but unusual for a live watcher.
pub const LONG_PROCESS_INTERVAL_SECS: u64 = 3_600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error("database.max_connections must be at least 1")]
    ZeroConnections,
    #[error(
        "watch.process_interval_secs = {0} exceeds the maximum of {MAX_PROCESS_INTERVAL_SECS}"
    )]
    ProcessIntervalTooLong(u64),
    #[error("watch.omit_folders entry {0:?} must be a relative folder name")]
    InvalidOmitFolder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    DebounceDisabled,
    LongProcessInterval(u64),
    UnparsedEnvVar { name: String, value: String },
    ZeroReportThreshold,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::DebounceDisabled => write!(
                f,
                "watch.process_interval_secs is 0; duplicate notifications will not be debounced"
            ),
            ConfigWarning::LongProcessInterval(secs) => write!(
                f,
                "watch.process_interval_secs is {secs}s; repeated edits inside that window are dropped"
            ),
            ConfigWarning::UnparsedEnvVar { name, value } => {
                write!(f, "ignoring {name}={value:?}: not a valid value")
            }
            ConfigWarning::ZeroReportThreshold => write!(
                f,
                "reconcile.report_detail_threshold is 0; per-path detail is never logged"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWarnings {
    items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push(&mut self, warning: ConfigWarning) {
        self.items.push(warning);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }

    pub fn contains(&self, warning: &ConfigWarning) -> bool {
        self.items.contains(warning)
    }

    /// Emit every warning through `tracing`.
    pub fn log(&self) {
        for warning in &self.items {
            tracing::warn!("{warning}");
        }
    }
}

pub fn validate(
    config: &TrackerConfig,
    warnings: &mut ConfigWarnings,
) -> Result<(), ConfigGuardRailError> {
    if config.database.max_connections == 0 {
        return Err(ConfigGuardRailError::ZeroConnections);
    }

    let interval = config.watch.process_interval_secs;
    if interval > MAX_PROCESS_INTERVAL_SECS {
        return Err(ConfigGuardRailError::ProcessIntervalTooLong(interval));
    }
    if interval == 0 {
        warnings.push(ConfigWarning::DebounceDisabled);
    } else if interval > LONG_PROCESS_INTERVAL_SECS {
        warnings.push(ConfigWarning::LongProcessInterval(interval));
    }

    if let Err(ModelError::InvalidFolderName(bad)) =
        normalize_folder_names(Some(config.watch.omit_folders.clone()))
    {
        return Err(ConfigGuardRailError::InvalidOmitFolder(bad));
    }

    if config.reconcile.report_detail_threshold == 0 {
        warnings.push(ConfigWarning::ZeroReportThreshold);
    }

    Ok(())
}
