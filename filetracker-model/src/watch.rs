use std::fmt;
use std::time::Duration;

use crate::collection::normalize_folder_names;
use crate::error::{ModelError, Result};

/// Default debounce window in seconds.
pub const DEFAULT_PROCESS_INTERVAL_SECS: u64 = 15;

/// Upper bound accepted for the debounce window (one day).
pub const MAX_PROCESS_INTERVAL_SECS: u64 = 86_400;

/// Kind of change observed by the live watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Created => "created",
            ChangeType::Modified => "modified",
            ChangeType::Deleted => "deleted",
            ChangeType::Renamed => "renamed",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted per-collection watch configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WatchSettings {
    pub enabled: bool,
    pub watch_created: bool,
    pub watch_modified: bool,
    pub watch_deleted: bool,
    pub watch_renamed: bool,
    pub include_subdirectories: bool,
    /// Debounce window in seconds. Zero disables debouncing.
    pub process_interval: u64,
    pub omit_folders: Vec<String>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            watch_created: true,
            watch_modified: true,
            watch_deleted: true,
            watch_renamed: true,
            include_subdirectories: true,
            process_interval: DEFAULT_PROCESS_INTERVAL_SECS,
            omit_folders: Vec::new(),
        }
    }
}

impl WatchSettings {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_secs(self.process_interval)
    }

    pub fn watches(&self, change: ChangeType) -> bool {
        match change {
            ChangeType::Created => self.watch_created,
            ChangeType::Modified => self.watch_modified,
            ChangeType::Deleted => self.watch_deleted,
            ChangeType::Renamed => self.watch_renamed,
        }
    }

    pub fn validated(mut self) -> Result<Self> {
        if self.process_interval > MAX_PROCESS_INTERVAL_SECS {
            return Err(ModelError::InvalidInterval(self.process_interval));
        }
        self.omit_folders =
            normalize_folder_names(Some(std::mem::take(&mut self.omit_folders)))?
                .unwrap_or_default();
        Ok(self)
    }
}

/// Partial watch settings supplied with a start or restart request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WatchSettingsPatch {
    pub watch_created: Option<bool>,
    pub watch_modified: Option<bool>,
    pub watch_deleted: Option<bool>,
    pub watch_renamed: Option<bool>,
    pub include_subdirectories: Option<bool>,
    pub process_interval: Option<u64>,
    pub omit_folders: Option<Vec<String>>,
}

impl WatchSettingsPatch {
    /// Fill unset fields from `base`. The result is always enabled.
    pub fn apply(self, base: &WatchSettings) -> WatchSettings {
        WatchSettings {
            enabled: true,
            watch_created: self.watch_created.unwrap_or(base.watch_created),
            watch_modified: self.watch_modified.unwrap_or(base.watch_modified),
            watch_deleted: self.watch_deleted.unwrap_or(base.watch_deleted),
            watch_renamed: self.watch_renamed.unwrap_or(base.watch_renamed),
            include_subdirectories: self
                .include_subdirectories
                .unwrap_or(base.include_subdirectories),
            process_interval: self.process_interval.unwrap_or(base.process_interval),
            omit_folders: self
                .omit_folders
                .unwrap_or_else(|| base.omit_folders.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_watch_everything() {
        let settings = WatchSettings::default();
        assert!(settings.enabled);
        for change in [
            ChangeType::Created,
            ChangeType::Modified,
            ChangeType::Deleted,
            ChangeType::Renamed,
        ] {
            assert!(settings.watches(change));
        }
        assert_eq!(settings.debounce_window(), Duration::from_secs(15));
    }

    #[test]
    fn patch_overrides_only_given_fields() {
        let base = WatchSettings {
            enabled: false,
            process_interval: 30,
            omit_folders: vec!["tmp".into()],
            ..WatchSettings::default()
        };
        let patch = WatchSettingsPatch {
            watch_deleted: Some(false),
            process_interval: Some(2),
            ..WatchSettingsPatch::default()
        };
        let merged = patch.apply(&base);
        assert!(merged.enabled);
        assert!(!merged.watch_deleted);
        assert!(merged.watch_created);
        assert_eq!(merged.process_interval, 2);
        assert_eq!(merged.omit_folders, vec!["tmp".to_string()]);
    }

    #[test]
    fn oversized_interval_is_rejected() {
        let settings = WatchSettings {
            process_interval: MAX_PROCESS_INTERVAL_SECS + 1,
            ..WatchSettings::default()
        };
        assert_eq!(
            settings.validated().unwrap_err(),
            ModelError::InvalidInterval(MAX_PROCESS_INTERVAL_SECS + 1)
        );
    }
}
