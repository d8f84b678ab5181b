pub mod sources;

use std::path::PathBuf;
use std::time::Duration;

use filetracker_core::scan::SupervisorConfig;
use filetracker_core::{StoreOptions, TrackerOptions};
use filetracker_model::{DEFAULT_PROCESS_INTERVAL_SECS, WatchSettings};

pub const DEFAULT_DATABASE_PATH: &str = "filetracker.db";
pub const DEFAULT_LOG_FILTER: &str = "info,filetracker_core=info,sqlx=warn";

#[derive(Debug, Clone, Default)]
pub struct TrackerConfig {
    pub database: DatabaseConfig,
    pub watch: WatchConfig,
    pub reconcile: ReconcileConfig,
    pub logging: LoggingConfig,
    pub metadata: ConfigMetadata,
}

impl TrackerConfig {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_connections: self.database.max_connections,
            busy_timeout: Duration::from_millis(self.database.busy_timeout_ms),
        }
    }

    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            supervisor: SupervisorConfig {
                defaults: self.watch.default_settings(),
                stop_timeout: Duration::from_millis(self.watch.stop_timeout_ms),
            },
            report_detail_threshold: self.reconcile.report_detail_threshold,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `sqlite:` URL. Takes precedence over `path`.
    pub url: Option<String>,
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
            max_connections: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Where the daemon should open its store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Url(String),
    Path(PathBuf),
}

impl DatabaseConfig {
    pub fn target(&self) -> DatabaseTarget {
        match self.url.as_deref().map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => DatabaseTarget::Url(url.to_string()),
            None if self.path.as_os_str().is_empty() => {
                DatabaseTarget::Path(PathBuf::from(DEFAULT_DATABASE_PATH))
            }
            None => DatabaseTarget::Path(self.path.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub process_interval_secs: u64,
    pub include_subdirectories: bool,
    pub omit_folders: Vec<String>,
    /// Restart persisted watchers when the daemon boots.
    pub resume_on_start: bool,
    pub stop_timeout_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            process_interval_secs: DEFAULT_PROCESS_INTERVAL_SECS,
            include_subdirectories: true,
            omit_folders: Vec::new(),
            resume_on_start: true,
            stop_timeout_ms: 2_000,
        }
    }
}

impl WatchConfig {
    /// Base settings for a start request that leaves fields unset.
    pub fn default_settings(&self) -> WatchSettings {
        WatchSettings {
            include_subdirectories: self.include_subdirectories,
            process_interval: self.process_interval_secs,
            omit_folders: self.omit_folders.clone(),
            ..WatchSettings::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub on_start: bool,
    /// Above this many changed paths a pass logs only its summary.
    pub report_detail_threshold: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            on_start: false,
            report_detail_threshold: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Source that produced the file layer of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    File(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub source: ConfigSource,
    pub env_file_loaded: bool,
}
