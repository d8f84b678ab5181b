use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::util::{non_empty, parse_bool, parse_csv};

/// Raw configuration as defined in a TOML or JSON file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub watch: FileWatchConfig,
    #[serde(default)]
    pub reconcile: FileReconcileConfig,
    #[serde(default)]
    pub logging: FileLoggingConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busy_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileWatchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_subdirectories: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omit_folders: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_on_start: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileReconcileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_start: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_detail_threshold: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileLoggingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub database_path: Option<PathBuf>,
    pub database_max_connections: Option<u32>,
    pub process_interval_secs: Option<u64>,
    pub omit_folders: Option<Vec<String>>,
    pub reconcile_on_start: Option<bool>,
    pub resume_watchers: Option<bool>,
    pub report_detail_threshold: Option<usize>,
    pub log_filter: Option<String>,
    /// Variables that were set but could not be parsed, as `(name, value)`.
    pub unparsed: Vec<(String, String)>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut unparsed = Vec::new();

        Self {
            config_path: non_empty(lookup("FILETRACKER_CONFIG_PATH")).map(PathBuf::from),
            database_url: non_empty(lookup("DATABASE_URL")),
            database_path: non_empty(lookup("FILETRACKER_DB_PATH")).map(PathBuf::from),
            database_max_connections: typed_var(
                &lookup,
                "FILETRACKER_DB_MAX_CONNECTIONS",
                &mut unparsed,
            ),
            process_interval_secs: typed_var(&lookup, "FILETRACKER_PROCESS_INTERVAL", &mut unparsed),
            omit_folders: non_empty(lookup("FILETRACKER_OMIT_FOLDERS")).map(|raw| parse_csv(&raw)),
            reconcile_on_start: bool_var(&lookup, "FILETRACKER_RECONCILE_ON_START", &mut unparsed),
            resume_watchers: bool_var(&lookup, "FILETRACKER_RESUME_WATCHERS", &mut unparsed),
            report_detail_threshold: typed_var(
                &lookup,
                "FILETRACKER_REPORT_THRESHOLD",
                &mut unparsed,
            ),
            log_filter: non_empty(lookup("FILETRACKER_LOG")),
            unparsed,
        }
    }
}

fn typed_var<T, F>(lookup: &F, name: &str, unparsed: &mut Vec<(String, String)>) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = non_empty(lookup(name))?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            unparsed.push((name.to_string(), raw));
            None
        }
    }
}

fn bool_var<F>(lookup: &F, name: &str, unparsed: &mut Vec<(String, String)>) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = non_empty(lookup(name))?;
    let value = parse_bool(&raw);
    if value.is_none() {
        unparsed.push((name.to_string(), raw));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> EnvConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn reads_typed_overrides() {
        let env = env(&[
            ("DATABASE_URL", "sqlite://tracker.db"),
            ("FILETRACKER_DB_MAX_CONNECTIONS", "4"),
            ("FILETRACKER_PROCESS_INTERVAL", " 30 "),
            ("FILETRACKER_RECONCILE_ON_START", "yes"),
            ("FILETRACKER_OMIT_FOLDERS", "node_modules,.git"),
        ]);
        assert_eq!(env.database_url.as_deref(), Some("sqlite://tracker.db"));
        assert_eq!(env.database_max_connections, Some(4));
        assert_eq!(env.process_interval_secs, Some(30));
        assert_eq!(env.reconcile_on_start, Some(true));
        assert_eq!(
            env.omit_folders,
            Some(vec!["node_modules".to_string(), ".git".to_string()])
        );
        assert!(env.unparsed.is_empty());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let env = env(&[("DATABASE_URL", "  "), ("FILETRACKER_LOG", "")]);
        assert!(env.database_url.is_none());
        assert!(env.log_filter.is_none());
    }

    #[test]
    fn unparseable_values_are_collected() {
        let env = env(&[
            ("FILETRACKER_PROCESS_INTERVAL", "soon"),
            ("FILETRACKER_RESUME_WATCHERS", "perhaps"),
        ]);
        assert!(env.process_interval_secs.is_none());
        assert!(env.resume_watchers.is_none());
        assert_eq!(env.unparsed.len(), 2);
        assert_eq!(env.unparsed[0].0, "FILETRACKER_PROCESS_INTERVAL");
    }
}
