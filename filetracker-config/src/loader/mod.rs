pub mod error;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::sources::{EnvConfig, FileConfig};
use crate::models::{ConfigMetadata, ConfigSource, TrackerConfig};
use crate::validation::{self, ConfigWarning, ConfigWarnings};

use error::ConfigLoadError;

const CANDIDATES: &[&str] = &[
    "filetracker.toml",
    "filetracker.json",
    "config/filetracker.toml",
    "config/filetracker.json",
];

/// A loaded configuration plus the non-fatal findings from validation.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: TrackerConfig,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Clone, Default)]
enum EnvFile {
    /// `.env` in the working directory, if present.
    #[default]
    Discover,
    Path(PathBuf),
    Disabled,
}

/// Builds a [`TrackerConfig`] from defaults, `.env`, a config file and the
/// environment, in that order of increasing precedence.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    search_root: PathBuf,
    env_file: EnvFile,
    env: Option<EnvConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            search_root: PathBuf::from("."),
            env_file: EnvFile::Discover,
            env: None,
        }
    }

    /// Use this config file instead of `$FILETRACKER_CONFIG_PATH` or the
    /// default candidates.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Directory searched for the default config file names.
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_root = root.into();
        self
    }

    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = EnvFile::Path(path.into());
        self
    }

    pub fn without_env_file(mut self) -> Self {
        self.env_file = EnvFile::Disabled;
        self
    }

    /// Supply environment values directly instead of reading the process
    /// environment.
    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.env = Some(env);
        self
    }

    pub fn load(self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = self.load_env_file()?;
        let env = self.env.clone().unwrap_or_else(EnvConfig::gather);

        let (file, source) = match self.resolve_config_file(&env) {
            Some((path, source)) => (read_config_file(&path)?, source),
            None => (FileConfig::default(), ConfigSource::Default),
        };
        debug!(?source, env_file_loaded, "Resolved configuration sources");

        let mut config = merge(file, &env);
        config.metadata = ConfigMetadata {
            source,
            env_file_loaded,
        };

        let mut warnings = ConfigWarnings::default();
        for (name, value) in &env.unparsed {
            warnings.push(ConfigWarning::UnparsedEnvVar {
                name: name.clone(),
                value: value.clone(),
            });
        }
        validation::validate(&config, &mut warnings)?;

        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        let result = match &self.env_file {
            EnvFile::Disabled => return Ok(false),
            EnvFile::Discover => dotenvy::dotenv().map(|_| ()),
            EnvFile::Path(path) => dotenvy::from_path(path),
        };
        match result {
            Ok(()) => Ok(true),
            Err(err) if err.not_found() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn resolve_config_file(&self, env: &EnvConfig) -> Option<(PathBuf, ConfigSource)> {
        if let Some(path) = &self.config_path {
            return Some((path.clone(), ConfigSource::File(path.clone())));
        }
        if let Some(path) = &env.config_path {
            return Some((path.clone(), ConfigSource::EnvPath(path.clone())));
        }
        CANDIDATES
            .iter()
            .map(|candidate| self.search_root.join(candidate))
            .find(|path| path.is_file())
            .map(|path| (path.clone(), ConfigSource::File(path)))
    }
}

pub fn read_config_file(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, path)
}

/// Parse by extension; anything else tries TOML first, then JSON.
pub fn parse_config(contents: &str, origin: &Path) -> Result<FileConfig, ConfigLoadError> {
    let parse_error = |message: String| ConfigLoadError::Parse {
        path: origin.to_path_buf(),
        message,
    };

    match origin.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(contents).map_err(|err| parse_error(err.to_string())),
        Some("toml") | Some("tml") => {
            toml::from_str(contents).map_err(|err| parse_error(err.to_string()))
        }
        _ => toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                parse_error(format!("toml error: {toml_err}; json error: {json_err}"))
            })
        }),
    }
}

fn merge(file: FileConfig, env: &EnvConfig) -> TrackerConfig {
    let mut config = TrackerConfig::default();

    let database = &mut config.database;
    if let Some(url) = file.database.url.filter(|url| !url.trim().is_empty()) {
        database.url = Some(url);
    }
    if let Some(path) = file.database.path {
        database.path = path;
    }
    if let Some(max) = file.database.max_connections {
        database.max_connections = max;
    }
    if let Some(timeout) = file.database.busy_timeout_ms {
        database.busy_timeout_ms = timeout;
    }
    if let Some(url) = env.database_url.clone() {
        database.url = Some(url);
    }
    if let Some(path) = env.database_path.clone() {
        // An explicit path override beats a URL from the file layer.
        if env.database_url.is_none() {
            database.url = None;
        }
        database.path = path;
    }
    if let Some(max) = env.database_max_connections {
        database.max_connections = max;
    }

    let watch = &mut config.watch;
    if let Some(secs) = file.watch.process_interval_secs {
        watch.process_interval_secs = secs;
    }
    if let Some(recursive) = file.watch.include_subdirectories {
        watch.include_subdirectories = recursive;
    }
    if let Some(folders) = file.watch.omit_folders {
        watch.omit_folders = folders;
    }
    if let Some(resume) = file.watch.resume_on_start {
        watch.resume_on_start = resume;
    }
    if let Some(timeout) = file.watch.stop_timeout_ms {
        watch.stop_timeout_ms = timeout;
    }
    if let Some(secs) = env.process_interval_secs {
        watch.process_interval_secs = secs;
    }
    if let Some(folders) = env.omit_folders.clone() {
        watch.omit_folders = folders;
    }
    if let Some(resume) = env.resume_watchers {
        watch.resume_on_start = resume;
    }

    let reconcile = &mut config.reconcile;
    if let Some(on_start) = file.reconcile.on_start {
        reconcile.on_start = on_start;
    }
    if let Some(threshold) = file.reconcile.report_detail_threshold {
        reconcile.report_detail_threshold = threshold;
    }
    if let Some(on_start) = env.reconcile_on_start {
        reconcile.on_start = on_start;
    }
    if let Some(threshold) = env.report_detail_threshold {
        reconcile.report_detail_threshold = threshold;
    }

    if let Some(filter) = file.logging.filter.filter(|f| !f.trim().is_empty()) {
        config.logging.filter = filter;
    }
    if let Some(filter) = env.log_filter.clone() {
        config.logging.filter = filter;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_extension_falls_back_to_json() {
        let parsed = parse_config(
            r#"{"database": {"max_connections": 3}}"#,
            Path::new("tracker.conf"),
        )
        .unwrap();
        assert_eq!(parsed.database.max_connections, Some(3));
    }

    #[test]
    fn env_path_override_drops_file_url() {
        let mut file = FileConfig::default();
        file.database.url = Some("sqlite://from-file.db".into());
        let env = EnvConfig {
            database_path: Some(PathBuf::from("/var/lib/filetracker/db.sqlite")),
            ..EnvConfig::default()
        };
        let config = merge(file, &env);
        assert_eq!(config.database.url, None);
        assert_eq!(
            config.database.path,
            PathBuf::from("/var/lib/filetracker/db.sqlite")
        );
    }
}
