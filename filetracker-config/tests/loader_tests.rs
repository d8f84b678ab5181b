use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use filetracker_config::{
    ConfigLoadError, ConfigLoader, ConfigSource, ConfigWarning, DatabaseTarget, EnvConfig,
};

fn env(pairs: &[(&str, &str)]) -> EnvConfig {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvConfig::from_lookup(|name| map.get(name).cloned())
}

fn isolated_loader(root: &std::path::Path) -> ConfigLoader {
    ConfigLoader::new()
        .without_env_file()
        .with_search_root(root)
        .with_env(EnvConfig::default())
}

#[test]
fn defaults_without_any_source() {
    let dir = tempfile::tempdir().unwrap();
    let load = isolated_loader(dir.path()).load().unwrap();

    assert_eq!(load.config.metadata.source, ConfigSource::Default);
    assert!(!load.config.metadata.env_file_loaded);
    assert_eq!(
        load.config.database.target(),
        DatabaseTarget::Path(PathBuf::from("filetracker.db"))
    );
    assert_eq!(load.config.watch.process_interval_secs, 15);
    assert!(load.config.watch.resume_on_start);
    assert!(!load.config.reconcile.on_start);
    assert!(load.warnings.is_empty());

    let options = load.config.tracker_options();
    assert_eq!(options.supervisor.defaults.process_interval, 15);
    assert_eq!(options.supervisor.stop_timeout, Duration::from_millis(2_000));
    assert_eq!(load.config.store_options().max_connections, 8);
}

#[test]
fn discovers_toml_candidate_and_env_wins() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("config")).unwrap();
    fs::write(
        dir.path().join("config/filetracker.toml"),
        r#"
[database]
url = "sqlite://from-file.db"
max_connections = 2

[watch]
process_interval_secs = 30
omit_folders = ["node_modules"]

[reconcile]
on_start = true
report_detail_threshold = 10

[logging]
filter = "debug"
"#,
    )
    .unwrap();

    let load = isolated_loader(dir.path())
        .with_env(env(&[
            ("FILETRACKER_PROCESS_INTERVAL", "5"),
            ("FILETRACKER_LOG", "warn"),
        ]))
        .load()
        .unwrap();
    let config = load.config;

    assert_eq!(
        config.metadata.source,
        ConfigSource::File(dir.path().join("config/filetracker.toml"))
    );
    assert_eq!(
        config.database.target(),
        DatabaseTarget::Url("sqlite://from-file.db".into())
    );
    assert_eq!(config.database.max_connections, 2);
    assert_eq!(config.watch.process_interval_secs, 5);
    assert_eq!(config.watch.omit_folders, vec!["node_modules".to_string()]);
    assert!(config.reconcile.on_start);
    assert_eq!(config.reconcile.report_detail_threshold, 10);
    assert_eq!(config.logging.filter, "warn");

    let defaults = config.tracker_options().supervisor.defaults;
    assert_eq!(defaults.omit_folders, vec!["node_modules".to_string()]);
    assert!(defaults.enabled);
}

#[test]
fn config_path_from_env_reads_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.json");
    fs::write(&path, r#"{"watch": {"include_subdirectories": false}}"#).unwrap();

    let load = isolated_loader(dir.path())
        .with_env(env(&[("FILETRACKER_CONFIG_PATH", path.to_str().unwrap())]))
        .load()
        .unwrap();

    assert_eq!(load.config.metadata.source, ConfigSource::EnvPath(path));
    assert!(!load.config.watch.include_subdirectories);
}

#[test]
fn zero_connections_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = isolated_loader(dir.path())
        .with_env(env(&[("FILETRACKER_DB_MAX_CONNECTIONS", "0")]))
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::GuardRail(_)));
}

#[test]
fn malformed_file_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filetracker.toml");
    fs::write(&path, "[watch\nprocess_interval_secs = ").unwrap();

    let err = isolated_loader(dir.path()).load().unwrap_err();
    match err {
        ConfigLoadError::Parse { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_explicit_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = isolated_loader(dir.path())
        .with_config_path(dir.path().join("absent.toml"))
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::Io { .. }));
}

#[test]
fn questionable_values_become_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let load = isolated_loader(dir.path())
        .with_env(env(&[
            ("FILETRACKER_PROCESS_INTERVAL", "0"),
            ("FILETRACKER_RESUME_WATCHERS", "sometimes"),
        ]))
        .load()
        .unwrap();

    assert!(load.warnings.contains(&ConfigWarning::DebounceDisabled));
    assert!(load.warnings.contains(&ConfigWarning::UnparsedEnvVar {
        name: "FILETRACKER_RESUME_WATCHERS".into(),
        value: "sometimes".into(),
    }));
    assert!(load.config.watch.resume_on_start);
}

#[test]
fn explicit_env_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let env_path = dir.path().join("tracker.env");
    fs::write(&env_path, "FILETRACKER_TEST_ONLY_MARKER=1\n").unwrap();

    let load = ConfigLoader::new()
        .with_env_file(&env_path)
        .with_search_root(dir.path())
        .with_env(EnvConfig::default())
        .load()
        .unwrap();
    assert!(load.config.metadata.env_file_loaded);
}
