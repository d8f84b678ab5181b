//! Configuration for the filetracker daemon.
//!
//! [`ConfigLoader`] layers built-in defaults, an optional `.env` file, a
//! TOML/JSON config file and environment overrides into a [`TrackerConfig`],
//! then runs the guard rails in [`validation`]. Hard failures surface as
//! [`ConfigLoadError`]; questionable but usable values come back as
//! [`ConfigWarnings`] next to the config.

pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, error::ConfigLoadError};
pub use models::sources::{EnvConfig, FileConfig};
pub use models::{
    ConfigMetadata, ConfigSource, DatabaseConfig, DatabaseTarget, LoggingConfig,
    ReconcileConfig, TrackerConfig, WatchConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
