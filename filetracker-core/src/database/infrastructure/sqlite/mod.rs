//! SQLite infrastructure adapters implementing the database ports.

pub mod repositories;

pub use repositories::collections::SqliteCollectionRepository;
pub use repositories::files::SqliteFileRepository;
pub use repositories::settings::SqliteSettingsRepository;
