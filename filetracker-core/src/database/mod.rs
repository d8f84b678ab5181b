//! Metadata store: SQLite adapter, repository ports and their implementations.

pub mod context;
pub mod infrastructure;
pub mod ports;
pub mod sqlite;

pub use context::DatabaseContext;
pub use sqlite::{PoolStats, SqliteDatabase, StoreOptions};

use std::path::Path;

/// Stored form of a path. Non-UTF-8 paths cannot be tracked.
pub(crate) fn path_key(path: &Path) -> Option<&str> {
    path.to_str()
}
