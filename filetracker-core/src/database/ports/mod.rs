//! Repository ports (interfaces) for the metadata store.
//! Application services depend on these traits; SQLite adapters live under
//! `database::infrastructure::sqlite`.

pub mod collections;
pub mod files;
pub mod settings;
