use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::application::unit_of_work::AppUnitOfWork;
use crate::database::sqlite::{SqliteDatabase, StoreOptions};
use crate::error::Result;

/// Bundles the SQLite infra with the application-facing unit of work.
///
/// Callers grab the repository ports they need through [`AppUnitOfWork`]
/// while services that need multi-statement transactions reach the raw pool
/// through [`DatabaseContext::sqlite`].
#[derive(Clone)]
pub struct DatabaseContext {
    sqlite: Arc<SqliteDatabase>,
    unit_of_work: Arc<AppUnitOfWork>,
}

impl fmt::Debug for DatabaseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseContext")
            .field("sqlite", &self.sqlite)
            .field("unit_of_work_ptr", &Arc::as_ptr(&self.unit_of_work))
            .finish()
    }
}

impl DatabaseContext {
    /// Open a pool for `url` and compose the default unit of work.
    pub async fn connect(url: &str, options: &StoreOptions) -> Result<Self> {
        let sqlite = Arc::new(SqliteDatabase::connect(url, options).await?);
        Ok(Self::from_sqlite(sqlite))
    }

    pub async fn open(path: &Path, options: &StoreOptions) -> Result<Self> {
        let sqlite = Arc::new(SqliteDatabase::open(path, options).await?);
        Ok(Self::from_sqlite(sqlite))
    }

    /// Compose a database context from an existing SQLite adapter.
    pub fn from_sqlite(sqlite: Arc<SqliteDatabase>) -> Self {
        let unit_of_work = Arc::new(AppUnitOfWork::from_sqlite(&sqlite));
        Self {
            sqlite,
            unit_of_work,
        }
    }

    pub fn unit_of_work(&self) -> Arc<AppUnitOfWork> {
        Arc::clone(&self.unit_of_work)
    }

    pub fn sqlite(&self) -> Arc<SqliteDatabase> {
        Arc::clone(&self.sqlite)
    }
}
