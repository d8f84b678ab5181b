use std::any::type_name_of_val;
use std::fmt;
use std::sync::Arc;

use crate::database::infrastructure::sqlite::{
    SqliteCollectionRepository, SqliteFileRepository, SqliteSettingsRepository,
};
use crate::database::ports::{
    collections::CollectionRepository, files::FileRepository, settings::SettingsRepository,
};
use crate::database::sqlite::SqliteDatabase;

/// Aggregates the repository ports used by application services.
#[derive(Clone)]
pub struct AppUnitOfWork {
    pub collections: Arc<dyn CollectionRepository>,
    pub files: Arc<dyn FileRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl fmt::Debug for AppUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppUnitOfWork")
            .field("collections", &type_name_of_val(self.collections.as_ref()))
            .field("files", &type_name_of_val(self.files.as_ref()))
            .field("settings", &type_name_of_val(self.settings.as_ref()))
            .finish()
    }
}

impl AppUnitOfWork {
    pub fn new(
        collections: Arc<dyn CollectionRepository>,
        files: Arc<dyn FileRepository>,
        settings: Arc<dyn SettingsRepository>,
    ) -> Self {
        Self {
            collections,
            files,
            settings,
        }
    }

    /// Wire every port to its SQLite adapter over a shared pool.
    pub fn from_sqlite(sqlite: &SqliteDatabase) -> Self {
        let pool = sqlite.pool().clone();
        Self {
            collections: Arc::new(SqliteCollectionRepository::new(pool.clone())),
            files: Arc::new(SqliteFileRepository::new(pool.clone())),
            settings: Arc::new(SqliteSettingsRepository::new(pool)),
        }
    }
}
