use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::types::Json;
use tracing::info;

use filetracker_model::{Collection, CollectionId, NewCollection};

use super::{is_unique_violation, truncate_to_millis};
use crate::database::path_key;
use crate::database::ports::collections::CollectionRepository;
use crate::error::{Result, TrackerError};

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, description, source_folder, include_extensions,
           exclude_folders, created_at, updated_at
    FROM collections
"#;

#[derive(Clone, Debug)]
pub struct SqliteCollectionRepository {
    pool: SqlitePool,
}

impl SqliteCollectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn folder_key(folder: &std::path::Path) -> Result<&str> {
    path_key(folder).ok_or_else(|| TrackerError::InvalidSourceFolder {
        path: folder.to_path_buf(),
        reason: "path is not valid UTF-8".into(),
    })
}

#[async_trait]
impl CollectionRepository for SqliteCollectionRepository {
    async fn create(&self, collection: &NewCollection) -> Result<Collection> {
        let now = truncate_to_millis(Utc::now());
        let row = sqlx::query_as::<_, CollectionRow>(
            r#"
            INSERT INTO collections
                (name, description, source_folder, include_extensions,
                 exclude_folders, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, name, description, source_folder, include_extensions,
                      exclude_folders, created_at, updated_at
            "#,
        )
        .bind(&collection.name)
        .bind(&collection.description)
        .bind(folder_key(&collection.source_folder)?)
        .bind(collection.include_extensions.clone().map(Json))
        .bind(collection.exclude_folders.clone().map(Json))
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                TrackerError::AlreadyExists(collection.name.clone())
            } else {
                TrackerError::Database(e)
            }
        })?;

        let created: Collection = row.into();
        info!(
            collection_id = %created.id,
            name = %created.name,
            folder = %created.source_folder.display(),
            "Collection created"
        );
        Ok(created)
    }

    async fn get(&self, id: CollectionId) -> Result<Option<Collection>> {
        let row = sqlx::query_as::<_, CollectionRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.as_i64())
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Collection>> {
        let row =
            sqlx::query_as::<_, CollectionRow>(&format!("{SELECT_COLUMNS} WHERE name = ?"))
                .bind(name)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(Into::into))
    }

    async fn list(&self) -> Result<Vec<Collection>> {
        let rows = sqlx::query_as::<_, CollectionRow>(&format!("{SELECT_COLUMNS} ORDER BY id"))
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update(&self, collection: &Collection) -> Result<Collection> {
        let now = truncate_to_millis(Utc::now());
        let row = sqlx::query_as::<_, CollectionRow>(
            r#"
            UPDATE collections
            SET name = ?, description = ?, source_folder = ?,
                include_extensions = ?, exclude_folders = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, name, description, source_folder, include_extensions,
                      exclude_folders, created_at, updated_at
            "#,
        )
        .bind(&collection.name)
        .bind(&collection.description)
        .bind(folder_key(&collection.source_folder)?)
        .bind(collection.include_extensions.clone().map(Json))
        .bind(collection.exclude_folders.clone().map(Json))
        .bind(now)
        .bind(collection.id.as_i64())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                TrackerError::AlreadyExists(collection.name.clone())
            } else {
                TrackerError::Database(e)
            }
        })?;

        row.map(Into::into)
            .ok_or(TrackerError::CollectionNotFound(collection.id))
    }

    async fn delete(&self, id: CollectionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM collections WHERE id = ?")
            .bind(id.as_i64())
            .execute(self.pool())
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(collection_id = %id, "Collection deleted");
        }
        Ok(deleted)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collections")
            .fetch_one(self.pool())
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: i64,
    name: String,
    description: Option<String>,
    source_folder: String,
    include_extensions: Option<Json<Vec<String>>>,
    exclude_folders: Option<Json<Vec<String>>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CollectionRow> for Collection {
    fn from(row: CollectionRow) -> Self {
        Collection {
            id: CollectionId(row.id),
            name: row.name,
            description: row.description,
            source_folder: PathBuf::from(row.source_folder),
            include_extensions: row.include_extensions.map(|Json(v)| v),
            exclude_folders: row.exclude_folders.map(|Json(v)| v),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
