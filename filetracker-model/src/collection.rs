use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::{ModelError, Result};
use crate::ids::CollectionId;

/// A named, tracked folder plus its filter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub description: Option<String>,
    pub source_folder: PathBuf,
    /// Allow-list of lowercase extensions without the leading dot. `None`
    /// accepts every file.
    pub include_extensions: Option<Vec<String>>,
    /// Relative folder names skipped during scans and watches.
    pub exclude_folders: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a collection.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewCollection {
    pub name: String,
    pub description: Option<String>,
    pub source_folder: PathBuf,
    pub include_extensions: Option<Vec<String>>,
    pub exclude_folders: Option<Vec<String>>,
}

impl NewCollection {
    pub fn new(name: impl Into<String>, source_folder: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_folder: source_folder.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_excluded_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_folders = Some(folders.into_iter().map(Into::into).collect());
        self
    }

    /// Trim and normalise user-provided values. The source folder is left
    /// untouched; filesystem validation happens in the core crate.
    pub fn normalized(mut self) -> Result<Self> {
        self.name = normalize_name(&self.name)?;
        self.description = normalize_description(self.description);
        self.include_extensions = normalize_extensions(self.include_extensions)?;
        self.exclude_folders = normalize_folder_names(self.exclude_folders)?;
        Ok(self)
    }
}

/// Partial update for a collection. `None` leaves a field unchanged; an empty
/// list clears the corresponding filter.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollectionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub source_folder: Option<PathBuf>,
    pub include_extensions: Option<Vec<String>>,
    pub exclude_folders: Option<Vec<String>>,
}

impl CollectionUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.source_folder.is_none()
            && self.include_extensions.is_none()
            && self.exclude_folders.is_none()
    }

    /// Merge the update into an existing collection, normalising as
    /// [`NewCollection::normalized`] does.
    pub fn apply_to(&self, collection: &Collection) -> Result<Collection> {
        let mut merged = collection.clone();
        if let Some(name) = &self.name {
            merged.name = normalize_name(name)?;
        }
        if let Some(description) = &self.description {
            merged.description = normalize_description(Some(description.clone()));
        }
        if let Some(folder) = &self.source_folder {
            merged.source_folder = folder.clone();
        }
        if let Some(extensions) = &self.include_extensions {
            merged.include_extensions = normalize_extensions(Some(extensions.clone()))?;
        }
        if let Some(folders) = &self.exclude_folders {
            merged.exclude_folders = normalize_folder_names(Some(folders.clone()))?;
        }
        Ok(merged)
    }
}

fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ModelError::EmptyName);
    }
    Ok(trimmed.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Lowercase, strip leading dots, drop blanks and duplicates. An empty result
/// collapses to `None` (no filter).
pub fn normalize_extensions(extensions: Option<Vec<String>>) -> Result<Option<Vec<String>>> {
    let Some(extensions) = extensions else {
        return Ok(None);
    };

    let mut normalized: Vec<String> = Vec::with_capacity(extensions.len());
    for raw in extensions {
        let ext = raw.trim().trim_start_matches('.').to_ascii_lowercase();
        if ext.is_empty() {
            continue;
        }
        if ext.contains(['/', '\\']) || ext.chars().any(char::is_whitespace) {
            return Err(ModelError::InvalidExtension(raw));
        }
        if !normalized.contains(&ext) {
            normalized.push(ext);
        }
    }

    Ok((!normalized.is_empty()).then_some(normalized))
}

/// Trim whitespace and trailing separators, normalise `\` to `/`, reject
/// absolute names and parent references.
pub fn normalize_folder_names(folders: Option<Vec<String>>) -> Result<Option<Vec<String>>> {
    let Some(folders) = folders else {
        return Ok(None);
    };

    let mut normalized: Vec<String> = Vec::with_capacity(folders.len());
    for raw in folders {
        let cleaned = raw.trim().replace('\\', "/");
        let cleaned = cleaned.trim_end_matches('/');
        if cleaned.is_empty() {
            continue;
        }
        if cleaned.starts_with('/') || cleaned.split('/').any(|seg| seg == "..") {
            return Err(ModelError::InvalidFolderName(raw));
        }
        let cleaned = cleaned
            .split('/')
            .filter(|seg| !seg.is_empty() && *seg != ".")
            .collect::<Vec<_>>()
            .join("/");
        if !cleaned.is_empty() && !normalized.contains(&cleaned) {
            normalized.push(cleaned);
        }
    }

    Ok((!normalized.is_empty()).then_some(normalized))
}
