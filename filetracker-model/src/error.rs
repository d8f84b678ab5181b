use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    EmptyName,
    InvalidExtension(String),
    InvalidFolderName(String),
    InvalidInterval(u64),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::EmptyName => write!(f, "collection name cannot be empty"),
            ModelError::InvalidExtension(ext) => {
                write!(f, "invalid file extension '{ext}'")
            }
            ModelError::InvalidFolderName(name) => write!(
                f,
                "invalid folder name '{name}': must be relative and may not contain '..'"
            ),
            ModelError::InvalidInterval(secs) => {
                write!(f, "process interval of {secs}s is out of range")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
