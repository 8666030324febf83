//! Error types for the insertion engine

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Engine errors
///
/// Everything except [`TestIdError::Cache`] is fatal for a run.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TestIdError {
    #[error("Can not {operation} {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Duplicate identifiers found: {}", ids.join(", "))]
    DuplicateIds { ids: Vec<String> },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TestIdError {
    pub fn io(operation: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type alias for engine operations
pub type TestIdResult<T> = Result<T, TestIdError>;
