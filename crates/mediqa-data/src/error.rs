//! Data preparation error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for data preparation.
pub type DataResult<T> = Result<T, DataError>;

/// Data preparation errors.
#[derive(Debug, Error)]
pub enum DataError {
    /// A file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON-lines record is malformed.
    #[error("{path}:{line}: {source}")]
    Record {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A required CSV column is absent from the header.
    #[error("{path}: missing column {column:?}")]
    MissingColumn { path: PathBuf, column: &'static str },

    /// CSV parsing or writing failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid settings.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DataError {
    /// Creates an I/O error bound to a path.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
