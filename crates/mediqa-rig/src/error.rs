//! Error types for mediqa-rig.

use std::fmt;
use std::time::Duration;

use mediqa_vector::VectorError;

/// Result type alias for rig operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during retrieval and generation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The vector store could not be reached or persisted to.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Any other vector store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Generation failed at the provider.
    #[error("generation error: {provider}: {message}")]
    Generation { provider: String, message: String },

    /// Generation did not finish before the deadline.
    #[error("generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    /// Questions and retrievals of one batch differ in length.
    #[error("batch size mismatch: {questions} questions, {retrievals} retrievals")]
    BatchSizeMismatch { questions: usize, retrievals: usize },

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Creates a configuration error.
    pub fn config(message: impl fmt::Display) -> Self {
        Self::Config(message.to_string())
    }

    /// Creates an embedding error.
    pub fn embedding(message: impl fmt::Display) -> Self {
        Self::Embedding(message.to_string())
    }

    /// Creates a generation error.
    pub fn generation(provider: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Generation {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }

    /// Returns true if the vector store was unreachable.
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl From<VectorError> for Error {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::StorageUnavailable(message) => Self::StorageUnavailable(message),
            other => Self::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_store_maps_to_storage_unavailable() {
        let err = Error::from(VectorError::unavailable("connection refused"));
        assert!(err.is_storage_unavailable());

        let err = Error::from(VectorError::dimension_mismatch(3, 4));
        assert!(matches!(err, Error::Storage(_)));
    }
}
