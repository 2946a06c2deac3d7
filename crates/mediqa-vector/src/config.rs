//! Vector store configuration types.

use serde::{Deserialize, Serialize};

pub use crate::local::LocalConfig;
pub use crate::qdrant::QdrantConfig;

/// Vector store backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum VectorStoreConfig {
    /// Embedded store persisted under a local directory.
    Local(LocalConfig),
    /// Qdrant vector database.
    Qdrant(QdrantConfig),
}

impl VectorStoreConfig {
    /// Returns the backend name as a static string.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Qdrant(_) => "qdrant",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_tagged_backend() {
        let config: VectorStoreConfig =
            serde_json::from_str(r#"{"type":"qdrant","url":"http://localhost:6334"}"#).unwrap();
        assert_eq!(config.backend_name(), "qdrant");

        let config: VectorStoreConfig =
            serde_json::from_str(r#"{"type":"local","path":"db"}"#).unwrap();
        assert_eq!(config, VectorStoreConfig::Local(LocalConfig::new("db")));
    }
}
