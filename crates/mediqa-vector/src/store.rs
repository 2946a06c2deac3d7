//! Vector store trait and index handle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET;
use crate::config::VectorStoreConfig;
use crate::error::{VectorError, VectorResult};
use crate::local::LocalBackend;
use crate::qdrant::QdrantBackend;

/// Vector data to be stored.
///
/// Ids must be UUID strings when the Qdrant backend is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique identifier for the vector.
    pub id: String,
    /// The embedding vector.
    pub vector: Vec<f32>,
    /// Payload stored alongside the vector.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl VectorRecord {
    /// Creates a new record with an ID and embedding.
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata: HashMap::new(),
        }
    }

    /// Adds a single metadata field.
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A record returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    /// Vector ID.
    pub id: String,
    /// Similarity score, higher is more similar.
    pub score: f32,
    /// Associated metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ScoredRecord {
    /// Returns a string metadata field.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Trait for vector store backends.
#[async_trait]
pub trait VectorStoreBackend: Send + Sync {
    /// Returns the backend name.
    fn backend_name(&self) -> &'static str;

    /// Creates the index if missing; an existing index is left untouched.
    async fn create_or_get_index(&self, name: &str, dimensions: usize) -> VectorResult<()>;

    /// Inserts or replaces records by id.
    async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> VectorResult<()>;

    /// Returns at most `top_k` records ordered by descending similarity.
    async fn query(
        &self,
        index: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> VectorResult<Vec<ScoredRecord>>;

    /// Removes every record whose string metadata `key` equals `value`.
    async fn delete_by_field(&self, index: &str, key: &str, value: &str) -> VectorResult<()>;

    /// Returns the subset of `ids` present in the index.
    async fn existing_ids(&self, index: &str, ids: &[String]) -> VectorResult<HashSet<String>>;

    /// Returns the number of records in the index.
    async fn count(&self, index: &str) -> VectorResult<usize>;
}

/// Unified vector store that wraps backend implementations.
#[derive(Clone)]
pub struct VectorStore {
    backend: Arc<dyn VectorStoreBackend>,
}

impl VectorStore {
    /// Creates a new vector store from configuration.
    pub async fn new(config: &VectorStoreConfig) -> VectorResult<Self> {
        let backend: Arc<dyn VectorStoreBackend> = match config {
            VectorStoreConfig::Local(cfg) => Arc::new(LocalBackend::open(cfg).await?),
            VectorStoreConfig::Qdrant(cfg) => Arc::new(QdrantBackend::new(cfg)?),
        };

        tracing::info!(
            target: TRACING_TARGET,
            backend = %config.backend_name(),
            "Vector store initialized"
        );

        Ok(Self { backend })
    }

    /// Wraps an already constructed backend.
    pub fn from_backend(backend: impl VectorStoreBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Returns the backend name.
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Creates the named index or returns the existing one.
    pub async fn open_index(&self, name: &str, dimensions: usize) -> VectorResult<VectorIndex> {
        if name.is_empty() {
            return Err(VectorError::invalid_config("index name must not be empty"));
        }
        if dimensions == 0 {
            return Err(VectorError::invalid_config(
                "index dimension must be greater than 0",
            ));
        }

        tracing::debug!(
            target: TRACING_TARGET,
            index = %name,
            dimensions = %dimensions,
            "Opening index"
        );
        self.backend.create_or_get_index(name, dimensions).await?;

        Ok(VectorIndex {
            name: name.to_owned(),
            dimensions,
            backend: self.backend.clone(),
        })
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

/// Handle to an opened index.
///
/// Cheap to clone; every clone talks to the same backend index.
#[derive(Clone)]
pub struct VectorIndex {
    name: String,
    dimensions: usize,
    backend: Arc<dyn VectorStoreBackend>,
}

impl VectorIndex {
    /// Returns the index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the vector dimension of the index.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Inserts or replaces records.
    pub async fn upsert(&self, records: Vec<VectorRecord>) -> VectorResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimensions) {
            return Err(VectorError::dimension_mismatch(
                self.dimensions,
                bad.vector.len(),
            ));
        }

        tracing::debug!(
            target: TRACING_TARGET,
            index = %self.name,
            count = %records.len(),
            "Upserting vectors"
        );
        self.backend.upsert(&self.name, records).await
    }

    /// Runs a top-K similarity query.
    pub async fn query(&self, vector: Vec<f32>, top_k: usize) -> VectorResult<Vec<ScoredRecord>> {
        if vector.len() != self.dimensions {
            return Err(VectorError::dimension_mismatch(
                self.dimensions,
                vector.len(),
            ));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        tracing::debug!(
            target: TRACING_TARGET,
            index = %self.name,
            top_k = %top_k,
            "Querying vectors"
        );
        let mut results = self.backend.query(&self.name, vector, top_k).await?;
        results.truncate(top_k);
        Ok(results)
    }

    /// Removes the records whose metadata `key` holds `value`.
    pub async fn delete_by_field(&self, key: &str, value: &str) -> VectorResult<()> {
        tracing::debug!(
            target: TRACING_TARGET,
            index = %self.name,
            key = %key,
            value = %value,
            "Deleting vectors"
        );
        self.backend.delete_by_field(&self.name, key, value).await
    }

    /// Returns the subset of `ids` already stored.
    pub async fn existing_ids(&self, ids: &[String]) -> VectorResult<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        self.backend.existing_ids(&self.name, ids).await
    }

    /// Returns true if the id is stored.
    pub async fn contains(&self, id: &str) -> VectorResult<bool> {
        let ids = [id.to_owned()];
        Ok(!self.existing_ids(&ids).await?.is_empty())
    }

    /// Returns the number of records in the index.
    pub async fn len(&self) -> VectorResult<usize> {
        self.backend.count(&self.name).await
    }

    /// Returns true if the index holds no records.
    pub async fn is_empty(&self) -> VectorResult<bool> {
        Ok(self.len().await? == 0)
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("name", &self.name)
            .field("dimensions", &self.dimensions)
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}
