#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod local;
pub mod qdrant;

mod config;
mod error;
mod similarity;
mod store;

pub use config::VectorStoreConfig;
pub use error::{VectorError, VectorResult};
pub use local::{LocalBackend, LocalConfig};
pub use qdrant::{QdrantBackend, QdrantConfig};
pub use similarity::cosine_similarity;
pub use store::{ScoredRecord, VectorIndex, VectorRecord, VectorStore, VectorStoreBackend};

/// Tracing target for vector store operations.
pub const TRACING_TARGET: &str = "mediqa_vector";
