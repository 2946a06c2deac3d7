//! RAG and reader configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

/// How documents are cut into chunks before embedding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SplittingStrategy {
    /// Largest paragraph, sentence or word run that fits `chunk_size`.
    #[default]
    Sentence,
    /// Consecutive sentences merged while their embeddings stay similar.
    Semantic,
}

/// Configuration for the vector DB manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSettings {
    /// Dimension of every stored vector.
    pub embedding_dimension: usize,

    /// Name of the vector index.
    pub index_name: String,

    /// Model used to embed queries and chunks.
    pub encoder_name: String,

    /// Model used to find semantic split points. Defaults to `encoder_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splitter_encoder_name: Option<String>,

    /// Maximum chunk size in characters.
    pub chunk_size: usize,

    /// Number of texts sent per embedding request.
    pub batch_size: usize,

    /// Chunking strategy.
    pub encoding_strategy: SplittingStrategy,

    /// Minimum cosine similarity for merging sentences in semantic mode.
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,

    /// Storage location of the local vector store.
    pub db_location: PathBuf,

    /// Maximum documents returned per query.
    pub n_results: usize,

    /// Directory holding the knowledge corpus.
    pub knowledge_path: PathBuf,
}

fn default_semantic_threshold() -> f32 {
    0.75
}

impl RagSettings {
    /// Returns the model used by the splitter.
    pub fn splitter_encoder(&self) -> &str {
        self.splitter_encoder_name
            .as_deref()
            .unwrap_or(&self.encoder_name)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimension == 0 {
            return Err(Error::config("rag.embedding_dimension must be positive"));
        }
        if self.index_name.trim().is_empty() {
            return Err(Error::config("rag.index_name must not be empty"));
        }
        if self.encoder_name.trim().is_empty() {
            return Err(Error::config("rag.encoder_name must not be empty"));
        }
        if self.chunk_size == 0 {
            return Err(Error::config("rag.chunk_size must be positive"));
        }
        if self.batch_size == 0 {
            return Err(Error::config("rag.batch_size must be positive"));
        }
        if self.n_results == 0 {
            return Err(Error::config("rag.n_results must be positive"));
        }
        if !(0.0..=1.0).contains(&self.semantic_threshold) {
            return Err(Error::config("rag.semantic_threshold must be within 0..=1"));
        }
        Ok(())
    }
}

/// Configuration for the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderSettings {
    /// Generative model name.
    pub model_name: String,

    /// Request reduced-precision weights from the provider.
    pub quantize: bool,

    /// Sampling temperature.
    pub temperature: f64,

    /// Sample instead of greedy decoding.
    pub do_sample: bool,

    /// Penalty applied to repeated tokens.
    pub repetition_penalty: f64,

    /// Upper bound on generated tokens.
    pub max_new_tokens: u64,

    /// Generation deadline in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl ReaderSettings {
    /// Returns the generation deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(Error::config("reader.model_name must not be empty"));
        }
        if self.temperature.is_nan() || self.temperature < 0.0 {
            return Err(Error::config("reader.temperature must be non-negative"));
        }
        if self.repetition_penalty.is_nan() || self.repetition_penalty <= 0.0 {
            return Err(Error::config("reader.repetition_penalty must be positive"));
        }
        if self.max_new_tokens == 0 {
            return Err(Error::config("reader.max_new_tokens must be positive"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("reader.timeout_secs must be positive"));
        }
        Ok(())
    }
}
