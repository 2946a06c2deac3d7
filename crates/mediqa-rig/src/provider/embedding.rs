//! Embedding provider abstraction.
//!
//! Wraps different embedding model providers behind the [`Embedder`] trait so
//! the retrieval pipeline never carries generic model parameters.

use async_trait::async_trait;
#[cfg(feature = "ollama")]
use rig::client::Nothing;
use rig::embeddings::{Embedding, EmbeddingModel as RigEmbeddingModel};
use rig::prelude::EmbeddingsClient;
#[cfg(feature = "ollama")]
use rig::providers::ollama;
use rig::providers::openai;

use super::{ProviderBackend, ProviderSettings};
use crate::{Error, Result, TRACING_TARGET};

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model name.
    fn model_name(&self) -> &str;

    /// Returns the number of dimensions of every produced vector.
    fn ndims(&self) -> usize;

    /// Embeds multiple texts, returning one vector per text in input order.
    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embeds a single text.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_texts(vec![text.to_owned()])
            .await?
            .pop()
            .ok_or_else(|| Error::embedding("provider returned no embedding"))
    }
}

/// Embedding provider that wraps different rig model implementations.
#[derive(Clone)]
pub enum EmbeddingProvider {
    /// Ollama embedding model.
    #[cfg(feature = "ollama")]
    Ollama {
        client: ollama::Client,
        model: String,
        ndims: usize,
    },
    /// OpenAI embedding model.
    OpenAi {
        model: openai::EmbeddingModel,
        model_name: String,
    },
}

impl EmbeddingProvider {
    /// Connects to the configured backend.
    pub fn connect(settings: &ProviderSettings, model: &str, ndims: usize) -> Result<Self> {
        let provider = match settings.backend {
            #[cfg(feature = "ollama")]
            ProviderBackend::Ollama => Self::ollama(&settings.base_url, model, ndims)?,
            #[cfg(not(feature = "ollama"))]
            ProviderBackend::Ollama => {
                return Err(Error::config("built without the `ollama` feature"));
            }
            ProviderBackend::OpenAi => Self::openai(settings.require_api_key()?, model, ndims)?,
        };

        tracing::debug!(
            target: TRACING_TARGET,
            backend = %settings.backend,
            model = %model,
            ndims = ndims,
            "Connected embedding provider"
        );

        Ok(provider)
    }

    /// Creates a new Ollama embedding provider.
    #[cfg(feature = "ollama")]
    pub fn ollama(base_url: &str, model: &str, ndims: usize) -> Result<Self> {
        let client = ollama::Client::builder()
            .api_key(Nothing)
            .base_url(base_url)
            .build()
            .map_err(|e| Error::config(format!("invalid ollama client: {e}")))?;

        Ok(Self::Ollama {
            client,
            model: model.to_owned(),
            ndims,
        })
    }

    /// Creates a new OpenAI embedding provider.
    pub fn openai(api_key: &str, model: &str, ndims: usize) -> Result<Self> {
        let client = openai::Client::new(api_key)
            .map_err(|e| Error::config(format!("invalid openai client: {e}")))?;

        Ok(Self::OpenAi {
            model: client.embedding_model_with_ndims(model, ndims),
            model_name: model.to_owned(),
        })
    }

    /// Returns the provider name.
    pub fn provider_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "ollama")]
            Self::Ollama { .. } => "ollama",
            Self::OpenAi { .. } => "openai",
        }
    }

    async fn embed_raw(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let result = match self {
            #[cfg(feature = "ollama")]
            Self::Ollama {
                client,
                model,
                ndims,
            } => {
                let embedding_model = ollama::EmbeddingModel::new(client.clone(), model, *ndims);
                embedding_model.embed_texts(texts).await
            }
            Self::OpenAi { model, .. } => model.embed_texts(texts).await,
        };

        result.map_err(|e| Error::embedding(format!("{}: {e}", self.provider_name())))
    }
}

#[async_trait]
impl Embedder for EmbeddingProvider {
    fn model_name(&self) -> &str {
        match self {
            #[cfg(feature = "ollama")]
            Self::Ollama { model, .. } => model,
            Self::OpenAi { model_name, .. } => model_name,
        }
    }

    fn ndims(&self) -> usize {
        match self {
            #[cfg(feature = "ollama")]
            Self::Ollama { ndims, .. } => *ndims,
            Self::OpenAi { model, .. } => model.ndims(),
        }
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let embeddings = self.embed_raw(texts).await?;
        if embeddings.len() != expected {
            return Err(Error::embedding(format!(
                "{} returned {} embeddings for {expected} texts",
                self.provider_name(),
                embeddings.len()
            )));
        }

        Ok(embeddings
            .into_iter()
            .map(|embedding| embedding.vec.into_iter().map(|x| x as f32).collect())
            .collect())
    }
}

impl std::fmt::Debug for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "ollama")]
            Self::Ollama { model, ndims, .. } => f
                .debug_struct("EmbeddingProvider::Ollama")
                .field("model", model)
                .field("ndims", ndims)
                .finish(),
            Self::OpenAi { model, model_name } => f
                .debug_struct("EmbeddingProvider::OpenAi")
                .field("model", model_name)
                .field("ndims", &model.ndims())
                .finish(),
        }
    }
}
