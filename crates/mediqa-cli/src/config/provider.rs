//! Model provider and pipeline wiring.

use std::sync::Arc;

use anyhow::Context;
use mediqa_rig::provider::{CompletionProvider, Embedder, EmbeddingProvider, TextGenerator};
use mediqa_rig::rag::{Reader, VectorDbManager};
use mediqa_server::service::QaService;
use mediqa_vector::VectorStore;

use super::Settings;
use crate::TRACING_TARGET_CONFIG;

/// Model handles shared by the pipeline components.
#[derive(Clone)]
pub struct Providers {
    /// Embeds chunks and queries.
    pub embedder: Arc<dyn Embedder>,
    /// Finds semantic split points.
    pub splitter_embedder: Arc<dyn Embedder>,
    /// Generates answers.
    pub generator: Arc<dyn TextGenerator>,
}

impl Providers {
    /// Connects the embedding models.
    ///
    /// The splitter reuses the query embedder unless a different model is set.
    pub fn embedders(
        settings: &Settings,
    ) -> anyhow::Result<(Arc<dyn Embedder>, Arc<dyn Embedder>)> {
        let rag = &settings.rag;
        let embedder: Arc<dyn Embedder> = Arc::new(
            EmbeddingProvider::connect(
                &settings.provider,
                &rag.encoder_name,
                rag.embedding_dimension,
            )
            .context("failed to connect the embedding model")?,
        );

        let splitter_embedder = if rag.splitter_encoder() == rag.encoder_name {
            embedder.clone()
        } else {
            Arc::new(
                EmbeddingProvider::connect(
                    &settings.provider,
                    rag.splitter_encoder(),
                    rag.embedding_dimension,
                )
                .context("failed to connect the splitter embedding model")?,
            )
        };

        Ok((embedder, splitter_embedder))
    }

    /// Connects every model named by the settings.
    pub fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let (embedder, splitter_embedder) = Self::embedders(settings)?;
        let generator: Arc<dyn TextGenerator> = Arc::new(
            CompletionProvider::connect(&settings.provider, &settings.reader.model_name)
                .context("failed to connect the generative model")?,
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            backend = %settings.provider.backend,
            encoder = %embedder.model_name(),
            splitter_encoder = %splitter_embedder.model_name(),
            generator = %generator.model_name(),
            "Model providers connected"
        );

        Ok(Self {
            embedder,
            splitter_embedder,
            generator,
        })
    }
}

/// Opens the vector store and the manager of the configured index.
pub async fn create_vector_db_manager(
    settings: &Settings,
    embedder: Arc<dyn Embedder>,
    splitter_embedder: Arc<dyn Embedder>,
) -> anyhow::Result<VectorDbManager> {
    let store = VectorStore::new(&settings.vector_store())
        .await
        .context("failed to open the vector store")?;

    VectorDbManager::new(settings.rag.clone(), embedder, splitter_embedder, &store)
        .await
        .context("failed to create the vector DB manager")
}

/// Builds the question answering service from connected providers.
pub async fn create_qa_service(
    settings: &Settings,
    providers: Providers,
    populate: bool,
) -> anyhow::Result<QaService> {
    let manager =
        create_vector_db_manager(settings, providers.embedder, providers.splitter_embedder).await?;

    if populate {
        manager
            .populate(&settings.rag.knowledge_path)
            .await
            .context("failed to populate the index")?;
    }

    let reader = Reader::new(settings.reader.clone(), providers.generator)
        .context("failed to create the reader")?;

    Ok(QaService::new(Arc::new(manager), Arc::new(reader)))
}
