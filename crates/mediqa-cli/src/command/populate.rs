use anyhow::Context;

use crate::TRACING_TARGET_CONFIG;
use crate::config::{Cli, Providers, create_vector_db_manager};

/// Indexes the corpus under `rag.knowledge_path`.
pub async fn populate(cli: &Cli) -> anyhow::Result<()> {
    let settings = cli.settings()?;
    let (embedder, splitter_embedder) = Providers::embedders(&settings)?;
    let manager = create_vector_db_manager(&settings, embedder, splitter_embedder).await?;

    let corpus = &settings.rag.knowledge_path;
    let report = manager
        .populate(corpus)
        .await
        .with_context(|| format!("failed to populate from {}", corpus.display()))?;

    tracing::info!(
        target: TRACING_TARGET_CONFIG,
        corpus = %corpus.display(),
        documents_seen = report.documents_seen,
        documents_indexed = report.documents_indexed,
        documents_skipped = report.documents_skipped,
        chunks_written = report.chunks_written,
        "Population finished"
    );

    Ok(())
}
