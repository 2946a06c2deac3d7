//! Vector index population and retrieval.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mediqa_vector::{ScoredRecord, VectorIndex, VectorStore};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::chunk::{DocumentChunk, chunk_id, content_hash, keys};
use super::{RagSettings, Splitter};
use crate::provider::Embedder;
use crate::{Error, Result, TRACING_TARGET};

/// File extensions read from the knowledge corpus.
const CORPUS_EXTENSIONS: &[&str] = &["txt", "md"];

/// Outcome of a population run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulateReport {
    /// Corpus files visited.
    pub documents_seen: usize,
    /// Documents split, embedded and written.
    pub documents_indexed: usize,
    /// Documents already indexed with the same content, or empty.
    pub documents_skipped: usize,
    /// Chunks upserted.
    pub chunks_written: usize,
}

/// A retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Zero-based position, most relevant first.
    pub rank: usize,
    /// Chunk id.
    pub id: String,
    /// Chunk text.
    pub text: String,
    /// Title of the source document.
    pub title: String,
    /// Source path.
    pub source: String,
    /// Similarity score.
    pub score: f32,
}

impl RetrievedDocument {
    fn from_scored(rank: usize, record: ScoredRecord) -> Self {
        let field = |key| record.field_str(key).unwrap_or_default().to_owned();
        Self {
            rank,
            text: field(keys::TEXT),
            title: field(keys::TITLE),
            source: field(keys::SOURCE),
            score: record.score,
            id: record.id,
        }
    }
}

/// Documents retrieved for one query, most relevant first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The query text.
    pub query: String,
    /// Ranked documents.
    pub documents: Vec<RetrievedDocument>,
}

impl RetrievalResult {
    /// Returns the number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if nothing was retrieved.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterates over document texts in rank order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|d| d.text.as_str())
    }
}

/// Owns the embedding handles and the vector index of the knowledge corpus.
pub struct VectorDbManager {
    settings: RagSettings,
    embedder: Arc<dyn Embedder>,
    splitter: Splitter,
    index: VectorIndex,
}

impl VectorDbManager {
    /// Creates the manager and opens (or creates) the configured index.
    ///
    /// `embedder` produces the stored and query vectors. `splitter_embedder`
    /// is only used to find semantic split points.
    pub async fn new(
        settings: RagSettings,
        embedder: Arc<dyn Embedder>,
        splitter_embedder: Arc<dyn Embedder>,
        store: &VectorStore,
    ) -> Result<Self> {
        settings.validate()?;

        if embedder.ndims() != settings.embedding_dimension {
            return Err(Error::config(format!(
                "encoder {} produces {} dimensions, rag.embedding_dimension is {}",
                embedder.model_name(),
                embedder.ndims(),
                settings.embedding_dimension
            )));
        }

        let index = store
            .open_index(&settings.index_name, settings.embedding_dimension)
            .await?;
        let splitter = Splitter::new(&settings, splitter_embedder);

        tracing::info!(
            target: TRACING_TARGET,
            index = %settings.index_name,
            backend = store.backend_name(),
            encoder = %embedder.model_name(),
            strategy = %splitter.strategy(),
            "Vector DB manager ready"
        );

        Ok(Self {
            settings,
            embedder,
            splitter,
            index,
        })
    }

    /// Returns the settings.
    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    /// Returns the underlying index.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Embeds every `.txt` and `.md` file under `corpus` into the index.
    ///
    /// Documents whose content is already indexed are skipped, so reruns on an
    /// unchanged corpus write nothing. A changed document replaces all chunks
    /// of its previous version. A missing directory is a no-op.
    pub async fn populate(&self, corpus: &Path) -> Result<PopulateReport> {
        let mut report = PopulateReport::default();

        if !corpus.is_dir() {
            tracing::warn!(
                target: TRACING_TARGET,
                path = %corpus.display(),
                "Knowledge directory does not exist, nothing to populate"
            );
            return Ok(report);
        }

        for path in corpus_files(corpus)? {
            report.documents_seen += 1;

            let written = self.populate_document(corpus, &path).await?;
            if written == 0 {
                report.documents_skipped += 1;
            } else {
                report.documents_indexed += 1;
                report.chunks_written += written;
            }
        }

        tracing::info!(
            target: TRACING_TARGET,
            index = %self.settings.index_name,
            seen = report.documents_seen,
            indexed = report.documents_indexed,
            skipped = report.documents_skipped,
            chunks = report.chunks_written,
            "Population finished"
        );

        Ok(report)
    }

    /// Indexes one document and returns the number of chunks written.
    async fn populate_document(&self, corpus: &Path, path: &Path) -> Result<usize> {
        let text = tokio::fs::read_to_string(path).await?;
        if text.trim().is_empty() {
            return Ok(0);
        }

        let document_id = document_id(corpus, path);
        let hash = content_hash(&text);

        // Chunk 0 marks a fully written document.
        if self.index.contains(&chunk_id(&document_id, &hash, 0)).await? {
            tracing::debug!(
                target: TRACING_TARGET,
                document = %document_id,
                "Document unchanged, skipping"
            );
            return Ok(0);
        }

        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| document_id.clone());
        let source = path.display().to_string();

        let chunks: Vec<DocumentChunk> = self
            .splitter
            .split(&text)
            .await?
            .into_iter()
            .enumerate()
            .map(|(chunk_index, chunk_text)| DocumentChunk {
                id: chunk_id(&document_id, &hash, chunk_index),
                document_id: document_id.clone(),
                title: title.clone(),
                source: source.clone(),
                chunk_index,
                content_hash: hash.clone(),
                text: chunk_text,
            })
            .collect();

        if chunks.is_empty() {
            return Ok(0);
        }

        let mut records = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.settings.batch_size) {
            let texts = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_texts(texts).await?;
            if vectors.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "{} returned {} embeddings for {} chunks",
                    self.embedder.model_name(),
                    vectors.len(),
                    batch.len()
                )));
            }

            records.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(vectors)
                    .map(|(chunk, vector)| chunk.into_record(vector)),
            );
        }

        // The previous version of the document, if any, is replaced as a whole.
        self.index
            .delete_by_field(keys::DOCUMENT_ID, &document_id)
            .await?;

        let written = records.len();
        self.index.upsert(records).await?;

        tracing::debug!(
            target: TRACING_TARGET,
            document = %document_id,
            chunks = written,
            "Document indexed"
        );

        Ok(written)
    }

    /// Returns the `n_results` chunks most similar to `query`.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        let vector = self.embedder.embed_text(query).await?;
        let records = self.index.query(vector, self.settings.n_results).await?;

        let documents: Vec<_> = records
            .into_iter()
            .enumerate()
            .map(|(rank, record)| RetrievedDocument::from_scored(rank, record))
            .collect();

        tracing::debug!(
            target: TRACING_TARGET,
            results = documents.len(),
            top_score = documents.first().map(|d| d.score),
            "Retrieved documents"
        );

        Ok(RetrievalResult {
            query: query.to_owned(),
            documents,
        })
    }
}

impl std::fmt::Debug for VectorDbManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorDbManager")
            .field("settings", &self.settings)
            .field("embedder", &self.embedder.model_name())
            .field("splitter", &self.splitter)
            .field("index", &self.index)
            .finish()
    }
}

/// Lists corpus documents in sorted path order.
fn corpus_files(corpus: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(corpus).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let is_document = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| CORPUS_EXTENSIONS.contains(&ext));

        if is_document {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Corpus-relative path, `/`-separated.
fn document_id(corpus: &Path, path: &Path) -> String {
    path.strip_prefix(corpus)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use mediqa_vector::LocalBackend;

    use super::*;
    use crate::mock::HashEmbedder;
    use crate::rag::SplittingStrategy;

    fn settings(n_results: usize) -> RagSettings {
        RagSettings {
            embedding_dimension: 64,
            index_name: "medical_kb".into(),
            encoder_name: "hash".into(),
            splitter_encoder_name: None,
            chunk_size: 200,
            batch_size: 2,
            encoding_strategy: SplittingStrategy::Sentence,
            semantic_threshold: 0.75,
            db_location: "db".into(),
            n_results,
            knowledge_path: "knowledge".into(),
        }
    }

    async fn manager(n_results: usize) -> VectorDbManager {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
        let store = VectorStore::from_backend(LocalBackend::in_memory());
        VectorDbManager::new(settings(n_results), embedder.clone(), embedder, &store)
            .await
            .unwrap()
    }

    fn corpus(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, text) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, text).unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn ranks_relevant_chunk_first() {
        let manager = manager(3).await;
        let dir = corpus(&[
            ("Aspirin.txt", "Aspirin reduces fever."),
            ("Calcium.txt", "Calcium keeps bones strong."),
            ("Insulin.md", "Insulin regulates blood sugar."),
        ]);
        manager.populate(dir.path()).await.unwrap();

        let result = manager.retrieve("What reduces fever?").await.unwrap();
        assert_eq!(result.documents[0].text, "Aspirin reduces fever.");
        assert_eq!(result.documents[0].title, "Aspirin");
        assert_eq!(result.documents[0].rank, 0);
    }

    #[tokio::test]
    async fn retrieval_is_bounded_and_sorted() {
        let manager = manager(2).await;
        let dir = corpus(&[
            ("a.txt", "Fever and chills."),
            ("b.txt", "Fever medicine."),
            ("c.txt", "Headache and fever."),
            ("d.txt", "Broken arm."),
        ]);
        manager.populate(dir.path()).await.unwrap();

        let result = manager.retrieve("fever").await.unwrap();
        assert_eq!(result.len(), 2);
        assert!(
            result
                .documents
                .windows(2)
                .all(|w| w[0].score >= w[1].score)
        );
    }

    #[tokio::test]
    async fn empty_index_returns_empty_result() {
        let manager = manager(3).await;
        let result = manager.retrieve("anything").await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.query, "anything");
    }

    #[tokio::test]
    async fn repopulating_unchanged_corpus_writes_nothing() {
        let manager = manager(3).await;
        let dir = corpus(&[
            ("Aspirin.txt", "Aspirin reduces fever."),
            ("nested/Ibuprofen.md", "Ibuprofen reduces inflammation."),
            ("notes.csv", "ignored"),
        ]);

        let first = manager.populate(dir.path()).await.unwrap();
        assert_eq!(first.documents_seen, 2);
        assert_eq!(first.documents_indexed, 2);
        assert_eq!(first.chunks_written, 2);
        let count = manager.index().len().await.unwrap();

        let second = manager.populate(dir.path()).await.unwrap();
        assert_eq!(second.documents_skipped, 2);
        assert_eq!(second.chunks_written, 0);
        assert_eq!(manager.index().len().await.unwrap(), count);
    }

    #[tokio::test]
    async fn changed_document_is_reindexed() {
        let manager = manager(3).await;
        let dir = corpus(&[("Aspirin.txt", "Aspirin reduces fever.")]);
        manager.populate(dir.path()).await.unwrap();

        std::fs::write(dir.path().join("Aspirin.txt"), "Aspirin thins blood.").unwrap();
        let report = manager.populate(dir.path()).await.unwrap();
        assert_eq!(report.documents_indexed, 1);
        assert_eq!(manager.index().len().await.unwrap(), 1);

        let result = manager.retrieve("Aspirin").await.unwrap();
        assert_eq!(result.texts().collect::<Vec<_>>(), ["Aspirin thins blood."]);
    }

    #[tokio::test]
    async fn same_stem_with_different_extensions_are_distinct_documents() {
        let manager = manager(3).await;
        let dir = corpus(&[
            ("Aspirin.md", "Aspirin reduces fever."),
            ("Aspirin.txt", "Aspirin thins blood."),
        ]);

        manager.populate(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("Aspirin.txt"), "Aspirin relieves pain.").unwrap();
        manager.populate(dir.path()).await.unwrap();

        let result = manager.retrieve("Aspirin").await.unwrap();
        let mut texts: Vec<_> = result.texts().collect();
        texts.sort();
        assert_eq!(texts, ["Aspirin reduces fever.", "Aspirin relieves pain."]);
    }

    #[tokio::test]
    async fn missing_corpus_is_a_no_op() {
        let manager = manager(3).await;
        let dir = tempfile::tempdir().unwrap();

        let report = manager.populate(&dir.path().join("absent")).await.unwrap();
        assert_eq!(report, PopulateReport::default());
    }

    #[tokio::test]
    async fn dimension_mismatch_is_a_config_error() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(32));
        let store = VectorStore::from_backend(LocalBackend::in_memory());

        let err = VectorDbManager::new(settings(3), embedder.clone(), embedder, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }

        fn ndims(&self) -> usize {
            64
        }

        async fn embed_texts(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            Err(Error::embedding("model offline"))
        }
    }

    #[tokio::test]
    async fn embedding_failure_surfaces() {
        let embedder: Arc<dyn Embedder> = Arc::new(FailingEmbedder);
        let store = VectorStore::from_backend(LocalBackend::in_memory());
        let manager = VectorDbManager::new(settings(3), embedder.clone(), embedder, &store)
            .await
            .unwrap();

        let err = manager.retrieve("fever").await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[test]
    fn document_ids_are_relative_paths() {
        let corpus = Path::new("/data/knowledge");
        assert_eq!(
            document_id(corpus, &corpus.join("nested/Flu - Cold-.txt")),
            "nested/Flu - Cold-.txt"
        );
    }
}
