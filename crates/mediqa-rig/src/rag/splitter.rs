//! Text splitting for chunk creation.

use std::sync::Arc;

use mediqa_vector::cosine_similarity;
use text_splitter::{ChunkConfig, TextSplitter};

use super::{RagSettings, SplittingStrategy};
use crate::provider::Embedder;
use crate::{Error, Result};

/// Splits documents into chunks according to the configured strategy.
#[derive(Clone)]
pub struct Splitter {
    strategy: SplittingStrategy,
    chunk_size: usize,
    batch_size: usize,
    threshold: f32,
    embedder: Arc<dyn Embedder>,
}

impl Splitter {
    /// Creates a splitter from RAG settings.
    ///
    /// The embedder is only consulted by the semantic strategy.
    pub fn new(settings: &RagSettings, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            strategy: settings.encoding_strategy,
            chunk_size: settings.chunk_size,
            batch_size: settings.batch_size,
            threshold: settings.semantic_threshold,
            embedder,
        }
    }

    /// Returns the active strategy.
    pub fn strategy(&self) -> SplittingStrategy {
        self.strategy
    }

    /// Splits text into non-empty chunks.
    pub async fn split(&self, text: &str) -> Result<Vec<String>> {
        match self.strategy {
            SplittingStrategy::Sentence => Ok(split_by_capacity(text, self.chunk_size)),
            SplittingStrategy::Semantic => self.split_semantic(text).await,
        }
    }

    async fn split_semantic(&self, text: &str) -> Result<Vec<String>> {
        let sentences: Vec<String> = sentences(text)
            .into_iter()
            .flat_map(|sentence| {
                if sentence.chars().count() > self.chunk_size {
                    split_by_capacity(sentence, self.chunk_size)
                } else {
                    vec![sentence.to_owned()]
                }
            })
            .collect();

        if sentences.len() <= 1 {
            return Ok(sentences);
        }

        let mut vectors = Vec::with_capacity(sentences.len());
        for batch in sentences.chunks(self.batch_size.max(1)) {
            let embedded = self.embedder.embed_texts(batch.to_vec()).await?;
            if embedded.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "splitter model returned {} embeddings for {} sentences",
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
        }

        Ok(merge_similar(
            sentences,
            &vectors,
            self.threshold,
            self.chunk_size,
        ))
    }
}

impl std::fmt::Debug for Splitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Splitter")
            .field("strategy", &self.strategy)
            .field("chunk_size", &self.chunk_size)
            .field("batch_size", &self.batch_size)
            .field("threshold", &self.threshold)
            .field("embedder", &self.embedder.model_name())
            .finish()
    }
}

fn split_by_capacity(text: &str, capacity: usize) -> Vec<String> {
    let splitter = TextSplitter::new(ChunkConfig::new(capacity).with_trim(true));
    splitter
        .chunks(text)
        .filter(|chunk| !chunk.trim().is_empty())
        .map(str::to_owned)
        .collect()
}

/// Cuts text after `.`, `!` or `?` runs followed by whitespace, and at blank lines.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        let boundary = match c {
            '.' | '!' | '?' => {
                while let Some(&(_, '.' | '!' | '?')) = chars.peek() {
                    chars.next();
                }
                matches!(chars.peek(), None | Some(&(_, ' ' | '\t' | '\n' | '\r')))
            }
            '\n' => matches!(chars.peek(), Some(&(_, '\n'))),
            _ => false,
        };

        if boundary {
            let end = chars.peek().map_or(text.len(), |&(j, _)| j);
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        } else if chars.peek().is_none() {
            let sentence = text[start..].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = text.len();
        }
    }

    out
}

fn merge_similar(
    sentences: Vec<String>,
    vectors: &[Vec<f32>],
    threshold: f32,
    capacity: usize,
) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    // Capacity is measured in characters, like the sentence splitter.
    let mut current_chars = 0;
    let mut previous: Option<&[f32]> = None;

    for (sentence, vector) in sentences.into_iter().zip(vectors) {
        let similar = previous.is_some_and(|prev| cosine_similarity(prev, vector) >= threshold);
        let sentence_chars = sentence.chars().count();
        let fits = current_chars + 1 + sentence_chars <= capacity;

        if current.is_empty() {
            current = sentence;
            current_chars = sentence_chars;
        } else if similar && fits {
            current.push(' ');
            current.push_str(&sentence);
            current_chars += 1 + sentence_chars;
        } else {
            chunks.push(std::mem::replace(&mut current, sentence));
            current_chars = sentence_chars;
        }

        previous = Some(vector.as_slice());
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::rag::RagSettings;

    /// Maps sentences mentioning "fever" and everything else to orthogonal axes.
    struct TopicEmbedder;

    #[async_trait]
    impl Embedder for TopicEmbedder {
        fn model_name(&self) -> &str {
            "topic"
        }

        fn ndims(&self) -> usize {
            2
        }

        async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.to_lowercase().contains("fever") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    fn settings(strategy: SplittingStrategy, chunk_size: usize) -> RagSettings {
        RagSettings {
            embedding_dimension: 2,
            index_name: "kb".into(),
            encoder_name: "topic".into(),
            splitter_encoder_name: None,
            chunk_size,
            batch_size: 2,
            encoding_strategy: strategy,
            semantic_threshold: 0.75,
            db_location: "db".into(),
            n_results: 3,
            knowledge_path: "knowledge".into(),
        }
    }

    #[test]
    fn segments_sentences() {
        let found = sentences("Fever is common. Is it bad?! Rest helps\n\nNew paragraph");
        assert_eq!(
            found,
            ["Fever is common.", "Is it bad?!", "Rest helps", "New paragraph"]
        );
        assert_eq!(sentences("v1.2 is out"), ["v1.2 is out"]);
        assert!(sentences("   ").is_empty());
    }

    #[tokio::test]
    async fn sentence_strategy_respects_capacity() {
        let splitter = Splitter::new(
            &settings(SplittingStrategy::Sentence, 40),
            Arc::new(TopicEmbedder),
        );
        let text = "Aspirin reduces fever. It also relieves pain. Take it with water.";

        let chunks = splitter.split(text).await.unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 40));
        assert_eq!(chunks[0], "Aspirin reduces fever.");
    }

    #[tokio::test]
    async fn semantic_strategy_merges_related_sentences() {
        let splitter = Splitter::new(
            &settings(SplittingStrategy::Semantic, 200),
            Arc::new(TopicEmbedder),
        );
        let text = "Fever is a high temperature. Aspirin lowers fever. \
                    Bones need calcium. Milk has calcium.";

        let chunks = splitter.split(text).await.unwrap();
        assert_eq!(
            chunks,
            [
                "Fever is a high temperature. Aspirin lowers fever.",
                "Bones need calcium. Milk has calcium.",
            ]
        );
    }

    #[tokio::test]
    async fn semantic_strategy_caps_merged_length() {
        let splitter = Splitter::new(
            &settings(SplittingStrategy::Semantic, 30),
            Arc::new(TopicEmbedder),
        );
        let text = "Fever is hot. Fever is bad. Fever ends.";

        let chunks = splitter.split(text).await.unwrap();
        assert_eq!(chunks, ["Fever is hot. Fever is bad.", "Fever ends."]);
    }

    #[tokio::test]
    async fn capacity_counts_characters_not_bytes() {
        let splitter = Splitter::new(
            &settings(SplittingStrategy::Semantic, 35),
            Arc::new(TopicEmbedder),
        );
        // 33 characters, 40 bytes.
        let text = "Fever à été élevée. Fever élevée.";

        let chunks = splitter.split(text).await.unwrap();
        assert_eq!(chunks, [text]);
    }
}
