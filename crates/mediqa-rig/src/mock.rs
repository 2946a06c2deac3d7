//! Deterministic in-process providers.
//!
//! Neither type touches the network, which makes them suitable for tests and
//! offline demos.

use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::Result;
use crate::provider::{Embedder, GenerationParams, TextGenerator};
use crate::rag::Prompt;

/// Hashed bag-of-words embedder.
///
/// Each lowercase alphanumeric token increments one bucket chosen by its
/// SHA-256; the vector is then L2-normalized. Texts sharing words score high.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    ndims: usize,
}

impl HashEmbedder {
    /// Creates an embedder producing `ndims`-dimensional vectors.
    pub fn new(ndims: usize) -> Self {
        Self {
            ndims: ndims.max(1),
        }
    }

    /// Embeds one text synchronously.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.ndims];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let slot = (u64::from_be_bytes(bucket) % self.ndims as u64) as usize;
            vector[slot] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-bow"
    }

    fn ndims(&self) -> usize {
        self.ndims
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

/// Answer returned when the prompt holds no documents.
pub const NO_CONTEXT_ANSWER: &str = "The provided context does not answer this question.";

/// Generator that answers with the top-ranked document of each prompt.
#[derive(Debug, Clone, Default)]
pub struct ContextEchoGenerator {
    delay: Duration,
}

impl ContextEchoGenerator {
    /// Creates a generator that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits `delay` before answering each batch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn answer(prompt: &Prompt) -> String {
        prompt
            .user
            .lines()
            .find_map(|line| line.strip_prefix("Document 0:::"))
            .map(|text| format!("According to Document 0: {}", text.trim()))
            .unwrap_or_else(|| NO_CONTEXT_ANSWER.to_owned())
    }
}

#[async_trait]
impl TextGenerator for ContextEchoGenerator {
    fn model_name(&self) -> &str {
        "context-echo"
    }

    async fn generate(
        &self,
        prompts: Vec<Prompt>,
        _params: &GenerationParams,
    ) -> Result<Vec<String>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(prompts.iter().map(Self::answer).collect())
    }
}
