use std::sync::Arc;
use std::time::Duration;

use mediqa_rig::rag::{GeneratedAnswer, Reader, VectorDbManager};
use mediqa_rig::{Error, Result};

use crate::TRACING_TARGET;

/// Retrieves context for a question and generates a grounded answer.
#[derive(Clone)]
pub struct QaService {
    manager: Arc<VectorDbManager>,
    reader: Arc<Reader>,
    timeout: Duration,
}

impl QaService {
    /// Creates the service; generation is bounded by the reader's timeout.
    pub fn new(manager: Arc<VectorDbManager>, reader: Arc<Reader>) -> Self {
        let timeout = reader.settings().timeout();
        Self {
            manager,
            reader,
            timeout,
        }
    }

    /// Overrides the generation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the generation timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Answers one question.
    pub async fn answer(&self, question: &str) -> Result<GeneratedAnswer> {
        let retrieval = self.manager.retrieve(question).await?;

        tracing::debug!(
            target: TRACING_TARGET,
            documents = retrieval.len(),
            "Context retrieved"
        );

        let answers = self
            .reader
            .generate_with_timeout(&[question.to_owned()], &[retrieval], self.timeout)
            .await?;

        answers.into_iter().next().ok_or_else(|| {
            Error::generation(&self.reader.settings().model_name, "generator returned no answer")
        })
    }
}

impl std::fmt::Debug for QaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaService")
            .field("manager", &self.manager)
            .field("reader", &self.reader)
            .field("timeout", &self.timeout)
            .finish()
    }
}
