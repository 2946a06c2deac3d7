//! Grounded answer generation.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{PromptTemplate, ReaderSettings, RetrievalResult};
use crate::provider::{GenerationParams, TextGenerator};
use crate::{Error, Result, TRACING_TARGET};

/// One generated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    /// Model output, without the prompt.
    pub generated_text: String,
}

/// Turns questions and their retrieved documents into answers.
#[derive(Clone)]
pub struct Reader {
    settings: ReaderSettings,
    template: PromptTemplate,
    generator: Arc<dyn TextGenerator>,
}

impl Reader {
    /// Creates a reader with the default prompt template.
    pub fn new(settings: ReaderSettings, generator: Arc<dyn TextGenerator>) -> Result<Self> {
        settings.validate()?;

        tracing::info!(
            target: TRACING_TARGET,
            model = %settings.model_name,
            generator = %generator.model_name(),
            quantize = settings.quantize,
            do_sample = settings.do_sample,
            "Reader initialized"
        );

        Ok(Self {
            settings,
            template: PromptTemplate::default(),
            generator,
        })
    }

    /// Replaces the prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Returns the reader settings.
    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    /// Generates one answer per question, in order.
    ///
    /// `retrievals[i]` is the context for `questions[i]`.
    pub async fn generate(
        &self,
        questions: &[String],
        retrievals: &[RetrievalResult],
    ) -> Result<Vec<GeneratedAnswer>> {
        if questions.len() != retrievals.len() {
            return Err(Error::BatchSizeMismatch {
                questions: questions.len(),
                retrievals: retrievals.len(),
            });
        }

        if questions.is_empty() {
            return Ok(Vec::new());
        }

        let prompts: Vec<_> = questions
            .iter()
            .zip(retrievals)
            .map(|(question, retrieval)| self.template.render(question, retrieval))
            .collect();

        let params = GenerationParams::from(&self.settings);
        let batch = prompts.len();

        tracing::debug!(
            target: TRACING_TARGET,
            batch = batch,
            temperature = params.temperature,
            max_new_tokens = params.max_new_tokens,
            "Running generation"
        );

        let texts = self.generator.generate(prompts, &params).await?;
        if texts.len() != batch {
            return Err(Error::generation(
                self.generator.model_name(),
                format!("expected {batch} outputs, got {}", texts.len()),
            ));
        }

        Ok(texts
            .into_iter()
            .map(|generated_text| GeneratedAnswer { generated_text })
            .collect())
    }

    /// Same as [`generate`](Self::generate), bounded by `timeout`.
    pub async fn generate_with_timeout(
        &self,
        questions: &[String],
        retrievals: &[RetrievalResult],
        timeout: Duration,
    ) -> Result<Vec<GeneratedAnswer>> {
        tokio::time::timeout(timeout, self.generate(questions, retrievals))
            .await
            .map_err(|_| {
                tracing::warn!(
                    target: TRACING_TARGET,
                    timeout_ms = timeout.as_millis() as u64,
                    "Generation timed out"
                );
                Error::GenerationTimeout(timeout)
            })?
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("settings", &self.settings)
            .field("generator", &self.generator.model_name())
            .finish()
    }
}
