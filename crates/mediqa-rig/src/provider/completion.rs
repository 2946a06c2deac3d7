//! Completion provider abstraction.

use async_trait::async_trait;
use futures::future::try_join_all;
#[cfg(feature = "ollama")]
use rig::client::Nothing;
use rig::completion::{AssistantContent, CompletionModel as RigCompletionModel};
use rig::one_or_many::OneOrMany;
use rig::prelude::CompletionClient;
#[cfg(feature = "ollama")]
use rig::providers::ollama;
use rig::providers::openai;
#[cfg(feature = "ollama")]
use serde_json::json;

use super::{ProviderBackend, ProviderSettings};
use crate::rag::{Prompt, ReaderSettings};
use crate::{Error, Result, TRACING_TARGET};

/// Decoding parameters for one generation batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature; `0.0` means greedy decoding.
    pub temperature: f64,
    /// Penalty applied to repeated tokens.
    pub repetition_penalty: f64,
    /// Upper bound on generated tokens.
    pub max_new_tokens: u64,
}

impl From<&ReaderSettings> for GenerationParams {
    fn from(settings: &ReaderSettings) -> Self {
        Self {
            temperature: if settings.do_sample {
                settings.temperature
            } else {
                0.0
            },
            repetition_penalty: settings.repetition_penalty,
            max_new_tokens: settings.max_new_tokens,
        }
    }
}

/// Generates one completion per prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the model name.
    fn model_name(&self) -> &str;

    /// Generates answers for a batch of prompts.
    ///
    /// Implementations return exactly one text per prompt, in input order.
    async fn generate(&self, prompts: Vec<Prompt>, params: &GenerationParams)
    -> Result<Vec<String>>;
}

/// Completion provider that wraps different rig completion models.
#[derive(Clone)]
pub enum CompletionProvider {
    /// Ollama completion model.
    #[cfg(feature = "ollama")]
    Ollama {
        client: ollama::Client,
        model_name: String,
    },
    /// OpenAI completion model.
    OpenAi {
        model: openai::CompletionModel,
        model_name: String,
    },
}

impl CompletionProvider {
    /// Connects to the configured backend.
    pub fn connect(settings: &ProviderSettings, model: &str) -> Result<Self> {
        let provider = match settings.backend {
            #[cfg(feature = "ollama")]
            ProviderBackend::Ollama => Self::ollama(&settings.base_url, model)?,
            #[cfg(not(feature = "ollama"))]
            ProviderBackend::Ollama => {
                return Err(Error::config("built without the `ollama` feature"));
            }
            ProviderBackend::OpenAi => Self::openai(settings.require_api_key()?, model)?,
        };

        tracing::debug!(
            target: TRACING_TARGET,
            backend = %settings.backend,
            model = %model,
            "Connected completion provider"
        );

        Ok(provider)
    }

    /// Creates a new Ollama completion provider.
    #[cfg(feature = "ollama")]
    pub fn ollama(base_url: &str, model: &str) -> Result<Self> {
        let client = ollama::Client::builder()
            .api_key(Nothing)
            .base_url(base_url)
            .build()
            .map_err(|e| Error::config(format!("invalid ollama client: {e}")))?;

        Ok(Self::Ollama {
            client,
            model_name: model.to_owned(),
        })
    }

    /// Creates a new OpenAI completion provider.
    pub fn openai(api_key: &str, model: &str) -> Result<Self> {
        let client = openai::Client::new(api_key)
            .map_err(|e| Error::config(format!("invalid openai client: {e}")))?
            .completions_api();

        Ok(Self::OpenAi {
            model: client.completion_model(model),
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

    /// Sends a single completion request.
    pub async fn complete(&self, prompt: &Prompt, params: &GenerationParams) -> Result<String> {
        let map_err = |e| Error::generation(self.provider_name(), e);

        match self {
            #[cfg(feature = "ollama")]
            Self::Ollama { client, model_name } => {
                let model = client.completion_model(model_name);
                // Ollama reads decoding knobs from `options`.
                let options = json!({
                    "options": {
                        "temperature": params.temperature,
                        "repeat_penalty": params.repetition_penalty,
                        "num_predict": params.max_new_tokens,
                    }
                });

                model
                    .completion_request(prompt.user.as_str())
                    .preamble(prompt.system.clone())
                    .temperature(params.temperature)
                    .max_tokens(params.max_new_tokens)
                    .additional_params(options)
                    .send()
                    .await
                    .map(|r| extract_text_content(&r.choice))
                    .map_err(map_err)
            }
            Self::OpenAi { model, .. } => model
                .completion_request(prompt.user.as_str())
                .preamble(prompt.system.clone())
                .temperature(params.temperature)
                .max_tokens(params.max_new_tokens)
                .send()
                .await
                .map(|r| extract_text_content(&r.choice))
                .map_err(map_err),
        }
    }
}

#[async_trait]
impl TextGenerator for CompletionProvider {
    fn model_name(&self) -> &str {
        match self {
            #[cfg(feature = "ollama")]
            Self::Ollama { model_name, .. } => model_name,
            Self::OpenAi { model_name, .. } => model_name,
        }
    }

    async fn generate(
        &self,
        prompts: Vec<Prompt>,
        params: &GenerationParams,
    ) -> Result<Vec<String>> {
        tracing::debug!(
            target: TRACING_TARGET,
            provider = self.provider_name(),
            model = %TextGenerator::model_name(self),
            batch = prompts.len(),
            "Generating completions"
        );

        try_join_all(prompts.iter().map(|prompt| self.complete(prompt, params))).await
    }
}

impl std::fmt::Debug for CompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionProvider")
            .field("provider", &self.provider_name())
            .field("model", &TextGenerator::model_name(self))
            .finish()
    }
}

/// Extracts text content from assistant content choices.
fn extract_text_content(choice: &OneOrMany<AssistantContent>) -> String {
    choice
        .iter()
        .filter_map(|content| match content {
            AssistantContent::Text(text) => Some(text.text()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}
