//! Provider connection settings.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Model backend serving embeddings and completions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderBackend {
    /// Local Ollama server.
    #[default]
    Ollama,
    /// OpenAI API.
    OpenAi,
}

/// Connection settings shared by the embedding and completion providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Which backend to talk to.
    #[serde(default)]
    pub backend: ProviderBackend,

    /// Base URL of the Ollama server. Ignored by OpenAI.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key, required by OpenAI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_OLLAMA_URL.to_owned()
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            backend: ProviderBackend::default(),
            base_url: default_base_url(),
            api_key: None,
        }
    }
}

impl ProviderSettings {
    /// Validates the settings for the selected backend.
    pub fn validate(&self) -> Result<()> {
        match self.backend {
            ProviderBackend::Ollama if self.base_url.trim().is_empty() => {
                Err(Error::config("provider.base_url must not be empty"))
            }
            ProviderBackend::OpenAi if self.api_key.as_deref().is_none_or(str::is_empty) => {
                Err(Error::config("provider.api_key is required for openai"))
            }
            _ => Ok(()),
        }
    }

    /// Returns the API key or a configuration error.
    pub(crate) fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::config(format!("{} requires an api_key", self.backend)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_local_ollama() {
        let settings: ProviderSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.backend, ProviderBackend::Ollama);
        assert_eq!(settings.base_url, DEFAULT_OLLAMA_URL);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn openai_requires_api_key() {
        let settings: ProviderSettings =
            serde_json::from_str(r#"{"backend": "openai"}"#).unwrap();
        assert!(settings.validate().is_err());

        let settings = ProviderSettings {
            api_key: Some("sk-test".into()),
            ..settings
        };
        assert!(settings.validate().is_ok());
        assert_eq!(settings.backend.as_ref(), "openai");
    }
}
