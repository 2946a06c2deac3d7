//! Settings document.

use std::path::{Path, PathBuf};

use mediqa_data::DataSettings;
use mediqa_rig::provider::ProviderSettings;
use mediqa_rig::rag::{RagSettings, ReaderSettings};
use mediqa_vector::{LocalConfig, VectorStoreConfig};
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Errors raised while loading settings. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML or misses a required key.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(error: impl std::fmt::Display) -> Self {
        Self::Invalid(error.to_string())
    }
}

/// The whole settings document.
///
/// Loaded once at startup; each component receives its own section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Corpus extraction and dataset preprocessing.
    pub data: DataSettings,
    /// Answer generation.
    pub reader: ReaderSettings,
    /// Chunking, embedding and retrieval.
    pub rag: RagSettings,
    /// Model backend; defaults to a local Ollama server.
    #[serde(default)]
    pub provider: ProviderSettings,
    /// Vector store backend; defaults to the local store at `rag.db_location`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_store: Option<VectorStoreConfig>,
}

impl Settings {
    /// Reads, parses and validates the settings document at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let settings: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            path = %path.display(),
            provider = %settings.provider.backend,
            vector_store = settings.vector_store().backend_name(),
            index = %settings.rag.index_name,
            reader_model = %settings.reader.model_name,
            "Settings loaded"
        );

        Ok(settings)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.data.validate().map_err(ConfigError::invalid)?;
        self.reader.validate().map_err(ConfigError::invalid)?;
        self.rag.validate().map_err(ConfigError::invalid)?;
        self.provider.validate().map_err(ConfigError::invalid)?;
        Ok(())
    }

    /// Returns the configured vector store, or the local one at `rag.db_location`.
    pub fn vector_store(&self) -> VectorStoreConfig {
        self.vector_store
            .clone()
            .unwrap_or_else(|| VectorStoreConfig::Local(LocalConfig::new(&self.rag.db_location)))
    }
}

#[cfg(test)]
mod tests {
    use mediqa_rig::provider::ProviderBackend;

    use super::*;

    const DOCUMENT: &str = r#"
[data]
eval_src_file = "raw/medical_qa.csv"
split_frac = 0.2
val_file = "val.csv"
test_file = "test.csv"
knowledge_dset = "raw/wiki_medical.jsonl"
knowledge_path = "knowledge"

[reader]
model_name = "llama3.2"
quantize = true
temperature = 0.1
do_sample = false
repetition_penalty = 1.1
max_new_tokens = 512

[rag]
embedding_dimension = 768
index_name = "medical_kb"
encoder_name = "nomic-embed-text"
chunk_size = 512
batch_size = 16
encoding_strategy = "sentence"
db_location = "db"
n_results = 5
knowledge_path = "data/knowledge"
"#;

    fn write(content: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), content).unwrap();
        file
    }

    #[test]
    fn loads_required_sections_with_defaults() {
        let file = write(DOCUMENT);
        let settings = Settings::load(file.path()).unwrap();

        assert_eq!(settings.rag.index_name, "medical_kb");
        assert_eq!(settings.reader.timeout_secs, 120);
        assert_eq!(settings.data.split_seed, 0);
        assert_eq!(settings.provider.backend, ProviderBackend::Ollama);
        assert_eq!(
            settings.vector_store(),
            VectorStoreConfig::Local(LocalConfig::new("db"))
        );
    }

    #[test]
    fn reads_optional_sections() {
        let document = format!(
            "{DOCUMENT}\n[provider]\nbackend = \"openai\"\napi_key = \"sk-test\"\n\n\
             [vector_store]\ntype = \"qdrant\"\nurl = \"http://localhost:6334\"\n"
        );
        let file = write(&document);
        let settings = Settings::load(file.path()).unwrap();

        assert_eq!(settings.provider.backend, ProviderBackend::OpenAi);
        assert_eq!(settings.vector_store().backend_name(), "qdrant");
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = Settings::load("/nonexistent/mediqa.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn missing_key_is_fatal() {
        let file = write(&DOCUMENT.replace("n_results = 5\n", ""));
        let err = Settings::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn invalid_value_is_fatal() {
        let file = write(&DOCUMENT.replace("split_frac = 0.2", "split_frac = 2.0"));
        let err = Settings::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
