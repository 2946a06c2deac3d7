//! Model providers for embedding and text generation.

mod completion;
mod embedding;
mod settings;

pub use completion::{CompletionProvider, GenerationParams, TextGenerator};
pub use embedding::{Embedder, EmbeddingProvider};
pub use settings::{ProviderBackend, ProviderSettings};
