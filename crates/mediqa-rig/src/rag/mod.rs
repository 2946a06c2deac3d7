//! Retrieval-augmented generation pipeline.
//!
//! [`VectorDbManager`] fills a vector index from the knowledge corpus and
//! answers top-k queries. [`Reader`] turns retrieved documents into prompts
//! and runs batched generation.

mod chunk;
mod manager;
mod prompt;
mod reader;
mod settings;
mod splitter;

pub use chunk::{DocumentChunk, chunk_id, content_hash};
pub use manager::{PopulateReport, RetrievalResult, RetrievedDocument, VectorDbManager};
pub use prompt::{Prompt, PromptTemplate, SYSTEM_PROMPT, USER_PROMPT};
pub use reader::{GeneratedAnswer, Reader};
pub use settings::{RagSettings, ReaderSettings, SplittingStrategy};
pub use splitter::Splitter;
