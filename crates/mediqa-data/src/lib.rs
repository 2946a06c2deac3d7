#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
pub mod extract;
pub mod preprocess;
mod settings;

pub use error::{DataError, DataResult};
pub use extract::{ExtractReport, KnowledgeRecord, extract, sanitize_title};
pub use preprocess::{PreprocessReport, QaPair, cleanup, preprocess, split};
pub use settings::DataSettings;

/// Tracing target for data preparation.
pub const TRACING_TARGET: &str = "mediqa_data";
