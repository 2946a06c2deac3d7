//! Embedded vector store backend.

mod backend;
mod config;

pub use backend::LocalBackend;
pub use config::LocalConfig;
