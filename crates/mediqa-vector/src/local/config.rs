//! Local backend configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the embedded store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory holding one `<index>.json` file per index.
    pub path: PathBuf,
}

impl LocalConfig {
    /// Creates a new local configuration.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}
