//! Data preparation settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{DataError, DataResult};

/// Paths and parameters for corpus extraction and dataset preprocessing.
///
/// Relative paths resolve against the data directory passed to each
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSettings {
    /// Source CSV with `question` and `answer` columns.
    pub eval_src_file: PathBuf,
    /// Fraction of cleaned rows that go to the validation set.
    pub split_frac: f64,
    /// Seed of the validation sample.
    #[serde(default)]
    pub split_seed: u64,
    /// Validation CSV output.
    pub val_file: PathBuf,
    /// Test CSV output.
    pub test_file: PathBuf,
    /// JSON-lines knowledge export.
    pub knowledge_dset: PathBuf,
    /// Directory receiving one text file per knowledge record.
    pub knowledge_path: PathBuf,
}

impl DataSettings {
    /// Checks value ranges.
    pub fn validate(&self) -> DataResult<()> {
        if !(0.0..=1.0).contains(&self.split_frac) {
            return Err(DataError::invalid_config(
                "data.split_frac must be within 0..=1",
            ));
        }
        Ok(())
    }
}
