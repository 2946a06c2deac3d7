use anyhow::Context;

use crate::config::{Cli, DataArgs};

/// Extracts the knowledge export into one text file per record.
pub fn extract(cli: &Cli, args: &DataArgs) -> anyhow::Result<()> {
    let settings = cli.settings()?;
    mediqa_data::extract(&settings.data, &args.data_dir)
        .context("failed to extract the knowledge corpus")?;
    Ok(())
}

/// Cleans the evaluation dataset and writes the validation and test sets.
pub fn preprocess(cli: &Cli, args: &DataArgs) -> anyhow::Result<()> {
    let settings = cli.settings()?;
    mediqa_data::preprocess(&settings.data, &args.data_dir)
        .context("failed to preprocess the evaluation dataset")?;
    Ok(())
}
