//! Subcommand implementations.

mod ask;
mod data;
mod populate;
mod serve;

use crate::config::{Cli, Command};

/// Runs the selected subcommand.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.clone() {
        Command::Serve(args) => serve::serve(&cli, args).await,
        Command::Populate => populate::populate(&cli).await,
        Command::Extract(args) => data::extract(&cli, &args),
        Command::Preprocess(args) => data::preprocess(&cli, &args),
        Command::Ask(args) => ask::ask(&args).await,
    }
}
