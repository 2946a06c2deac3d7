#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod command;
mod config;
mod server;

use std::process;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "mediqa_cli::server::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "mediqa_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "mediqa_cli::config";
pub const TRACING_TARGET_CLIENT: &str = "mediqa_cli::client";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    Cli::log_build_info();

    command::run(cli).await
}
