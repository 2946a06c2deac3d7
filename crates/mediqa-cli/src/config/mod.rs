//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── config: PathBuf            # TOML settings document (MEDIQA_CONFIG)
//! └── command: Command
//!     ├── serve                  # ServerConfig + RecoveryConfig
//!     ├── populate
//!     ├── extract / preprocess   # --data-dir
//!     └── ask                    # MEDIQA_API_URL
//! ```
//!
//! Model, index and data settings live in the settings document; networking
//! comes from flags or environment variables.

mod provider;
mod server;
mod settings;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use mediqa_server::middleware::RecoveryConfig;
pub use provider::{Providers, create_qa_service, create_vector_db_manager};
pub use server::ServerConfig;
pub use settings::{ConfigError, Settings};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::TRACING_TARGET_STARTUP;

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "mediqa")]
#[command(about = "Medical question answering over a knowledge corpus")]
#[command(version)]
pub struct Cli {
    /// Path to the TOML settings document.
    #[arg(
        short,
        long,
        global = true,
        env = "MEDIQA_CONFIG",
        default_value = "config.toml"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve the question answering API.
    Serve(ServeArgs),
    /// Split, embed and index the knowledge corpus.
    Populate,
    /// Write one text file per record of the knowledge export.
    Extract(DataArgs),
    /// Clean the evaluation dataset and split it into validation and test sets.
    Preprocess(DataArgs),
    /// Ask a running server a question.
    Ask(AskArgs),
}

/// Arguments of `serve`.
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Network binding and shutdown.
    #[command(flatten)]
    pub server: ServerConfig,

    /// Request timeout.
    #[command(flatten)]
    pub recovery: RecoveryConfig,

    /// Populate the index from `rag.knowledge_path` before serving.
    #[arg(long)]
    pub populate: bool,
}

/// Arguments of the data preparation commands.
#[derive(Debug, Clone, Args)]
pub struct DataArgs {
    /// Directory the `[data]` paths are relative to.
    #[arg(long, env = "MEDIQA_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,
}

/// Arguments of `ask`.
#[derive(Debug, Clone, Args)]
pub struct AskArgs {
    /// The question.
    pub question: String,

    /// Base URL of the API.
    #[arg(long, env = "MEDIQA_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Loads the settings document.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        Settings::load(&self.config)
    }

    /// Logs build information at debug level.
    pub fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [
            cfg!(feature = "dotenv").then_some("dotenv"),
            cfg!(feature = "ollama").then_some("ollama"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ask_with_defaults() {
        let cli = Cli::try_parse_from(["mediqa", "ask", "What reduces fever?"]).unwrap();
        let Command::Ask(args) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(args.question, "What reduces fever?");
        assert!(args.api_url.starts_with("http"));
    }

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::try_parse_from([
            "mediqa",
            "--config",
            "prod.toml",
            "serve",
            "--port",
            "9090",
            "--populate",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("prod.toml"));
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.server.port, 9090);
        assert!(args.populate);
    }
}
