//! formflow CLI - check and inspect form step documents
//!
//! Operators use it to validate step documents before wiring them into a
//! workflow service:
//! - `check` compiles every document and lists all diagnostics
//! - `inspect` prints the compiled form as JSON

use clap::{Parser, Subcommand};
use formflow_engine::EngineConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;

use error::{CliError, CliResult};

/// formflow CLI application
#[derive(Parser)]
#[command(name = "formflow")]
#[command(about = "formflow - form step document tooling", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FORMFLOW_CONFIG")]
    config: Option<String>,

    /// Log level (overrides the configuration file)
    #[arg(long, env = "FORMFLOW_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Compile documents and report every diagnostic
    Check {
        /// Step documents (YAML or JSON)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the compiled form of a document
    Inspect {
        /// Step document (YAML or JSON)
        file: PathBuf,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let config = EngineConfig::load(cli.config.as_deref())
        .map_err(|e| CliError::Config(e.to_string()))?;

    // Initialize tracing
    let level = cli.log_level.unwrap_or(config.logging.level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::Check { files } => commands::check(&files),
        Commands::Inspect { file } => commands::inspect(&file),
    }
}
