//! Paper Triage CLI — the main entry point.
//!
//! Commands:
//! - `run`      — Triage the input folders once
//! - `schedule` — Run triage on the configured cron schedule
//! - `init`     — Write a default config file
//! - `doctor`   — Diagnose configuration and connectivity
//! - `log`      — Show recent audit log rows

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use papertriage_config::TriageConfig;

mod commands;

use commands::run::RunArgs;

#[derive(Parser)]
#[command(
    name = "papertriage",
    about = "Paper Triage — summarize, decide on, and archive research papers",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.papertriage/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Triage every paper in the input folders once
    Run(RunArgs),

    /// Triage on the configured schedule until Ctrl-C
    Schedule(RunArgs),

    /// Write a default configuration file
    Init,

    /// Check configuration, folders, log file and LLM connectivity
    Doctor,

    /// Show the most recent audit log rows
    Log {
        /// Number of rows to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(TriageConfig::default_path);

    match cli.command {
        Commands::Run(args) => commands::run::run(&config_path, &args).await?,
        Commands::Schedule(args) => commands::schedule::run(&config_path, &args).await?,
        Commands::Init => commands::init::run(&config_path)?,
        Commands::Doctor => commands::doctor::run(&config_path).await?,
        Commands::Log { limit } => commands::log::run(&config_path, limit)?,
    }

    Ok(())
}
