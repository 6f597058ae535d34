//! LLM metadata catalog ingestion.
//!
//! Publishes LLM models, aggregated pipelines and their lineage from
//! `LangSmith` to a metadata catalog.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::CONFIG;
use llm_catalog::commands::{ingest, show};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, fmt};

/// LLM metadata catalog ingestion
#[derive(Parser)]
#[command(name = "llm-catalog")]
#[command(about = "Publishes LLM models, pipelines and lineage to a metadata catalog")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect runs and publish models, pipelines and lineage
    Ingest {
        /// Days of history to collect
        #[arg(short, long)]
        days: Option<u32>,

        /// Maximum number of runs to collect
        #[arg(short, long)]
        limit: Option<usize>,

        /// Pipelines per emission batch
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Project to collect runs from
        #[arg(short, long)]
        project: Option<String>,

        /// Build payloads without sending them
        #[arg(long)]
        dry_run: bool,

        /// Log failed emissions and continue instead of aborting
        #[arg(long)]
        no_hard_fail: bool,

        /// Also emit every run as its own entity
        #[arg(long)]
        raw_runs: bool,

        /// Directory for debug artifact dumps
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },

    /// Print a catalog entity
    Show {
        /// URN of the entity
        #[arg(short, long)]
        urn: String,
    },
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stdout);

    // File layer
    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            }
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(file),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let mut config = CONFIG.clone();

    match cli.command {
        Commands::Ingest {
            days,
            limit,
            batch_size,
            project,
            dry_run,
            no_hard_fail,
            raw_runs,
            debug_dir,
        } => {
            if let Some(days) = days {
                config.window_days = days;
            }
            if let Some(limit) = limit {
                config.limit = limit;
            }
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            if let Some(project) = project {
                config.langchain_project = project;
            }
            if debug_dir.is_some() {
                config.debug_dir = debug_dir;
            }
            config.dry_run |= dry_run;
            config.hard_fail &= !no_hard_fail;
            config.validate()?;

            let options = ingest::IngestOptions {
                raw_runs,
                ..ingest::IngestOptions::from_config(&config)
            };

            let summary = ingest::execute(&config, &options).await?;
            ingest::print_summary(&summary);
        }
        Commands::Show { urn } => {
            show::execute(&config, &urn).await?;
        }
    }

    info!("Done");

    Ok(())
}
