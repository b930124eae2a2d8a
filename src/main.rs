//! chunkload: split CSV files into chunks and bulk-load them into MySQL.

use clap::{Args, Parser, Subcommand};
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use chunkload::config::{Config, load_env_file};
use chunkload::error::{ConfigSnafu, MetricsSnafu, PipelineError};
use chunkload::logging::init_tracing;
use chunkload::metrics::TextfileExporter;
use chunkload::{LoadRequest, workflow};

/// CSV chunk splitter and MySQL bulk loader.
#[derive(Parser, Debug)]
#[command(name = "chunkload")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (default: read settings from env vars).
    #[arg(short, long, global = true, env = "CHUNKLOAD_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (default: ./.env if present).
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split every input CSV into chunk files.
    Split {
        /// Report the chunk plan without writing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Recreate a table from its schema and import the chunk files.
    Load(LoadArgs),
    /// Split, then load if the split succeeded.
    Run {
        /// Schema document name under the schema directory.
        #[arg(long)]
        dataset: String,
    },
}

#[derive(Args, Debug)]
struct LoadArgs {
    /// Schema document name under the schema directory.
    #[arg(long)]
    dataset: String,

    /// Import these files instead of discovering them (repeatable).
    #[arg(long = "file")]
    files: Vec<PathBuf>,

    /// Load even if the split completion marker is missing.
    #[arg(long)]
    skip_marker_check: bool,

    /// Log the statements without connecting.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level);
    info!("chunkload starting");

    if let Some(path) = load_env_file(cli.env_file.as_deref()).context(ConfigSnafu)? {
        debug!("Loaded environment from {}", path.display());
    }

    let config = Config::load(cli.config.as_deref()).context(ConfigSnafu)?;
    config.prepare_dirs().context(ConfigSnafu)?;

    let exporter = match &config.metrics.textfile {
        Some(path) => Some(TextfileExporter::install(path).context(MetricsSnafu)?),
        None => None,
    };

    let result = run(&cli.command, &config).await;

    if let Some(exporter) = &exporter
        && let Err(e) = exporter.flush()
    {
        warn!("{e}");
    }

    result
}

async fn run(command: &Command, config: &Config) -> Result<(), PipelineError> {
    match command {
        Command::Split { dry_run } => {
            let report = workflow::split(config, *dry_run).await?;
            info!(
                "Split completed: {} file(s), {} rows",
                report.files.len(),
                report.total_rows()
            );
        }
        Command::Load(args) => {
            let request = LoadRequest {
                dataset: args.dataset.clone(),
                files: args.files.clone(),
                skip_marker_check: args.skip_marker_check,
                dry_run: args.dry_run,
            };
            workflow::load(config, &request).await?;
        }
        Command::Run { dataset } => {
            let request = LoadRequest {
                dataset: dataset.clone(),
                ..LoadRequest::default()
            };
            workflow::split_then_load(config, &request).await?;
        }
    }
    Ok(())
}
