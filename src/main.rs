//! Strata-Crawl main entry point
//!
//! This is the command-line interface for the Strata-Crawl breadth-first crawler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use strata_crawl::config::{load_config, validate, Config};
use strata_crawl::crawler::Orchestrator;
use strata_crawl::output::{load_statistics, print_report, print_statistics};
use strata_crawl::storage::SqliteStore;
use tracing_subscriber::EnvFilter;

/// Strata-Crawl: a resumable breadth-first web crawler
///
/// Strata-Crawl crawls outward from a seed URL one depth level at a time,
/// classifies the topic of every page it fetches and records its progress
/// so an interrupted crawl picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "strata-crawl")]
#[command(version)]
#[command(about = "A resumable breadth-first web crawler", long_about = None)]
struct Cli {
    /// Seed URL to start crawling from
    #[arg(long, value_name = "URL", required_unless_present = "stats")]
    url: Option<String>,

    /// Maximum depth to crawl from the seed URL
    #[arg(long, value_name = "N", required_unless_present = "stats")]
    max_depth: Option<u32>,

    /// Number of concurrent fetches [default: 8]
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Path to the SQLite database [default: ./crawl.db]
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Directory for checkpoint files [default: ./checkpoints]
    #[arg(long, value_name = "DIR")]
    checkpoint_dir: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Start a fresh crawl, discarding previous state
    #[arg(long, conflicts_with = "stats")]
    fresh: bool,

    /// Show statistics from the database and exit
    #[arg(long)]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli)?;

    if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("strata_crawl=info,warn"),
            1 => EnvFilter::new("strata_crawl=debug,info"),
            2 => EnvFilter::new("strata_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file (if any) and applies CLI overrides on top
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("failed to load config {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(url) = &cli.url {
        config.crawler.seed_url = Some(url.clone());
    }
    if let Some(max_depth) = cli.max_depth {
        config.crawler.max_depth = max_depth;
    }
    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
    }
    if let Some(db) = &cli.db {
        config.storage.database_path = db.display().to_string();
    }
    if let Some(dir) = &cli.checkpoint_dir {
        config.storage.checkpoint_dir = dir.display().to_string();
    }

    validate(&config).context("invalid configuration")?;
    Ok(config)
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = PathBuf::from(&config.storage.database_path);
    if !path.exists() {
        anyhow::bail!("database {} does not exist", path.display());
    }

    println!("Database: {}\n", path.display());
    let store = SqliteStore::open(&path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (discarding previous state)");
    } else {
        tracing::info!("Starting crawl (will resume if an interrupted run exists)");
    }

    let mut orchestrator = Orchestrator::new(config, fresh).await?;

    let shutdown = orchestrator.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl-C, finishing the current batch");
            shutdown.cancel();
        }
    });

    let report = orchestrator.run().await?;
    print_report(&report);
    Ok(())
}
