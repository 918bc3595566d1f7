//! Sumi-Docket main entry point
//!
//! This is the command-line interface that runs one crawl cycle per
//! configured source. An external scheduler is expected to invoke it
//! periodically.

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_docket::adapter::{JsonListingAdapter, SourceAdapter};
use sumi_docket::config::{load_config_with_hash, Config, SourceConfig};
use sumi_docket::cycle::plan_ranges;
use sumi_docket::fetcher::{FsArtifactSink, ResilientFetcher};
use sumi_docket::output::{
    load_statistics, print_cycle_error, print_cycle_report, print_plan, print_statistics,
};
use sumi_docket::proxy::ProxyRotator;
use sumi_docket::storage::{SqliteStorage, Storage};
use sumi_docket::watermark::DateWatermark;
use sumi_docket::{CancelFlag, CrawlCycle};
use tracing_subscriber::EnvFilter;

/// Sumi-Docket: incremental court-opinion ingestion
///
/// Resumes every source from its persisted watermark, admits new records
/// through the deduplication gate, downloads their artifacts through the
/// proxy pool and advances the watermark.
#[derive(Parser, Debug)]
#[command(name = "sumi-docket")]
#[command(version = "1.0.0")]
#[command(about = "Incremental court-opinion ingestion", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Only run the source with this id
    #[arg(long, value_name = "ID")]
    source: Option<String>,

    /// Run as if today were this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    today: Option<NaiveDate>,

    /// Validate config and show the ranges that would be scanned
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let sources = select_sources(&config, cli.source.as_deref())?;
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());

    if cli.dry_run {
        handle_dry_run(&config, &sources, today)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_cycles(&config, config_hash, sources, today).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_docket=info,warn"),
            1 => EnvFilter::new("sumi_docket=debug,info"),
            2 => EnvFilter::new("sumi_docket=trace,debug"),
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

fn select_sources(config: &Config, only: Option<&str>) -> anyhow::Result<Vec<SourceConfig>> {
    match only {
        Some(id) => match config.source(id) {
            Some(source) => Ok(vec![source.clone()]),
            None => bail!("No source with id '{}' in configuration", id),
        },
        None => Ok(config.sources.clone()),
    }
}

/// Handles the --dry-run mode: shows the ranges each source would scan
///
/// Reads existing watermarks but never writes to the database.
fn handle_dry_run(
    config: &Config,
    sources: &[SourceConfig],
    today: NaiveDate,
) -> anyhow::Result<()> {
    println!("=== Sumi-Docket Dry Run ({}) ===\n", today);

    let database = Path::new(&config.output.database_path);
    let storage = if database.exists() {
        Some(SqliteStorage::new(database)?)
    } else {
        None
    };

    for source in sources {
        let persisted = match &storage {
            Some(storage) => storage
                .get_crawl_config(&source.id)?
                .map(|row| row.crawled_through),
            None => None,
        };
        let crawled_through = persisted.unwrap_or_else(|| source.seed_watermark.clone());

        let prior = DateWatermark::new(&source.date_format).parse(&crawled_through)?;
        print_plan(&source.id, &crawled_through, &plan_ranges(source, prior, today));
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Proxies configured: {}", config.proxies.len());
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Runs one cycle for each selected source
async fn handle_cycles(
    config: &Config,
    config_hash: String,
    sources: Vec<SourceConfig>,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    let threshold = config.crawler.proxy_failure_threshold;
    let rotator = ProxyRotator::from_config(&config.proxies, threshold).map(Arc::new);
    match &rotator {
        Some(rotator) => tracing::info!("Rotating downloads over {} proxies", rotator.len()),
        None => tracing::info!("No proxies configured, downloading directly"),
    }

    let fetcher =
        ResilientFetcher::from_config(config, rotator, Arc::new(FsArtifactSink::new()))?;

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping after the current record");
                cancel.cancel();
            }
        });
    }

    let timeout = Duration::from_secs(config.crawler.fetch_timeout_secs);
    let mut jobs: Vec<(SourceConfig, Arc<dyn SourceAdapter>)> = Vec::new();
    for source in sources {
        let adapter: Arc<dyn SourceAdapter> = Arc::new(JsonListingAdapter::from_config(
            &source,
            &config.user_agent,
            timeout,
        )?);
        jobs.push((source, adapter));
    }

    let total = jobs.len();
    let cycle = CrawlCycle::new(
        Arc::new(Mutex::new(storage)),
        Arc::new(fetcher),
        config_hash,
        cancel,
    );
    let results = cycle
        .run_all(jobs, today, config.crawler.max_concurrent_sources as usize)
        .await;

    let mut failed = 0;
    for (source_id, result) in &results {
        match result {
            Ok(report) => print_cycle_report(report),
            Err(e) => {
                failed += 1;
                print_cycle_error(source_id, e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} cycles failed", failed, total);
    }
    Ok(())
}
