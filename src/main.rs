//! Lab-Scout main entry point
//!
//! This is the command-line interface for the Lab-Scout research-lab crawler.

use anyhow::{bail, Context};
use clap::Parser;
use lab_scout::config::{load_config_with_hash, load_seed_file, Config, SeedEntry};
use lab_scout::crawler::{build_collaborators, CrawlService, StartAck, StartRequest};
use lab_scout::output::{load_statistics, print_statistics};
use lab_scout::state::RunCheckpoint;
use lab_scout::storage::open_storage;
use lab_scout::url::normalize_url;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Lab-Scout: an adaptive research-lab crawler
///
/// Lab-Scout crawls outward from seed URLs, follows the links its online
/// relevance model ranks highest and stores structured records about research
/// labs, publications and equipment.
#[derive(Parser, Debug)]
#[command(name = "lab-scout")]
#[command(version)]
#[command(about = "An adaptive research-lab crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Additional seed file (one `url|anchor text` per line)
    #[arg(long, value_name = "FILE")]
    seeds: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume the frontier and visited set saved by an interrupted run
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Discard any saved run checkpoint before starting
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the record database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let seeds = collect_seeds(&config, cli.seeds.as_deref())?;

    if cli.dry_run {
        handle_dry_run(&config, &seeds);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, config_hash, seeds, cli.resume, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lab_scout=info,warn"),
            1 => EnvFilter::new("lab_scout=debug,info"),
            2 => EnvFilter::new("lab_scout=trace,debug"),
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

/// Config seeds followed by seed-file entries, without duplicate URLs
fn collect_seeds(config: &Config, seed_file: Option<&Path>) -> anyhow::Result<Vec<SeedEntry>> {
    let mut seeds = config.seeds.clone();
    if let Some(path) = seed_file {
        let extra = load_seed_file(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        tracing::info!("Loaded {} seeds from {}", extra.len(), path.display());
        seeds.extend(extra);
    }

    let mut seen = std::collections::HashSet::new();
    seeds.retain(|seed| match normalize_url(&seed.url) {
        Ok(url) => seen.insert(url.to_string()),
        Err(_) => true,
    });
    Ok(seeds)
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, seeds: &[SeedEntry]) {
    println!("=== Lab-Scout Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Request timeout: {}ms", config.crawler.request_timeout_ms);
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay_ms);
    println!("  Links per page: {}", config.crawler.max_links_per_page);
    if config.crawler.run_timeout_secs > 0 {
        println!("  Run deadline: {}s", config.crawler.run_timeout_secs);
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nModel:");
    println!("  Learning rate: {}", config.model.learning_rate);
    println!(
        "  Snapshot: {}",
        config.model.snapshot_path.as_deref().unwrap_or("(none)")
    );

    println!("\nExtraction: {:?}", config.extraction.mode);
    for provider in &config.extraction.providers {
        println!("  - {} ({})", provider.name, provider.model);
    }

    println!(
        "\nRendering endpoint: {}",
        config.rendering.endpoint.as_deref().unwrap_or("(none)")
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    if let Some(path) = &config.output.checkpoint_path {
        println!("  Checkpoint: {}", path);
    }

    println!("\nDomain scope:");
    println!("  Allow: {:?}", config.domains.allow);
    println!("  Block: {:?}", config.domains.block);

    println!("\nSeeds ({}):", seeds.len());
    for seed in seeds {
        match normalize_url(&seed.url) {
            Ok(url) if seed.anchor.is_empty() => println!("  * {}", url),
            Ok(url) => println!("  * {} ({})", url, seed.anchor),
            Err(e) => println!("  ! {} (invalid: {})", seed.url, e),
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    seeds: Vec<SeedEntry>,
    resume: bool,
    fresh: bool,
) -> anyhow::Result<()> {
    if fresh {
        if let Some(path) = &config.output.checkpoint_path {
            tracing::info!("Starting fresh crawl (discarding checkpoint {})", path);
            RunCheckpoint::clear(Path::new(path))?;
        }
    } else if resume {
        tracing::info!("Resuming from the saved run checkpoint");
    }

    tracing::info!("Total seed URLs: {}", seeds.len());

    let collaborators = build_collaborators(&config)?;
    let service = Arc::new(CrawlService::new(config, collaborators).with_config_hash(config_hash));

    if service.start(StartRequest { seeds, resume })? == StartAck::AlreadyRunning {
        bail!("a crawl run is already active");
    }

    let stopper = Arc::clone(&service);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            stopper.stop();
        }
    });

    let report = service.wait().await?;

    println!("\n=== Crawl Summary ===");
    println!("Outcome: {}", report.outcome);
    if let Some(run_id) = report.run_id {
        println!("Run: #{}", run_id);
    }
    println!("Pages visited: {}", report.visited);
    println!("Frontier remaining: {}", report.frontier_remaining);
    println!(
        "Records: {} new, {} updated, {} unchanged",
        report.counters.records_inserted, report.counters.records_updated, report.counters.duplicates
    );
    println!(
        "Failures: {} fetch, {} extraction, {} storage",
        report.counters.fetch_failures,
        report.counters.extraction_failures,
        report.counters.storage_failures
    );
    println!("Model updates: {}", report.counters.model_updates);

    Ok(())
}
