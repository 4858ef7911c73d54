//! Sitedex main entry point
//!
//! This is the command-line interface for the Sitedex crawl-and-index pipeline.

use anyhow::Context;
use clap::Parser;
use sitedex::config::{load_config_with_hash, Config};
use sitedex::crawler::run_crawl;
use sitedex::index::run_index;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Sitedex: crawl a site and build its search index
///
/// Sitedex follows links breadth-first from the configured seeds, keeps every
/// fetched page in a content-addressed store, and rebuilds a full-text index
/// plus a JSON payload for a static search page.
#[derive(Parser, Debug)]
#[command(name = "sitedex")]
#[command(version)]
#[command(about = "Crawl a site and build its search index", long_about = None)]
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

    /// Only crawl: seeds to page records
    #[arg(long, conflicts_with = "index_only")]
    crawl_only: bool,

    /// Only index: page records to index and export
    #[arg(long, conflicts_with = "crawl_only")]
    index_only: bool,

    /// Repeat the pipeline every SECS seconds until Ctrl-C
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    every: Option<u64>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "every"])]
    dry_run: bool,

    /// Show statistics of the latest crawl run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "every"])]
    stats: bool,
}

/// Which stages a pipeline run executes
#[derive(Debug, Clone, Copy)]
struct Stages {
    crawl: bool,
    index: bool,
}

impl Stages {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            crawl: !cli.index_only,
            index: !cli.crawl_only,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }
    if cli.stats {
        return handle_stats(&config);
    }

    let stages = Stages::from_cli(&cli);
    match cli.every {
        Some(secs) => run_scheduled(&config, &config_hash, stages, Duration::from_secs(secs)).await,
        None => run_pipeline(&config, &config_hash, stages).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitedex=info,warn"),
            1 => EnvFilter::new("sitedex=debug,info"),
            2 => EnvFilter::new("sitedex=trace,debug"),
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

/// Runs the selected stages once
async fn run_pipeline(config: &Config, config_hash: &str, stages: Stages) -> anyhow::Result<()> {
    if stages.crawl {
        let report = run_crawl(config, config_hash).await.context("Crawl failed")?;
        tracing::info!(
            "Crawl run {} wrote {} records to {}",
            report.run_id,
            report.records_written,
            config.output.records_path.display()
        );
    }

    if stages.index {
        let index_config = config.clone();
        let report = tokio::task::spawn_blocking(move || run_index(&index_config))
            .await
            .context("Indexing task stopped abnormally")?
            .context("Indexing failed")?;
        tracing::info!(
            "Indexed {} documents, exported {} to {}",
            report.documents_indexed,
            report.exported,
            config.output.export_path.display()
        );
    }

    Ok(())
}

/// Runs the pipeline on an interval until Ctrl-C
///
/// A failed run is logged and the schedule continues. Ctrl-C takes effect
/// between runs.
async fn run_scheduled(
    config: &Config,
    config_hash: &str,
    stages: Stages,
    interval: Duration,
) -> anyhow::Result<()> {
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        if let Err(e) = run_pipeline(config, config_hash, stages).await {
            tracing::error!("Scheduled run failed: {:#}", e);
        }

        tracing::info!("Next run in {:?}", interval);
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Received Ctrl-C, stopping schedule");
                return Ok(());
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Sitedex Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!(
        "  Concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!(
        "  Politeness delay: {}ms",
        config.crawler.politeness_delay_ms
    );
    println!("  Request timeout: {}ms", config.crawler.request_timeout_ms);
    println!("  Max redirects: {}", config.crawler.max_redirects);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Max host requests: {}", config.crawler.max_host_requests);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);
    if config.crawler.allowed_hosts.is_empty() {
        println!("  Allowed hosts: seed hosts");
    } else {
        println!(
            "  Allowed hosts: {}",
            config.crawler.allowed_hosts.join(", ")
        );
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Records: {}", config.output.records_path.display());
    println!("  Content: {}", config.output.content_dir.display());
    println!("  Ledger: {}", config.output.database_path.display());
    println!("  Index: {}", config.output.index_dir.display());
    println!("  Export: {}", config.output.export_path.display());

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the ledger
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use sitedex::output::{load_statistics, print_statistics};
    use sitedex::storage::open_ledger;

    println!("Ledger: {}\n", config.output.database_path.display());

    let ledger = open_ledger(&config.output.database_path).context("Failed to open ledger")?;
    match load_statistics(&ledger).context("Failed to read ledger")? {
        Some(stats) => print_statistics(&stats),
        None => println!("No crawl runs recorded yet."),
    }

    Ok(())
}
