//! kc-certcrawl main entry point
//!
//! This is the command-line interface for the certification record crawler.

use anyhow::Context;
use clap::Parser;
use kc_certcrawl::config::{default_config, load_config_with_hash, Config};
use kc_certcrawl::crawler::{clamp_workers, crawl, plan_workers};
use kc_certcrawl::logging::filter_directive;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// kc-certcrawl: a resumable, multi-worker certification record crawler
///
/// kc-certcrawl drives one browser session per worker over the certification
/// listing, captures each detail page into the worker's JSON partition, and
/// resumes from the saved partitions when restarted.
#[derive(Parser, Debug)]
#[command(name = "kc-certcrawl")]
#[command(version = "1.0.0")]
#[command(about = "A resumable certification record crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Number of workers to run (default from config, at most 20)
    #[arg(short, long, value_name = "N")]
    threads: Option<usize>,

    /// Run the browsers without a window
    #[arg(long)]
    headless: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the worker plan without opening browsers
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the partition directory and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let filter = filter_directive(cli.verbose, cli.quiet);
    setup_logging(filter);

    // Load and validate configuration
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using built-in defaults");
            default_config().context("Built-in configuration is invalid")?
        }
    };

    if cli.headless {
        config.browser.headless = true;
    }
    let workers = clamp_workers(cli.threads.unwrap_or(config.crawler.workers));

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, workers);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, workers, filter).await;
    }

    Ok(())
}

/// Sets up the global tracing subscriber used outside the workers
fn setup_logging(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the configuration and the worker plan
fn handle_dry_run(config: &Config, workers: usize) {
    println!("=== kc-certcrawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", workers);
    println!("  Page size: {}", config.crawler.page_size);
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay_ms);
    println!("  Wait timeout: {}s", config.crawler.wait_timeout_secs);
    println!("  Sweep all rows: {}", config.crawler.sweep);
    println!(
        "  Direction split: ordinals < {} go {}",
        config.crawler.direction_split, config.crawler.below_split
    );

    println!("\nBrowser:");
    println!("  WebDriver: {}", config.browser.webdriver_url);
    println!("  Headless: {}", config.browser.headless);
    if let Some(proxy) = &config.browser.proxy {
        println!("  Proxy: {}", proxy);
    }

    println!("\nSite:");
    println!("  Listing: {}", config.site.listing_url);
    println!("  Rows: {}", config.site.rows);
    println!("  Next page: {}", config.site.next_page);
    println!("  Previous page: {}", config.site.previous_page);

    println!("\nOutput:");
    println!("  Partitions: {}", config.output.directory.display());
    println!("  Logs: {}", config.output.log_directory.display());

    println!("\nWorker Plan:");
    for plan in plan_workers(config, workers) {
        let existing = plan
            .existing
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unreadable".to_string());
        println!(
            "  {:>2}  {:<8}  slots {:<14}  {}  existing {:>6}  jump cycles {}",
            plan.ordinal,
            plan.direction.as_str(),
            format!("{:?}", plan.slots.slots(config.crawler.page_size)),
            plan.partition.display(),
            existing,
            plan.resume.cycles
        );
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start {} workers", workers);
}

/// Handles the --stats mode: shows statistics from the partition directory
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use kc_certcrawl::output::{load_statistics, print_statistics};

    println!("Partitions: {}\n", config.output.directory.display());

    // Load statistics
    let stats = load_statistics(&config.output.directory, &config.schema.id_label)
        .with_context(|| format!("Failed to read {}", config.output.directory.display()))?;

    // Print statistics
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, workers: usize, filter: &str) {
    tracing::info!(
        "Starting crawl of {} with {} workers (partitions in {})",
        config.site.listing_url,
        workers,
        config.output.directory.display()
    );

    let summary = crawl(config, workers, filter).await;

    if summary.interrupted {
        tracing::warn!("Crawl interrupted; rerun to resume from the saved partitions");
    } else {
        tracing::info!("Crawl completed");
    }
}
