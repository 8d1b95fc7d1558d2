//! Ripple-Harvest main entry point
//!
//! This is the command-line interface for the Ripple-Harvest collection harvester.

use anyhow::Context;
use clap::Parser;
use ripple_harvest::config::{load_config_with_hash, Config, PageNumbering};
use ripple_harvest::crawler::{check_proxies, harvest, ProxyPool};
use ripple_harvest::output::{
    load_statistics, print_proxy_report, print_run_summary, print_statistics,
};
use ripple_harvest::storage::DedupStore;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Ripple-Harvest: a resumable, proxy-rotating collection harvester
///
/// Ripple-Harvest walks paginated collections, fetches every item through a
/// rotating proxy pool, and appends extracted records to a JSON store that
/// is also the deduplication index for the next run.
#[derive(Parser, Debug)]
#[command(name = "ripple-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, proxy-rotating collection harvester", long_about = None)]
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

    /// Validate config and proxies and show what would be harvested
    #[arg(long, conflicts_with_all = ["stats", "check_proxies"])]
    dry_run: bool,

    /// Show statistics from the record store and exit
    #[arg(long, conflicts_with_all = ["dry_run", "check_proxies"])]
    stats: bool,

    /// Send one request through every proxy and report which ones work
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    check_proxies: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if cli.check_proxies {
        handle_check_proxies(&config).await
    } else {
        handle_harvest(&config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_harvest=info,warn"),
            1 => EnvFilter::new("ripple_harvest=debug,info"),
            2 => EnvFilter::new("ripple_harvest=trace,debug"),
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

fn describe_numbering(numbering: &PageNumbering) -> String {
    match numbering {
        PageNumbering::PathSuffix => "path suffix (<base>/N/)".to_string(),
        PageNumbering::QueryParam { name } => format!("query parameter ({}=N)", name),
    }
}

/// Handles the --dry-run mode: validates config and proxies, sends nothing
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Ripple-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Attempts per fetch: {}", config.crawler.max_retries);
    println!("  Attempt timeout: {}s", config.crawler.request_timeout_secs);
    println!(
        "  Max concurrent requests: {}",
        config.crawler.max_concurrent_requests
    );
    println!("  Page concurrency: {}", config.crawler.page_concurrency);
    println!("  Item concurrency: {}", config.crawler.item_concurrency);

    let pool = ProxyPool::load(Path::new(&config.proxies.path))?;
    println!("\nProxies:");
    println!("  File: {}", config.proxies.path);
    println!("  Usable endpoints: {}", pool.len());

    println!("\nUser Agents:");
    if config.identity.user_agents.is_empty() {
        println!("  Built-in browser list");
    } else {
        println!("  {} configured", config.identity.user_agents.len());
    }

    println!("\nPagination:");
    println!("  Last page selector: {}", config.pagination.last_page_selector);
    println!(
        "  Listings: {}",
        describe_numbering(&config.pagination.listing_numbering)
    );
    println!(
        "  Collections: {}",
        describe_numbering(&config.pagination.collection_numbering)
    );
    println!("  Max pages: {}", config.pagination.max_pages);

    println!("\nOutput:");
    println!("  Store: {}", config.output.store_path);

    println!("\nListing Seeds ({}):", config.seeds.listings.len());
    for seed in &config.seeds.listings {
        println!("  - {}", seed);
    }

    println!("\nCollection Seeds ({}):", config.seeds.collections.len());
    for seed in &config.seeds.collections {
        println!("  - {}", seed);
    }

    println!("\nExtracted Fields ({}):", config.extract.fields.len());
    for field in &config.extract.fields {
        println!("  - {} ({})", field.name, field.selector);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start harvesting from {} seed URLs",
        config.seeds.listings.len() + config.seeds.collections.len()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the record store
///
/// The store is opened read-only; a malformed file is reported, not moved.
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let store = DedupStore::open_read_only(&config.output.store_path)
        .with_context(|| format!("Cannot read record store {}", config.output.store_path))?;
    print_statistics(&load_statistics(&store));
    Ok(())
}

/// Handles the --check-proxies mode: one request per proxy, no retries
async fn handle_check_proxies(config: &Config) -> anyhow::Result<()> {
    tracing::info!(
        "Checking proxies from {} against {}",
        config.proxies.path,
        config.proxies.check_url
    );

    let checks = check_proxies(config).await?;
    print_proxy_report(&checks);

    if !checks.iter().any(|check| check.is_working()) {
        anyhow::bail!("No working proxy in {}", config.proxies.path);
    }
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config) -> anyhow::Result<()> {
    tracing::info!(
        "Listing seeds: {}, Collection seeds: {}",
        config.seeds.listings.len(),
        config.seeds.collections.len()
    );

    match harvest(config).await {
        Ok(summary) => {
            tracing::info!("Harvest completed successfully");
            print_run_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
