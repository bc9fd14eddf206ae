//! Site-Harvest main entry point
//!
//! This is the command-line interface for the business website crawler.

use anyhow::{bail, Context};
use clap::Parser;
use site_harvest::config::{load_config_with_hash, Config};
use site_harvest::output::print_summary;
use site_harvest::{build_dispatcher, load_providers, Provider};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Site-Harvest: crawls business websites into per-business documents
///
/// Every provider's website is rendered with headless Chrome, normalized
/// into text and merged into one document per business in the configured
/// store.
#[derive(Parser, Debug)]
#[command(name = "site-harvest")]
#[command(version = "1.0.0")]
#[command(about = "Crawls business websites into a document store", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Path to the provider list (JSON array or JSON lines)
    #[arg(value_name = "PROVIDERS")]
    providers: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Validate config and providers and show the plan without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet, cli.json_logs);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let providers = load_providers(&cli.providers)
        .with_context(|| format!("failed to load {}", cli.providers.display()))?;
    tracing::info!("Loaded {} providers", providers.len());

    if cli.dry_run {
        print_plan(&config, &providers);
        return Ok(());
    }

    if providers.is_empty() {
        bail!("no provider with a usable website in {}", cli.providers.display());
    }

    let dispatcher = build_dispatcher(config).context("failed to prepare the crawl")?;

    let shutdown = dispatcher.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            shutdown.shutdown();
        }
    });

    let report = dispatcher.run(providers).await;
    print_summary(&report);

    for failure in &report.failed_units {
        tracing::error!(
            unit = failure.unit,
            business_id = failure.business_id.as_deref().unwrap_or("-"),
            "Execution unit failed: {}",
            failure.error
        );
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool, json: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_harvest=info,warn"),
            1 => EnvFilter::new("site_harvest=debug,info"),
            2 => EnvFilter::new("site_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Handles the --dry-run mode: shows what would be crawled
fn print_plan(config: &Config, providers: &[Provider]) {
    println!("=== Site-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!(
        "  Max pages per website: {}",
        config.crawler.max_pages_per_website
    );
    println!("  Workers per site: {}", config.crawler.workers_per_site);
    println!("  Batch size: {}", config.crawler.batch_size);
    println!("  Site timeout: {}s", config.crawler.site_timeout_secs);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);
    println!(
        "  Blocked resources: {}",
        config.crawler.blocked_resource_types.join(", ")
    );

    println!("\nDispatch:");
    println!("  Execution units: {}", config.dispatch.execution_units);

    println!("\nStore:");
    println!("  Backend: {:?}", config.store.backend);
    if let Some(endpoint) = &config.store.endpoint {
        println!("  Endpoint: {}", endpoint);
    }
    if let Some(index) = &config.store.index {
        println!("  Index: {}", index);
    }
    if let Some(path) = &config.store.database_path {
        println!("  Database: {}", path);
    }

    println!("\nProviders ({}):", providers.len());
    for provider in providers {
        println!("  - {} {}", provider.business_id, provider.website);
    }

    println!("\nDry run complete. No pages were fetched.");
}
