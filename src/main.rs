//! Quote-Crawler main entry point
//!
//! This is the command-line interface for the quote crawler.

use clap::Parser;
use quote_crawler::config::{
    derive_start_url, load_config_with_hash, seed_tasks, validate, Config, OutputFormat,
};
use quote_crawler::crawler::run_crawl;
use quote_crawler::output::{load_statistics, print_statistics, print_summary, SqliteSink};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Quote-Crawler: a bounded, quota-aware quotes crawler
///
/// Walks listing pages, author pages and their paginated continuations,
/// collecting quotes until the wanted number has been saved or the page
/// depth ceiling is reached.
#[derive(Parser, Debug)]
#[command(name = "quote-crawler")]
#[command(version = "1.0.0")]
#[command(about = "A bounded, quota-aware quotes crawler", long_about = None)]
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

    /// Override the number of records wanted
    #[arg(long, value_name = "N")]
    wanted: Option<u32>,

    /// Override the page-depth ceiling
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the SQLite output and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(wanted) = cli.wanted {
        config.crawl.results_wanted = wanted;
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawl.max_pages = max_pages;
    }

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("quote_crawler=info,warn"),
            1 => EnvFilter::new("quote_crawler=debug,info"),
            2 => EnvFilter::new("quote_crawler=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    validate(config)?;
    let seeds = seed_tasks(&config.seeds)?;

    println!("=== Quote-Crawler Dry Run ===\n");

    println!("Crawl Configuration:");
    println!("  Results wanted: {}", config.crawl.results_wanted);
    println!("  Max pages (depth ceiling): {}", config.crawl.max_pages);
    println!("  Mode: {:?}", config.crawl.mode);
    println!("  Workers: {}", config.crawl.workers);
    println!("  Frontier capacity: {}", config.crawl.frontier_capacity);
    println!("  Follow-link policy: {:?}", config.crawl.follow_link_policy);
    if let Some(deadline) = config.crawl.deadline_secs {
        println!("  Deadline: {}s", deadline);
    }

    println!("\nFetch:");
    println!("  Max attempts: {}", config.fetch.max_attempts);
    println!("  Attempt timeout: {}ms", config.fetch.attempt_timeout_ms);
    println!(
        "  Backoff: {}ms base, {}ms cap",
        config.fetch.backoff_base_ms, config.fetch.backoff_cap_ms
    );
    println!(
        "  Jitter: {}-{}ms",
        config.fetch.min_delay_ms, config.fetch.max_delay_ms
    );
    println!("  Proxy endpoints: {}", config.proxy.urls.len());

    println!("\nOutput:");
    println!("  Format: {:?}", config.output.format);
    println!("  Path: {}", config.output.path);

    if config.seeds.explicit_urls().is_empty() {
        println!("\nDerived start URL: {}", derive_start_url(&config.seeds));
    }

    println!("\nSeed Tasks ({}):", seeds.len());
    for seed in &seeds {
        println!("  - [{}] {}", seed.role, seed.url);
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the SQLite output
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if config.output.format != OutputFormat::Sqlite {
        return Err("--stats requires `format = \"sqlite\"` in [output]".into());
    }

    println!("Database: {}\n", config.output.path);

    let sink = SqliteSink::new(Path::new(&config.output.path))?;
    let stats = load_statistics(&sink, 10)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();

    let stop = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing in-flight attempts and stopping");
            stop.cancel();
        }
    });

    match run_crawl(config, cancel).await {
        Ok(summary) => {
            tracing::info!("Crawl completed: {} record(s) saved", summary.saved);
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
