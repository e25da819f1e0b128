//! Forager main entry point
//!
//! This is the command-line interface for the Forager content-discovery
//! crawler.

use clap::Parser;
use forager::config::load_config_with_hash;
use forager::crawler::build_scheduler;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Forager: a polite content-discovery crawler
///
/// Forager periodically polls registered sources (RSS/Atom feeds, XML
/// sitemaps, websites), deduplicates discovered URLs against crawl
/// history, extracts page metadata, and submits new items to a
/// content-intake service. It respects robots.txt and per-domain rate
/// limits.
#[derive(Parser, Debug)]
#[command(name = "forager")]
#[command(version = "0.1.0")]
#[command(about = "A polite content-discovery crawler", long_about = None)]
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

    /// Run a single scheduler tick and exit
    #[arg(long, conflicts_with_all = ["trigger", "dry_run", "stats"])]
    once: bool,

    /// Crawl one source immediately by ID, then exit
    #[arg(long, value_name = "SOURCE_ID", conflicts_with_all = ["once", "dry_run", "stats"])]
    trigger: Option<i64>,

    /// Validate config and list due sources without crawling
    #[arg(long, conflicts_with_all = ["once", "trigger", "stats"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["once", "trigger", "dry_run"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, _config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(source_id) = cli.trigger {
        handle_trigger(&config, source_id).await?;
    } else {
        handle_run(&config, cli.once).await?;
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
            0 => EnvFilter::new("forager=info,warn"),
            1 => EnvFilter::new("forager=debug,info"),
            2 => EnvFilter::new("forager=trace,debug"),
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

/// Handles the --dry-run mode: validates config and lists due sources
fn handle_dry_run(config: &forager::config::Config) -> Result<(), Box<dyn std::error::Error>> {
    use forager::storage::{SqliteStorage, Storage};
    use std::path::Path;

    println!("=== Forager Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Tick interval: {}s", config.crawler.tick_interval_secs);
    println!(
        "  Max concurrent jobs: {}",
        config.crawler.max_concurrent_jobs
    );
    println!(
        "  Default crawl delay: {}ms",
        config.crawler.default_crawl_delay_ms
    );
    println!(
        "  Request timeout: {}s",
        config.crawler.request_timeout_secs
    );
    if config.crawler.recency_window_days > 0 {
        println!(
            "  Recency window: {} days",
            config.crawler.recency_window_days
        );
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.user_agent_string());

    println!("\nIntake:");
    match &config.intake.endpoint {
        Some(endpoint) => println!("  Endpoint: {}", endpoint),
        None => println!("  Endpoint: none (discovered items will be logged)"),
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let sources = storage.list_sources()?;
    let due = storage.due_sources(chrono::Utc::now())?;

    println!("\nSources ({} registered, {} due now):", sources.len(), due.len());
    for source in &sources {
        let due_marker = if due.iter().any(|d| d.id == source.id) {
            " [due]"
        } else {
            ""
        };
        let enabled_marker = if source.enabled { "" } else { " [disabled]" };
        println!(
            "  - #{} {} ({}) every {}h{}{}",
            source.id,
            source.name,
            source.kind,
            source.crawl_frequency_hours,
            enabled_marker,
            due_marker
        );
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &forager::config::Config) -> Result<(), Box<dyn std::error::Error>> {
    use forager::stats::{load_stats, print_stats};
    use forager::storage::{SqliteStorage, Storage};
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let report = load_stats(&storage)?;
    print_stats(&report);

    let recent = storage.recent_jobs(10)?;
    if !recent.is_empty() {
        println!("\n=== Recent Jobs ===");
        for job in &recent {
            println!(
                "  #{} source {} {} at {}: {} found, {} submitted, {} duplicate, {} rejected, {} errors",
                job.id,
                job.source_id,
                job.status,
                job.started_at,
                job.counts.candidates_found,
                job.counts.submitted,
                job.counts.duplicates,
                job.counts.rejected,
                job.counts.errors
            );
        }
    }

    Ok(())
}

/// Handles the --trigger mode: crawls one source immediately
async fn handle_trigger(
    config: &forager::config::Config,
    source_id: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    let scheduler = build_scheduler(config)?;
    scheduler.trigger(source_id).await?;
    Ok(())
}

/// Handles the normal and --once run modes
async fn handle_run(
    config: &forager::config::Config,
    once: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let scheduler = build_scheduler(config)?;

    if once {
        let dispatched = scheduler.run_once().await?;
        tracing::info!("Single tick complete: {} jobs dispatched", dispatched);
    } else {
        scheduler.run().await?;
        tracing::info!("Scheduler stopped");
    }

    Ok(())
}
