//! bfs-crawl main entry point
//!
//! This is the command-line interface for the bfs-crawl breadth-first crawler.

use anyhow::{bail, Context};
use bfs_crawl::config::{load_config_with_hash, validate_seed_url, Config, LoggingConfig};
use bfs_crawl::crawler::{crawl, CrawlOptions, CrawlStatus, StopHandle};
use bfs_crawl::output::{print_statistics, rebuild_sink, SnapshotStatistics};
use bfs_crawl::storage::{open_snapshot_read_only, StateStore};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// bfs-crawl: a resumable breadth-first web crawler
///
/// bfs-crawl visits every page reachable from a seed URL within a maximum
/// link distance, appends each visited URL to a text file, and snapshots its
/// progress after every page so an interrupted crawl can pick up where it
/// stopped.
#[derive(Parser, Debug)]
#[command(name = "bfs-crawl")]
#[command(version)]
#[command(about = "A resumable breadth-first web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error console output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl from this URL instead of the configured seed
    #[arg(long, value_name = "URL")]
    seed: Option<String>,

    /// Start a fresh crawl, discarding the snapshot and the crawled-URL file
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export_visited", "fresh"])]
    dry_run: bool,

    /// Show statistics from the saved snapshot and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_visited", "fresh"])]
    stats: bool,

    /// Rewrite the crawled-URL file from the saved snapshot and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "fresh"])]
    export_visited: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load and validate configuration
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    if let Some(seed) = &cli.seed {
        validate_seed_url(seed).context("Invalid --seed")?;
        config.crawler.seed_url = seed.clone();
    }

    setup_logging(&config.logging, cli.verbose, cli.quiet);
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if cli.export_visited {
        handle_export_visited(&config)
    } else {
        handle_crawl(config, config_hash, cli.fresh).await
    }
}

/// Sets up console and log-file output
///
/// The console honours `-v`/`-q`; the log file always receives everything at
/// the configured level or above, whatever the command-line verbosity. If the
/// log file cannot be opened the crawler keeps logging to the console only.
fn setup_logging(logging: &LoggingConfig, verbose: u8, quiet: bool) {
    let level = logging.level.to_ascii_lowercase();

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_filter(EnvFilter::new(console_directives(&level, verbose, quiet)));

    let (file_layer, file_error) = match open_log_file(Path::new(&logging.file)) {
        Ok(file) => {
            let layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false)
                .with_filter(EnvFilter::new(file_directives(&level)));
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        tracing::error!(
            "Could not open log file {}: {}; logging to console only",
            logging.file,
            e
        );
    }
}

fn console_directives(level: &str, verbose: u8, quiet: bool) -> String {
    if quiet {
        // Only show errors
        return "error".to_string();
    }

    match verbose {
        0 => file_directives(level),
        1 => "bfs_crawl=debug,info".to_string(),
        2 => "bfs_crawl=trace,debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn file_directives(level: &str) -> String {
    format!("bfs_crawl={},warn", level)
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== bfs-crawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Seed URL: {}", config.crawler.seed_url);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  User agent: {}", config.crawler.user_agent);
    println!(
        "  Delay between requests: {}ms",
        config.crawler.delay_between_requests
    );

    println!("\nLogging:");
    println!("  File: {}", config.logging.file);
    println!("  Level: {}", config.logging.level);

    println!("\nOutput:");
    println!("  Crawled URLs: {}", config.output.crawled_urls_path);
    println!("  Snapshot: {}", config.output.state_path);

    println!("\n✓ Configuration is valid");

    let state_path = Path::new(&config.output.state_path);
    if !state_path.exists() {
        println!("✓ Would start a cold crawl from {}", config.crawler.seed_url);
        return Ok(());
    }

    let store = open_snapshot_read_only(state_path)
        .with_context(|| format!("Failed to open snapshot {}", state_path.display()))?;
    match store.load() {
        Ok(Some(snapshot)) if !snapshot.state.frontier.is_empty() => {
            let stats = SnapshotStatistics::from_snapshot(&snapshot, config.crawler.max_depth);
            println!(
                "✓ Would resume: {} visited, {} pending ({} within depth limit)",
                stats.visited,
                stats.pending,
                stats.pending_within_depth()
            );
        }
        Ok(Some(snapshot)) => {
            println!(
                "✓ Snapshot has an empty frontier ({} visited); the crawl would finish immediately",
                snapshot.state.visited.len()
            );
        }
        Ok(None) => {
            println!("✓ Would start a cold crawl from {}", config.crawler.seed_url);
        }
        Err(e) => {
            println!("✓ Snapshot is unreadable ({}); would start a cold crawl", e);
        }
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the saved snapshot
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let state_path = Path::new(&config.output.state_path);
    println!("Snapshot: {}\n", state_path.display());

    if !state_path.exists() {
        println!("No snapshot found");
        return Ok(());
    }

    let store = open_snapshot_read_only(state_path)
        .with_context(|| format!("Failed to open snapshot {}", state_path.display()))?;
    let Some(snapshot) = store.load().context("Failed to read snapshot")? else {
        println!("No snapshot found");
        return Ok(());
    };

    let stats = SnapshotStatistics::from_snapshot(&snapshot, config.crawler.max_depth);
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-visited mode: rebuilds the crawled-URL file
fn handle_export_visited(config: &Config) -> anyhow::Result<()> {
    let state_path = Path::new(&config.output.state_path);
    let output_path = Path::new(&config.output.crawled_urls_path);

    println!("=== Exporting Visited URLs ===\n");
    println!("Snapshot: {}", state_path.display());
    println!("Output: {}", output_path.display());
    println!();

    if !state_path.exists() {
        bail!("No snapshot at {}", state_path.display());
    }

    let store = open_snapshot_read_only(state_path)
        .with_context(|| format!("Failed to open snapshot {}", state_path.display()))?;
    let Some(snapshot) = store.load().context("Failed to read snapshot")? else {
        bail!("Snapshot at {} is empty", state_path.display());
    };

    let written = rebuild_sink(&snapshot.state.visited, output_path)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    println!("✓ Wrote {} URLs to: {}", written, output_path.display());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume from snapshot if one exists)");
    }

    tracing::info!(
        "Seed: {}, max depth: {}, delay: {}ms",
        config.crawler.seed_url,
        config.crawler.max_depth,
        config.crawler.delay_between_requests
    );

    let stop = StopHandle::new();
    spawn_interrupt_handler(stop.clone());

    let options = CrawlOptions {
        fresh,
        config_hash: Some(config_hash),
        stop: Some(stop),
    };

    let outcome = match crawl(config, options).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    match outcome.status {
        CrawlStatus::Completed => tracing::info!(
            "Crawl completed: {} pages this run, {} visited in total",
            outcome.pages_visited,
            outcome.total_visited
        ),
        CrawlStatus::Interrupted => tracing::info!(
            "Crawl interrupted: {} pages this run, {} still pending; run again to resume",
            outcome.pages_visited,
            outcome.pending
        ),
    }

    if outcome.fetch_failures + outcome.sink_failures + outcome.persist_failures > 0 {
        tracing::warn!(
            "Failures: {} fetch, {} output, {} snapshot",
            outcome.fetch_failures,
            outcome.sink_failures,
            outcome.persist_failures
        );
    }

    Ok(())
}

/// First Ctrl-C stops the crawl between pages, a second one exits at once
fn spawn_interrupt_handler(stop: StopHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Could not listen for Ctrl-C");
            return;
        }
        tracing::warn!("Interrupt received, stopping after the current page");
        stop.request_stop();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt received, exiting without a final snapshot");
            std::process::exit(130);
        }
    });
}
