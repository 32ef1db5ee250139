//! Crawler module for web page fetching and traversal
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the `PageFetcher` trait
//! - HTML parsing and link extraction
//! - The breadth-first traversal loop
//! - Wiring config, snapshot store and output file into one crawl

mod coordinator;
mod fetcher;
mod parser;

pub use coordinator::{Coordinator, CrawlOutcome, CrawlStatus, StopHandle};
pub use fetcher::{build_http_client, fetch_url, FetchError, FetchedPage, HttpFetcher, PageFetcher};
pub use parser::extract_links;

use crate::config::Config;
use crate::output::TextFileSink;
use crate::state::CrawlState;
use crate::storage::{open_state_store, restore_state, StateStore};
use crate::CrawlError;
use std::path::Path;

/// Options that change how a crawl starts, beyond the config file
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Discard any snapshot and truncate the output file
    pub fresh: bool,

    /// Hash of the config file, stored with every snapshot
    pub config_hash: Option<String>,

    /// Flag that stops the crawl between pages when set
    pub stop: Option<StopHandle>,
}

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the snapshot store
/// 2. Restore the last snapshot, or clear it for a fresh run
/// 3. Open the crawled-URL output file
/// 4. Build the HTTP client
/// 5. Run the traversal until the frontier drains or a stop is requested
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `options` - Fresh-start flag, config hash and stop handle
///
/// # Returns
///
/// * `Ok(CrawlOutcome)` - Crawl completed or was stopped
/// * `Err(CrawlError)` - The store, output file or client could not be set up
///
/// # Example
///
/// ```no_run
/// use bfs_crawl::config::load_config;
/// use bfs_crawl::crawler::{crawl, CrawlOptions};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let outcome = crawl(config, CrawlOptions::default()).await?;
/// println!("{:?}", outcome.status);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: Config, options: CrawlOptions) -> Result<CrawlOutcome, CrawlError> {
    let state_path = Path::new(&config.output.state_path);
    let sink_path = Path::new(&config.output.crawled_urls_path);

    let mut store = open_state_store(state_path)?
        .with_metadata(options.config_hash.clone(), Some(config.crawler.seed_url.clone()));

    let (state, sink) = if options.fresh {
        tracing::info!("Fresh crawl requested, discarding previous snapshot and output");
        store.clear()?;
        (CrawlState::new(), TextFileSink::truncate(sink_path)?)
    } else {
        let state = resume_state(&store, options.config_hash.as_deref(), sink_path);
        (state, TextFileSink::open(sink_path)?)
    };

    let fetcher = HttpFetcher::new(&config.crawler.user_agent)?;

    let mut coordinator =
        Coordinator::new(config.crawler, fetcher, Box::new(store), Box::new(sink)).with_state(state);
    if let Some(stop) = options.stop {
        coordinator = coordinator.with_stop_handle(stop);
    }

    coordinator.run().await
}

/// Restores the crawl state a resumed run starts from
///
/// A missing or unreadable snapshot gives an empty state. A snapshot saved
/// under a different config hash is still used, with a warning, as is one
/// whose output file has gone missing. Call this before the output file is
/// opened, since opening creates it.
pub(crate) fn resume_state(
    store: &dyn StateStore,
    config_hash: Option<&str>,
    sink_path: &Path,
) -> CrawlState {
    let Some(snapshot) = restore_state(store) else {
        return CrawlState::new();
    };

    if let (Some(saved), Some(current)) = (snapshot.config_hash.as_deref(), config_hash) {
        if saved != current {
            tracing::warn!("Configuration changed since the snapshot was saved, resuming anyway");
        }
    }

    if !snapshot.state.visited.is_empty() && !sink_path.exists() {
        tracing::warn!(
            "Output file {} is missing but {} URLs were already visited; \
             use --export-visited to rebuild it",
            sink_path.display(),
            snapshot.state.visited.len()
        );
    }

    snapshot.state
}
