//! Crawler coordinator - the breadth-first traversal loop
//!
//! The coordinator owns the crawl state and drives it through the lifecycle
//! in [`EngineState`]. For every frontier entry it:
//! - Skips entries past the depth limit or already visited
//! - Marks the URL visited and records it to the output sink
//! - Fetches the page and queues its links one level deeper
//! - Waits out the inter-request delay
//! - Snapshots the whole state to the store
//!
//! Fetch, sink and snapshot failures are logged and counted; none of them
//! stops the crawl.

use crate::config::CrawlerConfig;
use crate::crawler::PageFetcher;
use crate::output::CrawlSink;
use crate::state::{CrawlState, EngineState, FrontierEntry};
use crate::storage::StateStore;
use crate::CrawlError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// How a call to [`Coordinator::run`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStatus {
    /// The frontier drained
    Completed,
    /// A stop was requested; the frontier may still hold work
    Interrupted,
}

/// Summary of one call to [`Coordinator::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOutcome {
    pub status: CrawlStatus,

    /// Pages fetched (or attempted) during this run
    pub pages_visited: usize,

    /// Frontier entries dropped for depth or because they were already visited
    pub pages_skipped: usize,

    pub fetch_failures: usize,
    pub sink_failures: usize,
    pub persist_failures: usize,

    /// Entries left in the frontier when the run ended
    pub pending: usize,

    /// Size of the visited set, including earlier runs
    pub total_visited: usize,
}

/// Shared flag asking the coordinator to stop between pages
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the crawl to stop once the current page is finished
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct Tally {
    visited: usize,
    skipped: usize,
    fetch_failures: usize,
    sink_failures: usize,
    persist_failures: usize,
}

/// Main crawler coordinator structure
pub struct Coordinator<F: PageFetcher> {
    config: CrawlerConfig,
    state: CrawlState,
    engine_state: EngineState,
    fetcher: F,
    store: Box<dyn StateStore>,
    sink: Box<dyn CrawlSink>,
    stop: StopHandle,
}

impl<F: PageFetcher> Coordinator<F> {
    /// Creates a coordinator with an empty crawl state
    ///
    /// # Arguments
    ///
    /// * `config` - Seed, depth limit, user agent and delay
    /// * `fetcher` - Turns a URL into the links on that page
    /// * `store` - Where the state is snapshotted after every page
    /// * `sink` - Where every visited URL is recorded
    pub fn new(
        config: CrawlerConfig,
        fetcher: F,
        store: Box<dyn StateStore>,
        sink: Box<dyn CrawlSink>,
    ) -> Self {
        Self {
            config,
            state: CrawlState::new(),
            engine_state: EngineState::Idle,
            fetcher,
            store,
            sink,
            stop: StopHandle::new(),
        }
    }

    /// Replaces the initial crawl state
    pub fn with_state(mut self, state: CrawlState) -> Self {
        self.state = state;
        self
    }

    /// Uses an externally owned stop flag
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Returns a handle that can stop this coordinator from another task
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn engine_state(&self) -> EngineState {
        self.engine_state
    }

    /// Runs the crawl until the frontier drains or a stop is requested
    ///
    /// The stop flag is only checked between pages, so the state returned
    /// with [`CrawlStatus::Interrupted`] has always been snapshotted.
    ///
    /// # Errors
    ///
    /// Only lifecycle violations are returned, such as calling `run` again
    /// after the crawl completed. Per-page failures are counted in the
    /// returned [`CrawlOutcome`].
    pub async fn run(&mut self) -> Result<CrawlOutcome, CrawlError> {
        self.transition(EngineState::Running)?;

        if self.state.frontier.is_empty() {
            if self.state.enqueue(&self.config.seed_url, 0) {
                tracing::info!("Seeded frontier with {}", self.config.seed_url);
            } else {
                tracing::info!(
                    "Seed {} already visited, nothing left to crawl",
                    self.config.seed_url
                );
            }
        } else {
            tracing::info!(
                "Resuming crawl: {} visited, {} in frontier",
                self.state.visited.len(),
                self.state.frontier.len()
            );
        }

        let mut tally = Tally::default();
        let start_time = Instant::now();

        loop {
            if self.stop.is_stop_requested() {
                self.transition(EngineState::Idle)?;
                tracing::info!(
                    "Stop requested: {} pages crawled this run, {} left in frontier",
                    tally.visited,
                    self.state.frontier.len()
                );
                return Ok(self.outcome(CrawlStatus::Interrupted, tally));
            }

            let Some(entry) = self.state.frontier.dequeue() else {
                break;
            };

            if entry.depth() > self.config.max_depth {
                tracing::debug!(
                    "Skipping {} at depth {} (max depth {})",
                    entry.address(),
                    entry.depth(),
                    self.config.max_depth
                );
                tally.skipped += 1;
                continue;
            }

            if self.state.visited.contains(entry.address()) {
                tracing::debug!("Skipping already visited {}", entry.address());
                tally.skipped += 1;
                continue;
            }

            self.process_entry(&entry, &mut tally).await?;

            if tally.visited % 10 == 0 {
                let elapsed = start_time.elapsed();
                let rate = tally.visited as f64 / elapsed.as_secs_f64();
                tracing::info!(
                    "Progress: {} pages crawled, {} in frontier, {:.2} pages/sec",
                    tally.visited,
                    self.state.frontier.len(),
                    rate
                );
            }
        }

        self.transition(EngineState::Done)?;
        tracing::info!(
            "Crawl completed: {} pages crawled in {:?}, {} visited in total",
            tally.visited,
            start_time.elapsed(),
            self.state.visited.len()
        );

        Ok(self.outcome(CrawlStatus::Completed, tally))
    }

    /// Visits one frontier entry that passed the depth and visited filters
    async fn process_entry(
        &mut self,
        entry: &FrontierEntry,
        tally: &mut Tally,
    ) -> Result<(), CrawlError> {
        let url = entry.address();

        // Marked before the fetch so a failing page is never retried
        self.state.visited.add(url);
        tally.visited += 1;
        tracing::info!("Crawled URL: {}", url);

        if let Err(e) = self.sink.record(url) {
            tracing::error!("Failed to record {} to output: {}", url, e);
            tally.sink_failures += 1;
        }

        self.transition(EngineState::PausedForIo)?;

        match self.fetcher.fetch_links(url).await {
            Ok(links) => {
                let next_depth = entry.depth().saturating_add(1);
                let found = links.len();
                let queued = links
                    .iter()
                    .filter(|link| self.state.enqueue(link, next_depth))
                    .count();
                tracing::debug!(
                    "{}: {} links found, {} queued at depth {}",
                    url,
                    found,
                    queued,
                    next_depth
                );
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", url, e);
                tally.fetch_failures += 1;
            }
        }

        let delay = self.config.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.transition(EngineState::Running)?;

        if let Err(e) = self.store.save(&self.state) {
            tracing::error!("Failed to save crawl snapshot after {}: {}", url, e);
            tally.persist_failures += 1;
        }

        Ok(())
    }

    fn transition(&mut self, next: EngineState) -> Result<(), CrawlError> {
        if !self.engine_state.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: self.engine_state,
                to: next,
            });
        }
        tracing::trace!("Engine {} -> {}", self.engine_state, next);
        self.engine_state = next;
        Ok(())
    }

    fn outcome(&self, status: CrawlStatus, tally: Tally) -> CrawlOutcome {
        CrawlOutcome {
            status,
            pages_visited: tally.visited,
            pages_skipped: tally.skipped,
            fetch_failures: tally.fetch_failures,
            sink_failures: tally.sink_failures,
            persist_failures: tally.persist_failures,
            pending: self.state.frontier.len(),
            total_visited: self.state.visited.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{resume_state, FetchError};
    use crate::output::{OutputError, OutputResult};
    use crate::storage::{Snapshot, SqliteStateStore, StorageError, StorageResult};
    use chrono::Utc;
    use std::collections::{HashMap, HashSet};
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    const ROOT: &str = "http://example.com";

    fn url(path: &str) -> String {
        format!("{}{}", ROOT, path)
    }

    fn test_config(max_depth: u32) -> CrawlerConfig {
        CrawlerConfig {
            seed_url: ROOT.to_string(),
            max_depth,
            user_agent: "TestCrawler/1.0".to_string(),
            delay_between_requests: 0,
        }
    }

    /// Serves links from an in-memory graph and remembers every fetch
    #[derive(Default)]
    struct GraphFetcher {
        pages: HashMap<String, Vec<String>>,
        broken: HashSet<String>,
        fetched: Arc<Mutex<Vec<String>>>,
        stop_at: Option<(String, StopHandle)>,
    }

    impl GraphFetcher {
        fn page(mut self, from: &str, to: &[&str]) -> Self {
            self.pages
                .insert(from.to_string(), to.iter().map(|s| s.to_string()).collect());
            self
        }

        fn broken(mut self, address: &str) -> Self {
            self.broken.insert(address.to_string());
            self
        }

        fn stop_at(mut self, address: &str, stop: StopHandle) -> Self {
            self.stop_at = Some((address.to_string(), stop));
            self
        }
    }

    impl PageFetcher for GraphFetcher {
        async fn fetch_links(&self, url: &str) -> Result<Vec<String>, FetchError> {
            self.fetched.lock().unwrap().push(url.to_string());

            if let Some((address, stop)) = &self.stop_at {
                if address == url {
                    stop.request_stop();
                }
            }

            if self.broken.contains(url) {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 500,
                });
            }

            Ok(self.pages.get(url).cloned().unwrap_or_default())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        lines: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl CrawlSink for RecordingSink {
        fn record(&mut self, url: &str) -> OutputResult<()> {
            if self.fail {
                return Err(OutputError::Write("disk full".to_string()));
            }
            self.lines.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    /// Keeps the last saved state in shared memory
    #[derive(Clone, Default)]
    struct MemoryStore {
        saved: Arc<Mutex<Option<CrawlState>>>,
        saves: Arc<Mutex<usize>>,
    }

    impl StateStore for MemoryStore {
        fn save(&mut self, state: &CrawlState) -> StorageResult<()> {
            *self.saved.lock().unwrap() = Some(state.clone());
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }

        fn load(&self) -> StorageResult<Option<Snapshot>> {
            Ok(self.saved.lock().unwrap().clone().map(|state| Snapshot {
                state,
                saved_at: Utc::now(),
                config_hash: None,
                seed_url: None,
            }))
        }

        fn clear(&mut self) -> StorageResult<()> {
            *self.saved.lock().unwrap() = None;
            Ok(())
        }
    }

    struct FailingStore;

    impl StateStore for FailingStore {
        fn save(&mut self, _state: &CrawlState) -> StorageResult<()> {
            Err(StorageError::Corrupt("read-only".to_string()))
        }

        fn load(&self) -> StorageResult<Option<Snapshot>> {
            Err(StorageError::Corrupt("garbage".to_string()))
        }

        fn clear(&mut self) -> StorageResult<()> {
            Ok(())
        }
    }

    fn example_graph() -> GraphFetcher {
        GraphFetcher::default()
            .page(ROOT, &[&url("/a"), &url("/b")])
            .page(&url("/a"), &[&url("/c")])
    }

    #[tokio::test]
    async fn test_example_scenario() {
        let fetcher = example_graph();
        let fetched = fetcher.fetched.clone();
        let sink = RecordingSink::default();
        let lines = sink.lines.clone();
        let store = MemoryStore::default();

        let mut coordinator = Coordinator::new(
            test_config(1),
            fetcher,
            Box::new(store.clone()),
            Box::new(sink),
        );
        let outcome = coordinator.run().await.unwrap();

        assert_eq!(outcome.status, CrawlStatus::Completed);
        assert_eq!(outcome.pages_visited, 3);
        assert_eq!(outcome.pages_skipped, 1);
        assert_eq!(outcome.pending, 0);
        assert_eq!(outcome.total_visited, 3);
        assert_eq!(coordinator.engine_state(), EngineState::Done);

        assert_eq!(*lines.lock().unwrap(), vec![url(""), url("/a"), url("/b")]);
        assert!(!fetched.lock().unwrap().contains(&url("/c")));

        let visited: Vec<&str> = coordinator.state().visited.iter().collect();
        assert_eq!(visited, vec![ROOT, "http://example.com/a", "http://example.com/b"]);

        // One snapshot per processed page, none for the skipped /c
        assert_eq!(*store.saves.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_breadth_first_order() {
        let fetcher = GraphFetcher::default()
            .page(ROOT, &[&url("/a"), &url("/b")])
            .page(&url("/a"), &[&url("/a1"), &url("/a2")])
            .page(&url("/b"), &[&url("/b1"), &url("/a")]);
        let sink = RecordingSink::default();
        let lines = sink.lines.clone();

        let mut coordinator = Coordinator::new(
            test_config(5),
            fetcher,
            Box::new(MemoryStore::default()),
            Box::new(sink),
        );
        coordinator.run().await.unwrap();

        assert_eq!(
            *lines.lock().unwrap(),
            vec![
                url(""),
                url("/a"),
                url("/b"),
                url("/a1"),
                url("/a2"),
                url("/b1")
            ]
        );
    }

    #[tokio::test]
    async fn test_depth_zero_only_visits_seed() {
        let fetcher = example_graph();
        let fetched = fetcher.fetched.clone();

        let mut coordinator = Coordinator::new(
            test_config(0),
            fetcher,
            Box::new(MemoryStore::default()),
            Box::new(RecordingSink::default()),
        );
        let outcome = coordinator.run().await.unwrap();

        assert_eq!(outcome.pages_visited, 1);
        assert_eq!(outcome.pages_skipped, 2);
        assert_eq!(*fetched.lock().unwrap(), vec![ROOT.to_string()]);
    }

    #[tokio::test]
    async fn test_cycles_visit_each_page_once() {
        let fetcher = GraphFetcher::default()
            .page(ROOT, &[&url("/a"), ROOT])
            .page(&url("/a"), &[ROOT, &url("/a"), &url("/b")])
            .page(&url("/b"), &[&url("/a"), ROOT]);
        let sink = RecordingSink::default();
        let lines = sink.lines.clone();

        let mut coordinator = Coordinator::new(
            test_config(10),
            fetcher,
            Box::new(MemoryStore::default()),
            Box::new(sink),
        );
        coordinator.run().await.unwrap();

        let lines = lines.lock().unwrap();
        let unique: HashSet<&String> = lines.iter().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(unique.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_error_still_recorded() {
        let fetcher = example_graph().broken(&url("/a"));
        let sink = RecordingSink::default();
        let lines = sink.lines.clone();

        let mut coordinator = Coordinator::new(
            test_config(3),
            fetcher,
            Box::new(MemoryStore::default()),
            Box::new(sink),
        );
        let outcome = coordinator.run().await.unwrap();

        assert_eq!(outcome.status, CrawlStatus::Completed);
        assert_eq!(outcome.fetch_failures, 1);
        assert!(coordinator.state().visited.contains(&url("/a")));
        assert_eq!(*lines.lock().unwrap(), vec![url(""), url("/a"), url("/b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_after_every_visited_page_only() {
        // /a fails to fetch, /c sits past the depth limit
        let fetcher = GraphFetcher::default()
            .page(ROOT, &[&url("/a"), &url("/b")])
            .page(&url("/b"), &[&url("/c")])
            .broken(&url("/a"));
        let config = CrawlerConfig {
            delay_between_requests: 1000,
            ..test_config(1)
        };

        let mut coordinator = Coordinator::new(
            config,
            fetcher,
            Box::new(MemoryStore::default()),
            Box::new(RecordingSink::default()),
        );

        let start = tokio::time::Instant::now();
        let outcome = coordinator.run().await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(outcome.pages_visited, 3);
        assert_eq!(outcome.fetch_failures, 1);
        assert_eq!(outcome.pages_skipped, 1);
        assert_eq!(elapsed, Duration::from_millis(1000) * outcome.pages_visited as u32);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_not_fatal() {
        let sink = RecordingSink::default();
        let lines = sink.lines.clone();

        let mut coordinator =
            Coordinator::new(test_config(1), example_graph(), Box::new(FailingStore), Box::new(sink));
        let outcome = coordinator.run().await.unwrap();

        assert_eq!(outcome.status, CrawlStatus::Completed);
        assert_eq!(outcome.persist_failures, 3);
        assert_eq!(lines.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_sink_failure_is_not_fatal() {
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };

        let mut coordinator = Coordinator::new(
            test_config(1),
            example_graph(),
            Box::new(MemoryStore::default()),
            Box::new(sink),
        );
        let outcome = coordinator.run().await.unwrap();

        assert_eq!(outcome.sink_failures, 3);
        assert_eq!(outcome.total_visited, 3);
    }

    #[tokio::test]
    async fn test_cold_start_when_snapshot_unreadable() {
        let state = resume_state(&FailingStore, None, Path::new("crawled_urls.txt"));
        let mut coordinator = Coordinator::new(
            test_config(1),
            example_graph(),
            Box::new(FailingStore),
            Box::new(RecordingSink::default()),
        )
        .with_state(state);
        assert!(coordinator.state().is_empty());

        let outcome = coordinator.run().await.unwrap();
        assert_eq!(outcome.total_visited, 3);
    }

    #[tokio::test]
    async fn test_stop_then_resume_matches_uninterrupted_run() {
        let graph = || {
            GraphFetcher::default()
                .page(ROOT, &[&url("/a"), &url("/b")])
                .page(&url("/a"), &[&url("/c"), &url("/d")])
                .page(&url("/b"), &[&url("/d"), &url("/e")])
        };

        let full_sink = RecordingSink::default();
        let full_lines = full_sink.lines.clone();
        let mut full = Coordinator::new(
            test_config(2),
            graph(),
            Box::new(MemoryStore::default()),
            Box::new(full_sink),
        );
        full.run().await.unwrap();

        let store = MemoryStore::default();
        let sink = RecordingSink::default();
        let lines = sink.lines.clone();
        let stop = StopHandle::new();

        let mut first = Coordinator::new(
            test_config(2),
            graph().stop_at(&url("/a"), stop.clone()),
            Box::new(store.clone()),
            Box::new(sink.clone()),
        )
        .with_stop_handle(stop);
        let outcome = first.run().await.unwrap();

        assert_eq!(outcome.status, CrawlStatus::Interrupted);
        assert_eq!(first.engine_state(), EngineState::Idle);
        assert_eq!(outcome.pages_visited, 2);
        assert!(outcome.pending > 0);

        let restored = resume_state(&store, None, Path::new("crawled_urls.txt"));
        let mut second =
            Coordinator::new(test_config(2), graph(), Box::new(store.clone()), Box::new(sink))
                .with_state(restored);
        assert_eq!(second.state(), first.state());

        let outcome = second.run().await.unwrap();
        assert_eq!(outcome.status, CrawlStatus::Completed);

        assert_eq!(*lines.lock().unwrap(), *full_lines.lock().unwrap());
        assert_eq!(second.state().visited, full.state().visited);
    }

    #[tokio::test]
    async fn test_drained_snapshot_completes_immediately() {
        let mut state = CrawlState::new();
        state.visited.add(ROOT);
        state.visited.add(&url("/a"));

        let fetcher = example_graph();
        let fetched = fetcher.fetched.clone();
        let mut coordinator = Coordinator::new(
            test_config(1),
            fetcher,
            Box::new(MemoryStore::default()),
            Box::new(RecordingSink::default()),
        )
        .with_state(state);

        let outcome = coordinator.run().await.unwrap();

        assert_eq!(outcome.status, CrawlStatus::Completed);
        assert_eq!(outcome.pages_visited, 0);
        assert!(fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_written_to_sqlite() {
        let store = SqliteStateStore::new_in_memory().unwrap();
        let mut coordinator = Coordinator::new(
            test_config(1),
            example_graph(),
            Box::new(store),
            Box::new(RecordingSink::default()),
        );
        let outcome = coordinator.run().await.unwrap();

        assert_eq!(outcome.persist_failures, 0);
        assert_eq!(coordinator.state().frontier.len(), 0);
    }

    #[tokio::test]
    async fn test_run_after_completion_is_rejected() {
        let mut coordinator = Coordinator::new(
            test_config(1),
            example_graph(),
            Box::new(MemoryStore::default()),
            Box::new(RecordingSink::default()),
        );
        coordinator.run().await.unwrap();

        let result = coordinator.run().await;
        assert!(matches!(
            result,
            Err(CrawlError::InvalidTransition {
                from: EngineState::Done,
                to: EngineState::Running
            })
        ));
    }

    #[tokio::test]
    async fn test_stop_before_run_keeps_frontier() {
        let mut coordinator = Coordinator::new(
            test_config(1),
            example_graph(),
            Box::new(MemoryStore::default()),
            Box::new(RecordingSink::default()),
        );
        coordinator.stop_handle().request_stop();

        let outcome = coordinator.run().await.unwrap();
        assert_eq!(outcome.status, CrawlStatus::Interrupted);
        assert_eq!(outcome.pages_visited, 0);
        assert_eq!(outcome.pending, 1);
    }
}
