//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end, including resuming from the on-disk
//! snapshot.

use bfs_crawl::config::{Config, CrawlerConfig, LoggingConfig, OutputConfig};
use bfs_crawl::crawler::{
    crawl, Coordinator, CrawlOptions, CrawlStatus, FetchError, HttpFetcher, PageFetcher,
    StopHandle,
};
use bfs_crawl::output::TextFileSink;
use bfs_crawl::storage::{open_state_store, StateStore};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration rooted at `seed_url`, writing into `dir`
fn create_test_config(seed_url: &str, max_depth: u32, dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            seed_url: seed_url.to_string(),
            max_depth,
            user_agent: "TestBot/1.0".to_string(),
            delay_between_requests: 0,
        },
        logging: LoggingConfig {
            file: dir.join("crawler.log").display().to_string(),
            level: "info".to_string(),
        },
        output: OutputConfig {
            crawled_urls_path: dir.join("crawled_urls.txt").display().to_string(),
            state_path: dir.join("crawl_state.db").display().to_string(),
        },
    }
}

fn html_page(links: &[String]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|link| format!(r#"<a href="{}">link</a>"#, link))
        .collect();
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", anchors))
        .insert_header("content-type", "text/html")
}

fn read_lines(path: &str) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Mounts a small site:
///
/// ```text
/// /       -> /page1, /page2
/// /page1  -> /page3, /
/// /page2  -> /page1 (relative), /missing
/// /page3  -> (no links)
/// ```
async fn mount_site(server: &MockServer, expect_shallow: u64, expect_deep: u64) {
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&[
            format!("{}/page1", base),
            format!("{}/page2", base),
        ]))
        .expect(expect_shallow)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html_page(&[format!("{}/page3", base), format!("{}/", base)]))
        .expect(expect_shallow)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html_page(&["page1".to_string(), "/missing".to_string()]))
        .expect(expect_shallow)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page3"))
        .respond_with(html_page(&[]))
        .expect(expect_deep)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(expect_deep)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();
    mount_site(&mock_server, 1, 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/", base), 2, dir.path());
    let output_path = config.output.crawled_urls_path.clone();

    let outcome = crawl(config, CrawlOptions::default()).await.unwrap();

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(outcome.pages_visited, 5);
    assert_eq!(outcome.total_visited, 5);
    assert_eq!(outcome.pending, 0);
    // The 404 page is still visited and recorded
    assert_eq!(outcome.fetch_failures, 1);

    assert_eq!(
        read_lines(&output_path),
        vec![
            format!("{}/", base),
            format!("{}/page1", base),
            format!("{}/page2", base),
            format!("{}/page3", base),
            format!("{}/missing", base),
        ]
    );
}

#[tokio::test]
async fn test_crawl_with_depth_limit() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();
    // Depth-2 pages must never be requested
    mount_site(&mock_server, 1, 0).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/", base), 1, dir.path());
    let output_path = config.output.crawled_urls_path.clone();

    let outcome = crawl(config, CrawlOptions::default()).await.unwrap();

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(outcome.pages_visited, 3);
    assert_eq!(
        read_lines(&output_path),
        vec![
            format!("{}/", base),
            format!("{}/page1", base),
            format!("{}/page2", base),
        ]
    );
}

#[tokio::test]
async fn test_rerun_after_completion_fetches_nothing() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();
    // Every page is fetched exactly once across both runs
    mount_site(&mock_server, 1, 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/", base), 2, dir.path());
    let output_path = config.output.crawled_urls_path.clone();

    crawl(config.clone(), CrawlOptions::default()).await.unwrap();
    let outcome = crawl(config, CrawlOptions::default()).await.unwrap();

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(outcome.pages_visited, 0);
    assert_eq!(outcome.total_visited, 5);
    assert_eq!(read_lines(&output_path).len(), 5);
}

#[tokio::test]
async fn test_fresh_run_starts_over() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();
    // Every page is fetched once per run
    mount_site(&mock_server, 2, 2).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/", base), 2, dir.path());
    let output_path = config.output.crawled_urls_path.clone();

    crawl(config.clone(), CrawlOptions::default()).await.unwrap();

    let options = CrawlOptions {
        fresh: true,
        ..Default::default()
    };
    let outcome = crawl(config, options).await.unwrap();

    assert_eq!(outcome.pages_visited, 5);
    assert_eq!(read_lines(&output_path).len(), 5);
}

/// Wraps the HTTP fetcher and requests a stop once `stop_at` has been fetched
struct StopAfter {
    inner: HttpFetcher,
    stop_at: String,
    stop: StopHandle,
}

impl PageFetcher for StopAfter {
    async fn fetch_links(&self, url: &str) -> Result<Vec<String>, FetchError> {
        let links = self.inner.fetch_links(url).await;
        if url == self.stop_at {
            self.stop.request_stop();
        }
        links
    }
}

#[tokio::test]
async fn test_interrupted_crawl_resumes_from_snapshot() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();
    // Each page is requested once even though the crawl is split in two
    mount_site(&mock_server, 1, 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/", base), 2, dir.path());
    let output_path = config.output.crawled_urls_path.clone();

    {
        let stop = StopHandle::new();
        let fetcher = StopAfter {
            inner: HttpFetcher::new(&config.crawler.user_agent).unwrap(),
            stop_at: format!("{}/page1", base),
            stop: stop.clone(),
        };
        let store = open_state_store(Path::new(&config.output.state_path)).unwrap();
        let sink = TextFileSink::open(Path::new(&output_path)).unwrap();

        let mut coordinator =
            Coordinator::new(config.crawler.clone(), fetcher, Box::new(store), Box::new(sink))
                .with_stop_handle(stop);
        let outcome = coordinator.run().await.unwrap();

        assert_eq!(outcome.status, CrawlStatus::Interrupted);
        assert_eq!(outcome.pages_visited, 2);
    }

    let saved = open_state_store(Path::new(&config.output.state_path))
        .unwrap()
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(saved.state.visited.len(), 2);
    assert_eq!(saved.state.frontier.len(), 2);

    let outcome = crawl(config, CrawlOptions::default()).await.unwrap();

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(outcome.pages_visited, 3);
    assert_eq!(outcome.total_visited, 5);
    assert_eq!(
        read_lines(&output_path),
        vec![
            format!("{}/", base),
            format!("{}/page1", base),
            format!("{}/page2", base),
            format!("{}/page3", base),
            format!("{}/missing", base),
        ]
    );
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_cold() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();
    mount_site(&mock_server, 1, 0).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/", base), 1, dir.path());
    std::fs::write(&config.output.state_path, b"definitely not sqlite").unwrap();

    let outcome = crawl(config.clone(), CrawlOptions::default()).await.unwrap();

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(outcome.pages_visited, 3);
    assert!(Path::new(&format!("{}.corrupt", config.output.state_path)).exists());
}
