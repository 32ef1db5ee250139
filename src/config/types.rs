use serde::Deserialize;
use std::time::Duration;

/// Where the crawl snapshot lives when `state-path` is not configured
pub const DEFAULT_STATE_PATH: &str = "output/crawl_state.db";

/// Main configuration structure for bfs-crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// URL the crawl starts from (depth 0)
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Maximum link distance from the seed that is still fetched
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Pause after every processed page (milliseconds)
    #[serde(rename = "delay-between-requests")]
    pub delay_between_requests: u64,
}

impl CrawlerConfig {
    /// The inter-request delay as a `Duration`
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_between_requests)
    }
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Path of the append-only log file
    pub file: String,

    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the plain-text list of crawled URLs
    #[serde(rename = "crawled-urls-path")]
    pub crawled_urls_path: String,

    /// Path of the SQLite crawl snapshot
    #[serde(rename = "state-path", default = "default_state_path")]
    pub state_path: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_state_path() -> String {
    DEFAULT_STATE_PATH.to_string()
}
