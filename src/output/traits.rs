//! Output sink traits and error types

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Append-only record of visited URLs
///
/// The sink does no deduplication of its own; the crawler only records a URL
/// the first time it is visited.
pub trait CrawlSink: Send {
    /// Appends one visited URL
    fn record(&mut self, url: &str) -> OutputResult<()>;
}
