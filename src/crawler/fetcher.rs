//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent
//! - GET requests to fetch page content
//! - Content-Type checks before parsing
//! - Error classification
//!
//! Failures are never retried; the coordinator logs them and moves on.

use crate::crawler::parser::extract_links;
use reqwest::{redirect::Policy, Client};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur while fetching a single page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Unsupported content type '{content_type}' at {url}")]
    UnsupportedContentType { url: String, content_type: String },

    #[error("Failed to read body of {url}: {source}")]
    Body { url: String, source: reqwest::Error },

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

/// Something that can turn a URL into the absolute links found on that page
///
/// The coordinator only ever sees this trait, so tests can drive it with an
/// in-memory link graph instead of a network.
pub trait PageFetcher {
    /// Fetches `url` and returns the absolute URLs it links to
    fn fetch_links(&self, url: &str)
        -> impl Future<Output = Result<Vec<String>, FetchError>> + Send;
}

/// A fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects (the base for relative links)
    pub final_url: String,
    /// HTTP status code
    pub status_code: u16,
    /// Page body content
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header value
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use bfs_crawl::crawler::build_http_client;
///
/// let client = build_http_client("bfs-crawl/0.1").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and returns its body if it is a parseable document
///
/// # Error Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | Connection refused, DNS, TLS, timeout | `Transport` |
/// | Non-2xx status after redirects | `Status` |
/// | Content-Type not text/* or XML | `UnsupportedContentType` |
/// | Body could not be read or decoded | `Body` |
pub async fn fetch_url(client: &Client, url: &str) -> Result<FetchedPage, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    let final_url = response.url().to_string();

    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    if let Some(content_type) = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        if !is_parseable_content_type(content_type) {
            return Err(FetchError::UnsupportedContentType {
                url: url.to_string(),
                content_type: content_type.to_string(),
            });
        }
    }

    let body = response.text().await.map_err(|source| FetchError::Body {
        url: url.to_string(),
        source,
    })?;

    Ok(FetchedPage {
        final_url,
        status_code: status.as_u16(),
        body,
    })
}

/// Returns true for text and XML media types
///
/// A missing Content-Type header is also accepted by the caller.
fn is_parseable_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    mime.starts_with("text/")
        || mime == "application/xml"
        || (mime.starts_with("application/") && mime.ends_with("+xml"))
}

/// Page fetcher backed by a reqwest client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher that identifies itself with `user_agent`
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent)?,
        })
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch_links(&self, url: &str) -> Result<Vec<String>, FetchError> {
        let page = fetch_url(&self.client, url).await?;
        let base_url = Url::parse(&page.final_url).map_err(|source| FetchError::InvalidUrl {
            url: page.final_url.clone(),
            source,
        })?;

        tracing::trace!(
            "Fetched {} (HTTP {}, {} bytes)",
            page.final_url,
            page.status_code,
            page.body.len()
        );

        Ok(extract_links(&page.body, &base_url))
    }
}
