//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client from the fetch configuration
//! - GET requests with an independent per-request timeout
//! - Bounded retry of transient failures
//! - Error classification

use crate::config::FetchConfig;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Maximum number of redirects followed for a single fetch
const MAX_REDIRECTS: usize = 10;

/// A successfully fetched response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value, if any
    pub content_type: Option<String>,
    /// Raw response body
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Returns true if the response should go through the HTML extractor
    ///
    /// A missing Content-Type is treated as HTML.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
            None => true,
        }
    }
}

/// Per-URL fetch failure
///
/// These are recorded on the URL record, never propagated to the crawl.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Returns true if the failure may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) => true,
            Self::Status(code) => *code == 429 || (500..600).contains(code),
            Self::Body(_) | Self::Request(_) => false,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Outcome of one URL handed to the worker pool
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The server answered with a 2xx response
    Fetched(FetchedPage),
    /// The fetch failed after exhausting retries
    Failed(FetchError),
    /// The fetch was never attempted because of shutdown
    Cancelled,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use strata_crawl::config::FetchConfig;
/// use strata_crawl::crawler::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, retrying transient failures
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Fetched |
/// | HTTP 429, 5xx | Retry up to `max_retries`, then Failed |
/// | Timeout, connect error | Retry up to `max_retries`, then Failed |
/// | Other HTTP status | Immediate Failed |
/// | Body read error | Immediate Failed |
///
/// Every attempt gets its own `request_timeout_ms` deadline.
pub async fn fetch_url(client: &Client, url: &str, config: &FetchConfig) -> FetchOutcome {
    let mut attempt = 0;

    loop {
        match fetch_once(client, url, config).await {
            Ok(page) => return FetchOutcome::Fetched(page),
            Err(err) if err.is_transient() && attempt < config.max_retries => {
                attempt += 1;
                debug!(
                    "Transient failure for {} ({}), retry {}/{}",
                    url, err, attempt, config.max_retries
                );
                tokio::time::sleep(Duration::from_millis(config.retry_delay_ms)).await;
            }
            Err(err) => return FetchOutcome::Failed(err),
        }
    }
}

async fn fetch_once(client: &Client, url: &str, config: &FetchConfig) -> Result<FetchedPage, FetchError> {
    let deadline = Duration::from_millis(config.request_timeout_ms);

    tokio::time::timeout(deadline, async {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Body(e.to_string())
            }
        })?;

        Ok(FetchedPage {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    })
    .await
    .map_err(|_| FetchError::Timeout)?
}
