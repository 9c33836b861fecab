//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with a browser user agent string
//! - GET requests for listing pages, gated by the per-domain limiter
//! - Retry logic for transient failures
//! - Error classification
//! - Fanning a batch of page requests out to tasks and draining their outcomes

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::limiter::DomainLimiter;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Why a single page could not be retrieved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("{url} returned HTTP {status_code}")]
    Status { url: String, status_code: u16 },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("fetch of {url} cancelled before it started")]
    Cancelled { url: String },
}

impl FetchError {
    /// Whether another attempt may succeed
    ///
    /// | Condition | Retried |
    /// |-----------|---------|
    /// | Timeout | yes |
    /// | HTTP 5xx | yes |
    /// | HTTP 429 | yes |
    /// | Other HTTP status | no |
    /// | Connection refused | no |
    /// | Cancelled | no |
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Status { status_code, .. } => {
                *status_code >= 500 || *status_code == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// One listing page to retrieve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number within its category
    pub page: u32,

    pub url: Url,
}

/// The resolution of a [`PageRequest`]
#[derive(Debug)]
pub struct PageOutcome {
    pub page: u32,
    pub url: Url,

    /// Page body on success
    pub result: Result<String, FetchError>,
}

/// Builds an HTTP client with proper configuration
///
/// No cookie store is installed, so every request is sessionless.
///
/// # Arguments
///
/// * `user_agent` - The browser identification to send
/// * `timeout` - Whole-request timeout
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.value.as_str())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a single URL once and classifies any failure
///
/// Any 2xx response is a success; every other status is a
/// [`FetchError::Status`].
pub async fn fetch_page(client: &Client, url: &Url) -> Result<String, FetchError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| classify_reqwest_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status_code: status.as_u16(),
        });
    }

    response
        .text()
        .await
        .map_err(|e| classify_reqwest_error(url, e))
}

fn classify_reqwest_error(url: &Url, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        FetchError::Connect {
            url: url.to_string(),
            message: e.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// Concurrent, rate-limited page fetcher
///
/// Cloning is cheap; clones share the HTTP client and the domain limiter, so
/// the concurrency ceiling holds across every batch a run submits.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    limiter: Arc<DomainLimiter>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl Fetcher {
    pub fn new(client: Client, limiter: Arc<DomainLimiter>) -> Self {
        Self {
            client,
            limiter,
            retry_attempts: 0,
            retry_delay: Duration::ZERO,
        }
    }

    /// Builds a fetcher from the crawler and user agent settings
    pub fn from_config(
        crawler: &CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(
            user_agent,
            Duration::from_secs(crawler.request_timeout_secs),
        )?;
        let limiter = DomainLimiter::new(
            crawler.max_concurrent_requests as usize,
            Duration::from_millis(crawler.delay_ms),
            Duration::from_millis(crawler.jitter_ms),
        );

        Ok(Self::new(client, Arc::new(limiter)).with_retries(
            crawler.retry_attempts,
            Duration::from_millis(crawler.retry_delay_ms),
        ))
    }

    /// Sets how often transient failures are retried and the pause between tries
    pub fn with_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    /// Fetches every request concurrently and streams the outcomes
    ///
    /// The receiver yields exactly one [`PageOutcome`] per request, in
    /// completion order, and closes once all of them have resolved. Requests
    /// that have not started when `cancel` fires resolve to
    /// [`FetchError::Cancelled`] without touching the network.
    pub fn fetch_all(
        &self,
        requests: Vec<PageRequest>,
        cancel: &CancellationToken,
    ) -> mpsc::Receiver<PageOutcome> {
        let (tx, rx) = mpsc::channel(requests.len().max(1));

        for request in requests {
            let tx = tx.clone();
            let fetcher = self.clone();
            let cancel = cancel.clone();

            tokio::spawn(async move {
                let result = fetcher.fetch_one(&request.url, &cancel).await;
                let outcome = PageOutcome {
                    page: request.page,
                    url: request.url,
                    result,
                };

                if tx.send(outcome).await.is_err() {
                    tracing::debug!("Outcome receiver dropped before page {}", request.page);
                }
            });
        }

        rx
    }

    /// Fetches one URL inside a limiter slot
    async fn fetch_one(&self, url: &Url, cancel: &CancellationToken) -> Result<String, FetchError> {
        let cancelled = || FetchError::Cancelled {
            url: url.to_string(),
        };
        let domain = url.host_str().unwrap_or_default();

        let slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            slot = self.limiter.acquire(domain) => slot.ok_or_else(cancelled)?,
        };

        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        tracing::info!("Visiting {}", url);
        let result = self.fetch_with_retry(url, cancel).await;

        // Hold the slot through its cooldown unless the run is shutting down
        tokio::select! {
            _ = slot.release() => {}
            _ = cancel.cancelled() => {}
        }

        result
    }

    async fn fetch_with_retry(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        let mut attempt = 0;

        loop {
            let e = match fetch_page(&self.client, url).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            if !e.is_transient() || attempt >= self.retry_attempts || cancel.is_cancelled() {
                return Err(e);
            }

            attempt += 1;
            tracing::debug!(
                "Retrying {} after: {} (attempt {}/{})",
                url,
                e,
                attempt,
                self.retry_attempts
            );

            // No new request once the run is cancelled
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(e),
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }
}
