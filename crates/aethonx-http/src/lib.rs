// SPDX-License-Identifier: MIT OR Apache-2.0
//! The shared HTTP client used by network-facing sources (spec §4.8/C8):
//! a `reqwest` client wrapped with per-source rate limiting and bounded
//! retries on transient failures. Safe for parallel use — `reqwest::Client`
//! pools connections internally (spec §5).

#![deny(unsafe_code)]
#![warn(missing_docs)]

use aethonx_core::CancellationToken;
use aethonx_error::{AethonError, ErrorCode};
use aethonx_ratelimit::RateLimiter;
use aethonx_resilience::RetryPolicy;
use reqwest::{Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Client construction options.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Optional upstream proxy (`--proxy`/`-p`).
    pub proxy: Option<String>,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            proxy: None,
            user_agent: format!("aethonx/{}", aethonx_core::ENGINE_VERSION),
        }
    }
}

/// Shared HTTP client: one `reqwest::Client` (cheap to clone, pools
/// connections), a per-source [`RateLimiter`], and a [`RetryPolicy`] applied
/// to transient failures (network errors and 5xx/429 responses).
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Build a client from `config`. Fails only if the proxy URL or TLS
    /// setup is invalid.
    pub fn new(config: HttpClientConfig, retry: RetryPolicy) -> Result<Self, AethonError> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout).user_agent(config.user_agent);
        if let Some(proxy_url) = config.proxy {
            let proxy = reqwest::Proxy::all(&proxy_url).map_err(|e| {
                AethonError::new(ErrorCode::ConfigInvalid, "invalid proxy URL")
                    .with_context("proxy", proxy_url.clone())
                    .with_context("reason", e.to_string())
            })?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| {
            AethonError::new(ErrorCode::ConfigInvalid, "failed to build HTTP client").with_context("reason", e.to_string())
        })?;
        Ok(Self { client, retry })
    }

    /// Issue a `GET` request against `url`, rate-limited by `limiter` and
    /// retried per the client's [`RetryPolicy`] on transient failures.
    /// Aborts immediately on cancellation; the cancellation error is
    /// surfaced unwrapped (spec §4.5).
    pub async fn get(
        &self,
        url: &str,
        limiter: &RateLimiter,
        cancellation: &CancellationToken,
    ) -> Result<Response, AethonError> {
        let mut attempt = 0u32;
        loop {
            if cancellation.is_cancelled() {
                return Err(AethonError::new(ErrorCode::ScanCanceled, "canceled before HTTP request").with_context("url", url));
            }
            if !limiter.wait(cancellation).await {
                return Err(AethonError::new(ErrorCode::ScanCanceled, "canceled while waiting for rate limit token").with_context("url", url));
            }

            let result = cancellation.race(self.client.get(url).send()).await;
            let outcome = match result {
                None => {
                    return Err(AethonError::new(ErrorCode::ScanCanceled, "canceled during HTTP request").with_context("url", url));
                }
                Some(Ok(response)) if !is_transient_status(response.status()) => return Ok(response),
                Some(Ok(response)) => Err(format!("transient HTTP status {}", response.status())),
                Some(Err(e)) => Err(e.to_string()),
            };

            if attempt >= self.retry.max_retries {
                let reason = outcome.unwrap_err();
                warn!(url, attempt, reason, "HTTP request exhausted retries");
                return Err(AethonError::new(ErrorCode::SourceRetriesExhausted, "HTTP request failed after retries")
                    .with_context("url", url)
                    .with_context("reason", reason));
            }

            let delay = self.retry.delay_for_attempt(attempt);
            debug!(url, attempt, delay_ms = delay.as_millis() as u64, "retrying HTTP request");
            if cancellation.race(tokio::time::sleep(delay)).await.is_none() {
                return Err(AethonError::new(ErrorCode::ScanCanceled, "canceled during HTTP retry backoff").with_context("url", url));
            }
            attempt += 1;
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Shareable handle; sources typically receive an `Arc<HttpClient>` built
/// once at engine init.
pub type SharedHttpClient = Arc<HttpClient>;
