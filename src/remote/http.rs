// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP source for the Hacker News Firebase API.
//!
//! Endpoints:
//! - `{base}/topstories.json` → `[u64]`
//! - `{base}/item/{id}.json` → item object, or `null` if the id does not exist
//!
//! Each request gets a per-request timeout, transient failures are retried
//! with [`RetryConfig::remote()`], and all calls share one circuit breaker.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{RemoteError, RemoteItem, RemoteSource};
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitError};
use crate::resilience::retry::{retry, RetryConfig};

pub struct HttpRemoteSource {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
    circuit: CircuitBreaker,
}

impl HttpRemoteSource {
    pub const DEFAULT_BASE_URL: &'static str = "https://hacker-news.firebaseio.com/v0";

    /// Create a source for `base_url` (no trailing slash needed).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryConfig::remote(),
            circuit: CircuitBreaker::new("remote", CircuitConfig::remote()),
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_circuit(mut self, config: CircuitConfig) -> Self {
        self.circuit = CircuitBreaker::new("remote", config);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn item_url(&self, id: u64) -> String {
        format!("{}/item/{}.json", self.base_url, id)
    }

    fn top_ids_url(&self) -> String {
        format!("{}/topstories.json", self.base_url)
    }

    /// One GET. `Ok(None)` means the body was JSON `null`.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, RemoteError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Unavailable(format!("GET {} returned {}", url, status)));
        }

        response
            .json::<Option<T>>()
            .await
            .map_err(|e| RemoteError::Unavailable(format!("GET {} returned invalid JSON: {}", url, e)))
    }

    async fn fetch<T: DeserializeOwned>(&self, target: &'static str, url: String) -> Result<Option<T>, RemoteError> {
        let start = Instant::now();

        let result = self
            .circuit
            .call(|| retry(target, &self.retry, || self.get_json::<T>(&url)))
            .await
            .map_err(|e| match e {
                CircuitError::Rejected => RemoteError::Unavailable("remote circuit open".to_string()),
                CircuitError::Inner(inner) => inner,
            });

        crate::metrics::record_remote_latency(target, start.elapsed());
        match &result {
            Ok(Some(_)) => crate::metrics::record_remote_fetch(target, "ok"),
            Ok(None) => crate::metrics::record_remote_fetch(target, "not_found"),
            Err(e) => {
                warn!(url = %url, error = %e, "Remote fetch failed");
                crate::metrics::record_remote_fetch(target, "error");
            }
        }
        result
    }
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn fetch_item(&self, id: u64) -> Result<RemoteItem, RemoteError> {
        debug!(id, "Fetching remote item");
        self.fetch::<RemoteItem>("item", self.item_url(id))
            .await?
            .ok_or(RemoteError::NotFound(id))
    }

    async fn fetch_top_ids(&self) -> Result<Vec<u64>, RemoteError> {
        debug!("Fetching top story ids");
        // A null list is an upstream fault, never "no stories".
        self.fetch::<Vec<u64>>("top_ids", self.top_ids_url())
            .await?
            .ok_or_else(|| RemoteError::Unavailable("top story list was null".to_string()))
    }
}
