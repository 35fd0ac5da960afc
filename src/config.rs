// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the sync engine.
//!
//! # Example
//!
//! ```
//! use hn_sync_engine::SyncEngineConfig;
//!
//! // Defaults: public HN API, in-memory store and cache
//! let config = SyncEngineConfig::default();
//! assert_eq!(config.top_ids_ttl_secs, 30);
//! assert_eq!(config.default_depth, 3);
//!
//! // Persistent backends
//! let config = SyncEngineConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     sql_url: Some("sqlite:hn.db?mode=rwc".into()),
//!     fetch_concurrency: 8,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::Deserialize;

/// All fields have defaults, so a partial TOML/JSON document deserializes.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncEngineConfig {
    /// Base URL of the remote API.
    #[serde(default = "default_remote_base_url")]
    pub remote_base_url: String,

    /// Per-request timeout for remote fetches.
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    /// Redis connection string for the id-list cache. In-memory when absent.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Key prefix for the Redis cache (e.g. "hn:").
    #[serde(default)]
    pub redis_prefix: Option<String>,

    /// SQL connection string for the node store ("sqlite:..." or
    /// "mysql://..."). In-memory when absent.
    #[serde(default)]
    pub sql_url: Option<String>,

    /// Lifetime of the cached top story list.
    #[serde(default = "default_top_ids_ttl_secs")]
    pub top_ids_ttl_secs: u64,

    /// Lifetime of cached child-id lists.
    #[serde(default = "default_child_ids_ttl_secs")]
    pub child_ids_ttl_secs: u64,

    /// Page size used when the caller does not pass one.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Expansion depth used when the caller does not pass one.
    #[serde(default = "default_depth")]
    pub default_depth: usize,

    /// Deepest expansion a caller may request.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Concurrent remote fetches / cache lookups within one breadth level.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Prefix of the "more comments" links, rendered as `{prefix}/{kind}/{id}`.
    #[serde(default = "default_link_prefix")]
    pub link_prefix: String,
}

fn default_remote_base_url() -> String { crate::remote::HttpRemoteSource::DEFAULT_BASE_URL.to_string() }
fn default_remote_timeout_ms() -> u64 { 10_000 }
fn default_top_ids_ttl_secs() -> u64 { 30 }
fn default_child_ids_ttl_secs() -> u64 { 300 }
fn default_page_size() -> usize { 20 }
fn default_depth() -> usize { 3 }
fn default_max_depth() -> usize { 10 }
fn default_fetch_concurrency() -> usize { 16 }
fn default_link_prefix() -> String { "/comments".to_string() }

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            remote_base_url: default_remote_base_url(),
            remote_timeout_ms: default_remote_timeout_ms(),
            redis_url: None,
            redis_prefix: None,
            sql_url: None,
            top_ids_ttl_secs: default_top_ids_ttl_secs(),
            child_ids_ttl_secs: default_child_ids_ttl_secs(),
            page_size: default_page_size(),
            default_depth: default_depth(),
            max_depth: default_max_depth(),
            fetch_concurrency: default_fetch_concurrency(),
            link_prefix: default_link_prefix(),
        }
    }
}

impl SyncEngineConfig {
    #[must_use]
    pub fn top_ids_ttl(&self) -> Duration {
        Duration::from_secs(self.top_ids_ttl_secs)
    }

    #[must_use]
    pub fn child_ids_ttl(&self) -> Duration {
        Duration::from_secs(self.child_ids_ttl_secs)
    }

    #[must_use]
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    /// Fan-out width, never zero.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.fetch_concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: SyncEngineConfig =
            serde_json::from_str(r#"{"sql_url": "sqlite::memory:", "max_depth": 4}"#).unwrap();

        assert_eq!(config.sql_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.child_ids_ttl(), Duration::from_secs(300));
        assert_eq!(config.remote_base_url, "https://hacker-news.firebaseio.com/v0");
        assert_eq!(config.link_prefix, "/comments");
    }

    #[test]
    fn test_concurrency_is_never_zero() {
        let config = SyncEngineConfig { fetch_concurrency: 0, ..Default::default() };
        assert_eq!(config.concurrency(), 1);
    }
}
