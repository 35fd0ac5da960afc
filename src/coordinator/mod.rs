// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync engine coordinator.
//!
//! The [`SyncEngine`] ties the collaborators together:
//! - [`RemoteSource`]: the upstream item API (authoritative, slow)
//! - [`IdListCache`]: short-lived child-id lists and the top story list
//! - [`NodeStore`]: durable story and comment records
//!
//! Every read goes cache-aside: local first, remote for what is missing,
//! then write back so the next request is local.
//!
//! # Operations
//!
//! ```text
//! top_page             topstories list → page slice → stories (fetch missing)
//! story_with_comments  story (stored) → child ids → direct comments (fetch missing)
//! comment_tree         parent → root ids → BFS expansion → materialize → assemble
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use hn_sync_engine::{SyncEngine, SyncEngineConfig, ParentRef};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), hn_sync_engine::SyncError> {
//! let engine = SyncEngine::connect(SyncEngineConfig::default()).await?;
//!
//! let top = engine.top_page(0, None).await?;
//! if let Some(story) = top.results.first() {
//!     let detail = engine.story_with_comments(story.id).await?;
//!     let tree = engine.comment_tree(ParentRef::story(detail.story.id), 0, None, Some(3)).await?;
//!     println!("{} root comments", tree.count);
//! }
//! # Ok(())
//! # }
//! ```

mod fetch;
mod story_api;
mod top_stories;
mod tree_api;
mod types;

pub use types::{CommentView, Page, StoryDetail, StoryView};

use std::sync::Arc;

use tracing::info;

use crate::config::SyncEngineConfig;
use crate::error::SyncError;
use crate::remote::{HttpRemoteSource, RemoteSource};
use crate::storage::memory::{InMemoryIdListCache, InMemoryNodeStore};
use crate::storage::redis::RedisIdListCache;
use crate::storage::sql::SqlNodeStore;
use crate::storage::traits::{IdListCache, NodeStore};
use crate::tree::LinkBuilder;

/// Main sync engine coordinator.
///
/// Holds no per-request state: every operation builds its own working set,
/// so one engine is shared freely across tasks.
pub struct SyncEngine {
    pub(super) config: SyncEngineConfig,
    pub(super) remote: Arc<dyn RemoteSource>,
    pub(super) cache: Arc<dyn IdListCache>,
    pub(super) store: Arc<dyn NodeStore>,
    pub(super) links: LinkBuilder,
}

impl SyncEngine {
    /// Build an engine over explicit collaborators.
    pub fn new(
        config: SyncEngineConfig,
        remote: Arc<dyn RemoteSource>,
        cache: Arc<dyn IdListCache>,
        store: Arc<dyn NodeStore>,
    ) -> Self {
        let links = LinkBuilder::new(config.link_prefix.clone());
        Self {
            config,
            remote,
            cache,
            store,
            links,
        }
    }

    /// Build an engine from configuration alone.
    ///
    /// Connects the HTTP remote, then Redis and SQL when their URLs are set.
    /// Absent URLs fall back to the in-memory backends.
    #[tracing::instrument(skip(config), fields(has_redis = config.redis_url.is_some(), has_sql = config.sql_url.is_some()))]
    pub async fn connect(config: SyncEngineConfig) -> Result<Self, SyncError> {
        let remote = HttpRemoteSource::new(&config.remote_base_url, config.remote_timeout())?;
        info!(base_url = %remote.base_url(), "Remote source configured");

        let cache: Arc<dyn IdListCache> = match &config.redis_url {
            Some(url) => {
                let cache = RedisIdListCache::with_prefix(url, config.redis_prefix.as_deref()).await?;
                info!(prefix = %cache.prefix(), "Redis id-list cache connected");
                Arc::new(cache)
            }
            None => {
                info!("No redis_url configured, using in-memory id-list cache");
                Arc::new(InMemoryIdListCache::new())
            }
        };

        let store: Arc<dyn NodeStore> = match &config.sql_url {
            Some(url) => Arc::new(SqlNodeStore::new(url).await?),
            None => {
                info!("No sql_url configured, using in-memory node store");
                Arc::new(InMemoryNodeStore::new())
            }
        };

        Ok(Self::new(config, Arc::new(remote), cache, store))
    }

    #[must_use]
    pub fn config(&self) -> &SyncEngineConfig {
        &self.config
    }

    #[must_use]
    pub fn links(&self) -> &LinkBuilder {
        &self.links
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<dyn IdListCache> {
        &self.cache
    }

    /// Requested page size, or the configured one. Zero is rejected.
    fn page_size(&self, requested: Option<usize>) -> Result<usize, SyncError> {
        match requested.unwrap_or(self.config.page_size) {
            0 => Err(SyncError::InvalidRequest("page_size must be positive".to_string())),
            size => Ok(size),
        }
    }
}

/// Metric label for an operation result.
fn outcome<T>(result: &Result<T, SyncError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(SyncError::NotFound { .. }) => "not_found",
        Err(SyncError::InvalidRequest(_)) => "invalid",
        Err(SyncError::InconsistentParent { .. }) => "inconsistent",
        Err(SyncError::RemoteUnavailable(_)) => "unavailable",
        Err(SyncError::Storage(_)) => "error",
    }
}
