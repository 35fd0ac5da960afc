//! # HN Sync Engine
//!
//! A cache-aside sync engine that mirrors Hacker News stories and comment
//! trees into a local store and serves them from there.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SyncEngine                          │
//! │  • top_page / story_with_comments / comment_tree            │
//! │  • Request-scoped working set, no shared mutable state      │
//! └─────────────────────────────────────────────────────────────┘
//!            │                    │                     │
//!            ▼                    ▼                     ▼
//! ┌───────────────────┐ ┌───────────────────┐ ┌───────────────────┐
//! │    IdListCache    │ │     NodeStore     │ │   RemoteSource    │
//! │  topstories and   │ │  stories and      │ │  HN item API      │
//! │  child-id lists   │ │  comments, upsert │ │  retry + circuit  │
//! │  TTL, single-     │ │  on item_id       │ │  breaker          │
//! │  flight populate  │ │                   │ │                   │
//! │  (memory / Redis) │ │  (memory / SQL)   │ │  (reqwest)        │
//! └───────────────────┘ └───────────────────┘ └───────────────────┘
//! ```
//!
//! Reads go local first. Whatever is missing is fetched from the remote,
//! written back, and served, so the next identical request is local.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hn_sync_engine::{ParentRef, SyncEngine, SyncEngineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hn_sync_engine::SyncError> {
//!     let config = SyncEngineConfig {
//!         redis_url: Some("redis://localhost:6379".into()),
//!         sql_url: Some("sqlite:hn.db?mode=rwc".into()),
//!         ..Default::default()
//!     };
//!     let engine = SyncEngine::connect(config).await?;
//!
//!     let top = engine.top_page(0, None).await?;
//!     for story in &top.results {
//!         println!("{} {}", story.id, story.title);
//!     }
//!
//!     let tree = engine.comment_tree(ParentRef::story(8863), 0, None, Some(3)).await?;
//!     println!("{}", serde_json::to_string_pretty(&tree.results).unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`SyncEngine`] and its result types
//! - [`tree`]: Pure comment tree assembly
//! - [`storage`]: Node stores and id-list caches (memory, Redis, SQL)
//! - [`remote`]: The remote item source
//! - [`resilience`]: Retry and circuit breaking for remote calls
//! - [`metrics`]: `metrics` facade instrumentation

pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod node;
pub mod remote;
pub mod resilience;
pub mod storage;
pub mod tree;

pub use config::SyncEngineConfig;
pub use coordinator::{CommentView, Page, StoryDetail, StoryView, SyncEngine};
pub use error::SyncError;
pub use metrics::LatencyTimer;
pub use node::{Kind, Node, NodeBody, ParentRef};
pub use remote::{HttpRemoteSource, RemoteError, RemoteItem, RemoteSource};
pub use resilience::circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitError};
pub use resilience::retry::RetryConfig;
pub use storage::memory::{InMemoryIdListCache, InMemoryNodeStore};
pub use storage::redis::RedisIdListCache;
pub use storage::sql::SqlNodeStore;
pub use storage::traits::{CacheKey, IdListCache, NodeStore, ParentResolver, Populate, StorageError};
pub use tree::{ChildIndex, LinkBuilder, TreeAssembler, TreeNode};
