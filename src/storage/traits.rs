// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Collaborator contracts consumed by the engine.
//!
//! - [`NodeStore`]: durable node records, atomic upsert on `item_id`
//! - [`IdListCache`]: short-lived child-id lists with single-flight population
//! - [`ParentResolver`]: `(kind, id)` → concrete parent record

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::error::SyncError;
use crate::node::{Kind, Node, ParentRef};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Key of one cached id list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The remote's top story list.
    TopStories,
    /// Direct children of a story or comment.
    Children(ParentRef),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopStories => f.write_str("topstories"),
            Self::Children(parent) => write!(f, "{}-comment-ids::{}", parent.kind, parent.id),
        }
    }
}

/// Lazily evaluated computation of an id list on cache miss.
///
/// It is only polled when the cache has no fresh entry for the key.
pub type Populate<'a> = BoxFuture<'a, Result<Vec<u64>, SyncError>>;

#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Look up many ids of one kind. Missing ids are simply absent.
    async fn bulk_get(&self, kind: Kind, ids: &[u64]) -> Result<HashMap<u64, Node>, StorageError>;

    /// Insert or replace the record for `node.item_id`.
    ///
    /// Must be atomic on the unique id: concurrent upserts of the same id
    /// leave exactly one record (last write wins).
    async fn upsert(&self, node: &Node) -> Result<(), StorageError>;

    async fn count(&self, kind: Kind) -> Result<u64, StorageError>;

    async fn get(&self, kind: Kind, id: u64) -> Result<Option<Node>, StorageError> {
        Ok(self.bulk_get(kind, &[id]).await?.remove(&id))
    }
}

#[async_trait]
pub trait IdListCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u64>>, StorageError>;

    /// Overwrite the list for `key`.
    async fn set(&self, key: &CacheKey, ids: &[u64], ttl: Duration) -> Result<(), StorageError>;

    /// Return the fresh list for `key`, or run `populate`, store its result
    /// with `ttl` and return it.
    ///
    /// Concurrent callers for the same key must not run `populate` more than
    /// once per TTL window. A failed populate stores nothing.
    async fn get_or_populate<'a>(
        &'a self,
        key: &'a CacheKey,
        ttl: Duration,
        populate: Populate<'a>,
    ) -> Result<Vec<u64>, SyncError>;
}

#[async_trait]
pub trait ParentResolver: Send + Sync {
    async fn resolve(&self, parent: ParentRef) -> Result<Node, SyncError>;
}

#[async_trait]
impl<S> ParentResolver for S
where
    S: NodeStore + ?Sized,
{
    async fn resolve(&self, parent: ParentRef) -> Result<Node, SyncError> {
        self.get(parent.kind, parent.id)
            .await?
            .ok_or_else(|| SyncError::not_found(parent.kind, parent.id))
    }
}
