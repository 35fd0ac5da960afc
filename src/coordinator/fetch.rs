// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Shared cache-aside plumbing for the engine operations.
//!
//! - [`SyncEngine::child_ids`]: cached child list, populated from the remote item
//! - [`SyncEngine::materialize`]: fetch one item, cache its kids, upsert it
//! - [`FetchMemo`]: items a populate already fetched during this request,
//!   so materializing them does not fetch a second time

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use futures::{stream, FutureExt, StreamExt, TryStreamExt};
use tracing::debug;

use crate::error::SyncError;
use crate::node::{Kind, Node, ParentRef};
use crate::remote::RemoteItem;
use crate::storage::traits::CacheKey;

use super::SyncEngine;

/// Request-scoped store of remote items fetched by cache populates.
#[derive(Debug, Default)]
pub(super) struct FetchMemo {
    items: DashMap<u64, RemoteItem>,
}

impl FetchMemo {
    pub(super) fn insert(&self, item: RemoteItem) {
        self.items.insert(item.id, item);
    }

    pub(super) fn take(&self, id: u64) -> Option<RemoteItem> {
        self.items.remove(&id).map(|(_, item)| item)
    }
}

impl SyncEngine {
    /// Child-id list of `parent`, from the cache or the remote item's `kids`.
    pub(super) async fn child_ids(&self, parent: ParentRef, memo: Option<&FetchMemo>) -> Result<Vec<u64>, SyncError> {
        let key = CacheKey::Children(parent);
        let remote = &self.remote;

        let populate = async move {
            let item = remote.fetch_item(parent.id).await?;
            let kids = item.kids.clone();
            if let Some(memo) = memo {
                memo.insert(item);
            }
            Ok::<_, SyncError>(kids)
        }
        .boxed();

        self.cache
            .get_or_populate(&key, self.config.child_ids_ttl(), populate)
            .await
    }

    /// Child-id lists for many comments, in input order.
    pub(super) async fn comment_child_lists(
        &self,
        ids: &[u64],
        memo: &FetchMemo,
    ) -> Result<Vec<(u64, Vec<u64>)>, SyncError> {
        stream::iter(ids.iter().copied())
            .map(|id| async move {
                let kids = self.child_ids(ParentRef::comment(id), Some(memo)).await?;
                Ok::<_, SyncError>((id, kids))
            })
            .buffered(self.config.concurrency())
            .try_collect()
            .await
    }

    /// One remote item, reusing a memoized copy when there is one.
    ///
    /// The flag is true when the item was fetched by this call.
    async fn fetch_item(&self, id: u64, memo: Option<&FetchMemo>) -> Result<(RemoteItem, bool), SyncError> {
        if let Some(item) = memo.and_then(|m| m.take(id)) {
            return Ok((item, false));
        }
        let item = self.remote.fetch_item(id).await?;
        Ok((item, true))
    }

    /// Fetch `id`, cache its child list and upsert the node built by `build`.
    ///
    /// `build` sees the remote item and decides the node's shape (and, for
    /// comments, its parent); an error from it aborts before anything is written.
    pub(super) async fn materialize<F>(&self, id: u64, memo: Option<&FetchMemo>, build: F) -> Result<Node, SyncError>
    where
        F: FnOnce(&RemoteItem) -> Result<Node, SyncError>,
    {
        let (item, fresh) = self.fetch_item(id, memo).await?;
        let node = build(&item)?;

        if fresh {
            self.cache
                .set(&CacheKey::Children(node.as_parent()), &item.kids, self.config.child_ids_ttl())
                .await?;
        }
        self.store.upsert(&node).await?;
        crate::metrics::record_store_upsert(node.kind().as_str());
        debug!(id, kind = %node.kind(), fresh, "Materialized node");

        Ok(node)
    }

    /// Stored nodes of `kind` for `ids`, plus the ids still missing (deduplicated,
    /// first-seen order).
    pub(super) async fn lookup(&self, kind: Kind, ids: &[u64]) -> Result<(HashMap<u64, Node>, Vec<u64>), SyncError> {
        let stored = self.store.bulk_get(kind, ids).await?;
        crate::metrics::record_store_lookup(kind.as_str(), ids.len(), stored.len());

        let missing = first_seen(ids)
            .into_iter()
            .filter(|id| !stored.contains_key(id))
            .collect();
        Ok((stored, missing))
    }

    /// Fetch and upsert every missing node with the same parent.
    ///
    /// Runs up to `fetch_concurrency` at a time and stops at the first error;
    /// nodes upserted before the failure stay upserted.
    pub(super) async fn materialize_all<F>(&self, missing: Vec<u64>, build: F) -> Result<Vec<Node>, SyncError>
    where
        F: Fn(&RemoteItem) -> Result<Node, SyncError> + Copy,
    {
        stream::iter(missing)
            .map(|id| self.materialize(id, None, build))
            .buffered(self.config.concurrency())
            .try_collect()
            .await
    }
}

/// `ids` without repeats, keeping the first occurrence.
pub(super) fn first_seen(ids: &[u64]) -> Vec<u64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
