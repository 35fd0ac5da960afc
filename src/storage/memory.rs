// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory backends.
//!
//! Used when no SQL or Redis URL is configured, and throughout the tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::traits::{CacheKey, IdListCache, NodeStore, Populate, StorageError};
use crate::error::SyncError;
use crate::node::{Kind, Node};

pub struct InMemoryNodeStore {
    nodes: DashMap<u64, Node>,
}

impl InMemoryNodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: DashMap::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.nodes.contains_key(&id)
    }
}

impl Default for InMemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeStore for InMemoryNodeStore {
    async fn bulk_get(&self, kind: Kind, ids: &[u64]) -> Result<HashMap<u64, Node>, StorageError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| node.kind() == kind)
            .map(|node| (node.item_id, node.value().clone()))
            .collect())
    }

    async fn upsert(&self, node: &Node) -> Result<(), StorageError> {
        self.nodes.insert(node.item_id, node.clone());
        Ok(())
    }

    async fn count(&self, kind: Kind) -> Result<u64, StorageError> {
        Ok(self.nodes.iter().filter(|n| n.kind() == kind).count() as u64)
    }
}

#[derive(Debug, Clone)]
struct CachedIds {
    ids: Vec<u64>,
    expires_at: Instant,
}

impl CachedIds {
    fn fresh(&self) -> Option<&Vec<u64>> {
        (Instant::now() < self.expires_at).then_some(&self.ids)
    }
}

type Slot = Arc<Mutex<Option<CachedIds>>>;

/// Minimum spacing between full sweeps of expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Id-list cache with per-key expiry.
///
/// Every key owns an async mutex slot. `get_or_populate` holds the slot
/// while populating, so concurrent callers for the same key wait for the
/// first one instead of issuing their own remote fetch.
///
/// Expired slots are dropped as the cache is used: a read that finds its
/// entry expired evicts it, and any call sweeps the whole map once
/// `SWEEP_INTERVAL` has passed since the last sweep.
pub struct InMemoryIdListCache {
    slots: DashMap<CacheKey, Slot>,
    next_sweep: SyncMutex<Instant>,
}

impl InMemoryIdListCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            next_sweep: SyncMutex::new(Instant::now() + SWEEP_INTERVAL),
        }
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        self.slots.entry(*key).or_default().clone()
    }

    /// Number of keys held, fresh or not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of keys with a fresh entry.
    pub async fn fresh_len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.iter().map(|s| s.value().clone()).collect();
        let mut fresh = 0;
        for slot in slots {
            if slot.lock().await.as_ref().and_then(CachedIds::fresh).is_some() {
                fresh += 1;
            }
        }
        fresh
    }

    /// Drop expired or empty entries whose slot nobody is holding.
    pub fn purge_expired(&self) {
        let before = self.slots.len();
        self.slots.retain(|_, slot| !is_stale(slot));
        let purged = before.saturating_sub(self.slots.len());
        if purged > 0 {
            debug!(purged, remaining = self.slots.len(), "Purged expired id lists");
        }
    }

    fn maybe_sweep(&self) {
        let now = Instant::now();
        let due = {
            let mut next = self.next_sweep.lock();
            if now >= *next {
                *next = now + SWEEP_INTERVAL;
                true
            } else {
                false
            }
        };
        if due {
            self.purge_expired();
        }
    }
}

/// A slot only the map references, holding nothing fresh.
///
/// Called under the shard lock, so the reference count cannot grow
/// while it is checked.
fn is_stale(slot: &Slot) -> bool {
    if Arc::strong_count(slot) > 1 {
        return false;
    }
    match slot.try_lock() {
        Ok(entry) => entry.as_ref().and_then(CachedIds::fresh).is_none(),
        Err(_) => false,
    }
}

impl Default for InMemoryIdListCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdListCache for InMemoryIdListCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u64>>, StorageError> {
        self.maybe_sweep();
        let Some(slot) = self.slots.get(key).map(|s| s.value().clone()) else {
            return Ok(None);
        };

        let ids = slot.lock().await.as_ref().and_then(CachedIds::fresh).cloned();
        if ids.is_none() {
            drop(slot);
            self.slots.remove_if(key, |_, slot| is_stale(slot));
        }
        Ok(ids)
    }

    async fn set(&self, key: &CacheKey, ids: &[u64], ttl: Duration) -> Result<(), StorageError> {
        self.maybe_sweep();
        let slot = self.slot(key);
        let mut entry = slot.lock().await;
        *entry = Some(CachedIds {
            ids: ids.to_vec(),
            expires_at: Instant::now() + ttl,
        });
        crate::metrics::record_cache_set();
        Ok(())
    }

    async fn get_or_populate<'a>(
        &'a self,
        key: &'a CacheKey,
        ttl: Duration,
        populate: Populate<'a>,
    ) -> Result<Vec<u64>, SyncError> {
        self.maybe_sweep();
        let slot = self.slot(key);
        let mut entry = slot.lock().await;

        if let Some(ids) = entry.as_ref().and_then(CachedIds::fresh) {
            crate::metrics::record_cache_lookup("hit");
            return Ok(ids.clone());
        }

        crate::metrics::record_cache_lookup("miss");
        debug!(key = %key, "Id list cache miss, populating");
        let ids = populate.await?;
        *entry = Some(CachedIds {
            ids: ids.clone(),
            expires_at: Instant::now() + ttl,
        });
        crate::metrics::record_cache_set();
        Ok(ids)
    }
}
