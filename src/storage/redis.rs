// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis id-list cache.
//!
//! Each list is a JSON array stored under `{prefix}{cache_key}` with a
//! Redis-side expiry:
//!
//! ```text
//! SET hn:story-comment-ids::8863 "[9224,8917,8952]" EX 300
//! ```
//!
//! Population is single-flight per key inside one process (a per-key async
//! mutex guards GET → populate → SET). Two processes racing on the same key
//! may both populate; the later SET wins, which is harmless for id lists.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::{cmd, AsyncCommands, Client};
use tokio::sync::Mutex;
use tracing::debug;

use super::traits::{CacheKey, IdListCache, Populate, StorageError};
use crate::error::SyncError;
use crate::resilience::retry::{retry, RetryConfig};

pub struct RedisIdListCache {
    connection: ConnectionManager,
    /// Optional key prefix for namespacing (e.g., "hn:")
    prefix: String,
    inflight: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl RedisIdListCache {
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        Self::with_prefix(connection_string, None).await
    }

    pub async fn with_prefix(connection_string: &str, prefix: Option<&str>) -> Result<Self, StorageError> {
        let client = Client::open(connection_string)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let connection = retry("redis_connect", &RetryConfig::startup(), || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))?;

        Ok(Self {
            connection,
            prefix: prefix.unwrap_or("").to_string(),
            inflight: DashMap::new(),
        })
    }

    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn redis_key(&self, key: &CacheKey) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u64>>, StorageError> {
        let redis_key = self.redis_key(key);

        let raw: Option<String> = retry("redis_get", &RetryConfig::query(), || {
            let mut conn = self.connection.clone();
            let redis_key = redis_key.clone();
            async move { conn.get(&redis_key).await }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))?;

        raw.map(|json| {
            serde_json::from_str::<Vec<u64>>(&json)
                .map_err(|e| StorageError::Serialization(format!("{}: {}", redis_key, e)))
        })
        .transpose()
    }

    async fn write(&self, key: &CacheKey, ids: &[u64], ttl: Duration) -> Result<(), StorageError> {
        let redis_key = self.redis_key(key);
        let payload = serde_json::to_string(ids)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let ttl_secs = ttl.as_secs().max(1);

        retry("redis_set", &RetryConfig::query(), || {
            let mut conn = self.connection.clone();
            let redis_key = redis_key.clone();
            let payload = payload.clone();
            async move {
                let _: () = cmd("SET")
                    .arg(&redis_key)
                    .arg(&payload)
                    .arg("EX")
                    .arg(ttl_secs)
                    .query_async(&mut conn)
                    .await?;
                Ok(())
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))?;

        crate::metrics::record_cache_set();
        Ok(())
    }

    /// Keys with a populate slot in the map.
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    fn release_slot(&self, key: &CacheKey) {
        // Only the map holds the slot once every waiter is done with it.
        self.inflight.remove_if(key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

/// A caller's claim on a key's populate slot.
///
/// Releases the slot on drop, so a request abandoned at any await point
/// does not leave its key behind in `inflight`.
struct InflightSlot<'a> {
    cache: &'a RedisIdListCache,
    key: &'a CacheKey,
    slot: Option<Arc<Mutex<()>>>,
}

impl<'a> InflightSlot<'a> {
    fn claim(cache: &'a RedisIdListCache, key: &'a CacheKey) -> Self {
        let slot = cache.inflight.entry(*key).or_default().clone();
        Self {
            cache,
            key,
            slot: Some(slot),
        }
    }

    fn mutex(&self) -> Arc<Mutex<()>> {
        self.slot.clone().unwrap_or_default()
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        self.slot.take();
        self.cache.release_slot(self.key);
    }
}

#[async_trait]
impl IdListCache for RedisIdListCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u64>>, StorageError> {
        self.read(key).await
    }

    async fn set(&self, key: &CacheKey, ids: &[u64], ttl: Duration) -> Result<(), StorageError> {
        self.write(key, ids, ttl).await
    }

    async fn get_or_populate<'a>(
        &'a self,
        key: &'a CacheKey,
        ttl: Duration,
        populate: Populate<'a>,
    ) -> Result<Vec<u64>, SyncError> {
        let claim = InflightSlot::claim(self, key);
        let _held = claim.mutex().lock_owned().await;

        match self.read(key).await? {
            Some(ids) => {
                crate::metrics::record_cache_lookup("hit");
                Ok(ids)
            }
            None => {
                crate::metrics::record_cache_lookup("miss");
                debug!(key = %key, "Id list cache miss, populating");
                let ids = populate.await?;
                self.write(key, &ids, ttl).await?;
                Ok(ids)
            }
        }
    }
}
