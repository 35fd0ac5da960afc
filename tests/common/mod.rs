//! Shared fixtures: a scriptable in-process remote and engine builders.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;

use hn_sync_engine::{
    InMemoryIdListCache, InMemoryNodeStore, Node, ParentRef, RemoteError, RemoteItem,
    RemoteSource, SyncEngine, SyncEngineConfig,
};

/// Remote source backed by a map, counting every call.
#[derive(Default)]
pub struct MockRemote {
    items: DashMap<u64, RemoteItem>,
    top_ids: RwLock<Vec<u64>>,
    item_calls: DashMap<u64, usize>,
    top_calls: AtomicUsize,
    failing: DashSet<u64>,
    down: AtomicBool,
    latency: RwLock<Option<Duration>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_story(&self, id: u64, kids: &[u64]) {
        self.items.insert(
            id,
            RemoteItem {
                id,
                kind: Some("story".into()),
                by: Some(format!("author{}", id)),
                title: Some(format!("Story {}", id)),
                url: Some(format!("https://example.com/{}", id)),
                score: Some(id as i64),
                descendants: Some(kids.len() as i64),
                kids: kids.to_vec(),
                ..Default::default()
            },
        );
    }

    pub fn add_comment(&self, id: u64, parent: u64, kids: &[u64]) {
        self.items.insert(
            id,
            RemoteItem {
                id,
                kind: Some("comment".into()),
                by: Some(format!("user{}", id)),
                text: Some(format!("comment {}", id)),
                parent: Some(parent),
                kids: kids.to_vec(),
                ..Default::default()
            },
        );
    }

    pub fn item(&self, id: u64) -> Option<RemoteItem> {
        self.items.get(&id).map(|i| i.clone())
    }

    pub fn set_top_ids(&self, ids: &[u64]) {
        *self.top_ids.write() = ids.to_vec();
    }

    /// Make fetches of `id` fail as unavailable.
    pub fn fail_item(&self, id: u64) {
        self.failing.insert(id);
    }

    /// Make every call fail as unavailable.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = Some(latency);
    }

    pub fn item_calls(&self, id: u64) -> usize {
        self.item_calls.get(&id).map_or(0, |c| *c)
    }

    pub fn total_item_calls(&self) -> usize {
        self.item_calls.iter().map(|c| *c.value()).sum()
    }

    pub fn top_calls(&self) -> usize {
        self.top_calls.load(Ordering::SeqCst)
    }

    async fn simulate_network(&self) -> Result<(), RemoteError> {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSource for MockRemote {
    async fn fetch_item(&self, id: u64) -> Result<RemoteItem, RemoteError> {
        *self.item_calls.entry(id).or_insert(0) += 1;
        self.simulate_network().await?;
        if self.failing.contains(&id) {
            return Err(RemoteError::Unavailable(format!("item {} timed out", id)));
        }
        self.item(id).ok_or(RemoteError::NotFound(id))
    }

    async fn fetch_top_ids(&self) -> Result<Vec<u64>, RemoteError> {
        self.top_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;
        Ok(self.top_ids.read().clone())
    }
}

pub struct Harness {
    pub engine: SyncEngine,
    pub remote: Arc<MockRemote>,
    pub store: Arc<InMemoryNodeStore>,
    pub cache: Arc<InMemoryIdListCache>,
}

impl Harness {
    pub fn new(remote: Arc<MockRemote>) -> Self {
        Self::with_config(remote, SyncEngineConfig::default())
    }

    pub fn with_config(remote: Arc<MockRemote>, config: SyncEngineConfig) -> Self {
        let store = Arc::new(InMemoryNodeStore::new());
        let cache = Arc::new(InMemoryIdListCache::new());
        let engine = SyncEngine::new(config, remote.clone(), cache.clone(), store.clone());
        Self {
            engine,
            remote,
            store,
            cache,
        }
    }

    /// Copy a remote story into the store without touching the remote counters.
    pub async fn seed_story(&self, id: u64) {
        let item = self.remote.item(id).expect("story in mock remote");
        hn_sync_engine::NodeStore::upsert(self.store.as_ref(), &Node::story_from_remote(&item))
            .await
            .unwrap();
    }

    pub async fn seed_comment(&self, id: u64, parent: ParentRef) {
        let item = self.remote.item(id).expect("comment in mock remote");
        hn_sync_engine::NodeStore::upsert(self.store.as_ref(), &Node::comment_from_remote(&item, parent))
            .await
            .unwrap();
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hn_sync_engine=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
