// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote hierarchical source.
//!
//! The engine only needs two reads from upstream: one item by id, and the
//! ordered top-level id list. Retry and timeout policy belong to the
//! implementation, never to the engine.

mod http;

pub use http::HttpRemoteSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("{0}")]
    Unavailable(String),
    #[error("remote item {0} does not exist")]
    NotFound(u64),
}

/// An item as the remote API reports it.
///
/// Only `id` is guaranteed; everything else depends on the item type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: u64,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub descendants: Option<i64>,
    #[serde(default)]
    pub parent: Option<u64>,
    /// Direct children in remote order.
    #[serde(default)]
    pub kids: Vec<u64>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub dead: bool,
}

#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch_item(&self, id: u64) -> Result<RemoteItem, RemoteError>;
    async fn fetch_top_ids(&self) -> Result<Vec<u64>, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_story_payload() {
        let json = r#"{
            "by": "dhouston", "descendants": 71, "id": 8863,
            "kids": [9224, 8917, 8952], "score": 104, "time": 1175714200,
            "title": "My YC app: Dropbox - Throw away your USB drive",
            "type": "story", "url": "http://www.getdropbox.com/u/2/screencast.html"
        }"#;

        let item: RemoteItem = serde_json::from_str(json).unwrap();

        assert_eq!(item.id, 8863);
        assert_eq!(item.kind.as_deref(), Some("story"));
        assert_eq!(item.kids, vec![9224, 8917, 8952]);
        assert_eq!(item.descendants, Some(71));
        assert_eq!(item.parent, None);
    }

    #[test]
    fn test_parses_comment_without_kids() {
        let json = r#"{"by": "norvig", "id": 2921983, "parent": 2921506,
            "text": "Aw shucks", "time": 1314211127, "type": "comment"}"#;

        let item: RemoteItem = serde_json::from_str(json).unwrap();

        assert_eq!(item.parent, Some(2921506));
        assert!(item.kids.is_empty());
        assert!(!item.deleted);
    }

    #[test]
    fn test_null_body_is_absent_item() {
        let item: Option<RemoteItem> = serde_json::from_str("null").unwrap();
        assert!(item.is_none());
    }
}
