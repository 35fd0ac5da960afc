// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Materialized items.
//!
//! A [`Node`] is a story or a comment that has been fetched from the remote
//! source and written to the [`NodeStore`](crate::storage::traits::NodeStore).
//! Stories and comments share the remote id space, so `item_id` is unique
//! across both kinds.
//!
//! A comment's parent is polymorphic over {story, comment}. That relation is
//! the closed [`ParentRef`] rather than a dynamically typed pointer.
//!
//! # Example
//!
//! ```
//! use hn_sync_engine::{Kind, Node, ParentRef, RemoteItem};
//!
//! let item = RemoteItem {
//!     id: 8863,
//!     title: Some("My YC app: Dropbox".into()),
//!     score: Some(104),
//!     kids: vec![9224, 8917],
//!     ..Default::default()
//! };
//!
//! let story = Node::story_from_remote(&item);
//! assert_eq!(story.kind(), Kind::Story);
//! assert_eq!(story.as_parent(), ParentRef::story(8863));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::remote::RemoteItem;

/// The closed tag distinguishing stories from comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Story,
    Comment,
}

impl Kind {
    /// Lowercase name used in cache keys, SQL rows and links.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Story => "story",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "story" => Ok(Self::Story),
            "comment" => Ok(Self::Comment),
            other => Err(format!("unknown node kind '{}'", other)),
        }
    }
}

/// Reference to the record that owns a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub kind: Kind,
    pub id: u64,
}

impl ParentRef {
    #[must_use]
    pub fn new(kind: Kind, id: u64) -> Self {
        Self { kind, id }
    }

    #[must_use]
    pub fn story(id: u64) -> Self {
        Self::new(Kind::Story, id)
    }

    #[must_use]
    pub fn comment(id: u64) -> Self {
        Self::new(Kind::Comment, id)
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Kind-specific fields of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeBody {
    Story {
        title: String,
        url: Option<String>,
        score: i64,
        /// The remote's own subtree count. Advisory only: it need not match
        /// the number of locally materialized descendants.
        descendants: i64,
    },
    Comment {
        parent: ParentRef,
    },
}

/// A materialized story or comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub item_id: u64,
    pub by: Option<String>,
    pub text: Option<String>,
    pub body: NodeBody,
}

impl Node {
    /// Build a story from a remote item.
    ///
    /// Jobs and polls also appear in the top list; missing `title`, `score`
    /// and `descendants` fall back to empty/zero.
    #[must_use]
    pub fn story_from_remote(item: &RemoteItem) -> Self {
        Self {
            item_id: item.id,
            by: item.by.clone(),
            text: item.text.clone(),
            body: NodeBody::Story {
                title: item.title.clone().unwrap_or_default(),
                url: item.url.clone(),
                score: item.score.unwrap_or(0),
                descendants: item.descendants.unwrap_or(0),
            },
        }
    }

    /// Build a comment owned by an already resolved parent.
    #[must_use]
    pub fn comment_from_remote(item: &RemoteItem, parent: ParentRef) -> Self {
        Self {
            item_id: item.id,
            by: item.by.clone(),
            text: item.text.clone(),
            body: NodeBody::Comment { parent },
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        match self.body {
            NodeBody::Story { .. } => Kind::Story,
            NodeBody::Comment { .. } => Kind::Comment,
        }
    }

    /// This node seen as the parent of its own comments.
    #[must_use]
    pub fn as_parent(&self) -> ParentRef {
        ParentRef::new(self.kind(), self.item_id)
    }

    /// The owning record, for comments.
    #[must_use]
    pub fn parent(&self) -> Option<ParentRef> {
        match self.body {
            NodeBody::Comment { parent } => Some(parent),
            NodeBody::Story { .. } => None,
        }
    }
}
