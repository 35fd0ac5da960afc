// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public result types of the engine operations.
//!
//! These serialize to the JSON shape the HTTP layer returns verbatim.

use serde::Serialize;

use crate::node::{Node, NodeBody};
use crate::tree::LinkBuilder;

/// One page of an ordered id list.
///
/// `count` is the length of the full remote list, not the number of locally
/// stored records. `has_next` is true when the page ends before the list does.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub page: usize,
    pub count: usize,
    pub has_next: bool,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Index of the next page, if there is one.
    #[must_use]
    pub fn next_page(&self) -> Option<usize> {
        self.has_next.then_some(self.page + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryView {
    pub id: u64,
    pub title: String,
    pub by: Option<String>,
    pub descendants: i64,
    pub score: i64,
    pub text: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "__comments__")]
    pub comments_link: String,
}

impl StoryView {
    /// `None` if `node` is not a story.
    #[must_use]
    pub fn from_node(node: &Node, links: &LinkBuilder) -> Option<Self> {
        match &node.body {
            NodeBody::Story { title, url, score, descendants } => Some(Self {
                id: node.item_id,
                title: title.clone(),
                by: node.by.clone(),
                descendants: *descendants,
                score: *score,
                text: node.text.clone(),
                url: url.clone(),
                comments_link: links.comments(node.as_parent()),
            }),
            NodeBody::Comment { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    pub id: u64,
    pub text: Option<String>,
    pub by: Option<String>,
}

impl From<&Node> for CommentView {
    fn from(node: &Node) -> Self {
        Self {
            id: node.item_id,
            text: node.text.clone(),
            by: node.by.clone(),
        }
    }
}

/// A story with its direct comments, in remote order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryDetail {
    #[serde(flatten)]
    pub story: StoryView,
    pub comments: Vec<CommentView>,
}

/// `[start, end)` of page `page` within a list of `len` ids, clamped.
pub(crate) fn page_bounds(len: usize, page: usize, page_size: usize) -> (usize, usize) {
    let start = page.saturating_mul(page_size).min(len);
    let end = start.saturating_add(page_size).min(len);
    (start, end)
}
