// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Comment tree assembly.
//!
//! Pure: no network, cache or store access. Input is the set of resolved
//! nodes plus a [`ChildIndex`] describing which ids were expanded and which
//! child-id lists are known. Output is the nested [`TreeNode`] shape:
//!
//! ```text
//! children == null   node was at (or beyond) the expansion frontier
//! children == []     node was expanded and has no children
//! __comments__       set iff the node's cached child-id list is non-empty
//! ```
//!
//! Construction is iterative with an explicit work stack, so caller-chosen
//! depths cannot overflow the call stack.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::node::{Node, ParentRef};

/// Builds the "more comments" links handed to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBuilder {
    prefix: String,
}

impl LinkBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// `{prefix}/{kind}/{id}`, e.g. `/comments/comment/9224`.
    #[must_use]
    pub fn comments(&self, parent: ParentRef) -> String {
        format!("{}/{}/{}", self.prefix, parent.kind, parent.id)
    }
}

impl Default for LinkBuilder {
    fn default() -> Self {
        Self::new("/comments")
    }
}

/// One assembled comment. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: u64,
    pub by: Option<String>,
    pub text: Option<String>,
    /// Link to this node's own comment listing; `None` if it has no children.
    #[serde(rename = "__comments__")]
    pub more_link: Option<String>,
    /// `None` when not expanded, `Some(vec![])` for an expanded leaf.
    pub children: Option<Vec<TreeNode>>,
}

/// Child-id lists gathered during breadth-first expansion.
#[derive(Debug, Clone, Default)]
pub struct ChildIndex {
    lists: HashMap<u64, Vec<u64>>,
    expanded: HashSet<u64>,
}

impl ChildIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the children of a node whose subtree is expanded.
    pub fn insert_expanded(&mut self, id: u64, child_ids: Vec<u64>) {
        self.expanded.insert(id);
        self.lists.insert(id, child_ids);
    }

    /// Record the children of a frontier node (known, not expanded).
    pub fn insert_frontier(&mut self, id: u64, child_ids: Vec<u64>) {
        self.lists.insert(id, child_ids);
    }

    #[must_use]
    pub fn children(&self, id: u64) -> Option<&[u64]> {
        self.lists.get(&id).map(Vec::as_slice)
    }

    #[must_use]
    pub fn is_expanded(&self, id: u64) -> bool {
        self.expanded.contains(&id)
    }

    #[must_use]
    pub fn has_children(&self, id: u64) -> bool {
        self.children(id).is_some_and(|ids| !ids.is_empty())
    }
}

pub struct TreeAssembler<'a> {
    nodes: &'a HashMap<u64, Node>,
    index: &'a ChildIndex,
    links: &'a LinkBuilder,
}

enum Step {
    Open(u64),
    Close { id: u64, children: Option<usize> },
}

impl<'a> TreeAssembler<'a> {
    pub fn new(nodes: &'a HashMap<u64, Node>, index: &'a ChildIndex, links: &'a LinkBuilder) -> Self {
        Self { nodes, index, links }
    }

    /// Assemble the trees rooted at `root_ids`, in that order.
    ///
    /// Ids without a resolved node are skipped. Each id is emitted at most
    /// once, which also guards against cyclic input.
    #[must_use]
    pub fn assemble(&self, root_ids: &[u64]) -> Vec<TreeNode> {
        let mut seen: HashSet<u64> = HashSet::new();
        let mut work: Vec<Step> = Vec::new();
        let mut built: Vec<TreeNode> = Vec::new();

        let roots = self.claim(root_ids, &mut seen);
        work.extend(roots.into_iter().rev().map(Step::Open));

        while let Some(step) = work.pop() {
            match step {
                Step::Open(id) => {
                    let children = if self.index.is_expanded(id) {
                        Some(self.claim(self.index.children(id).unwrap_or_default(), &mut seen))
                    } else {
                        None
                    };

                    work.push(Step::Close {
                        id,
                        children: children.as_ref().map(Vec::len),
                    });
                    if let Some(children) = children {
                        work.extend(children.into_iter().rev().map(Step::Open));
                    }
                }
                Step::Close { id, children } => {
                    // Every child pushed exactly one node onto `built` before
                    // its parent closes, in order.
                    let children = children.map(|n| built.split_off(built.len() - n));
                    built.push(self.tree_node(id, children));
                }
            }
        }

        built
    }

    /// Ids that have a node and were not emitted yet, in input order.
    fn claim(&self, ids: &[u64], seen: &mut HashSet<u64>) -> Vec<u64> {
        ids.iter()
            .copied()
            .filter(|id| self.nodes.contains_key(id) && seen.insert(*id))
            .collect()
    }

    fn tree_node(&self, id: u64, children: Option<Vec<TreeNode>>) -> TreeNode {
        let node = &self.nodes[&id];
        let more_link = self
            .index
            .has_children(id)
            .then(|| self.links.comments(node.as_parent()));

        TreeNode {
            id,
            by: node.by.clone(),
            text: node.text.clone(),
            more_link,
            children,
        }
    }
}
