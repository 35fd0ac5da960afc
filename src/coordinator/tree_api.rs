// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Paginated, depth-bounded comment trees.
//!
//! # Flow
//!
//! ```text
//! 1. resolve parent (store only)          → NotFound if absent
//! 2. root child-id list (cache-aside)     → page slice = roots
//! 3. BFS expansion, `depth` levels        → ChildIndex + level lists
//! 4. materialize missing ids level by level (declared parent must be resolved)
//! 5. child-id lists of the frontier       → "more comments" links only
//! 6. TreeAssembler                        → nested TreeNode list
//! ```
//!
//! Ids are resolved in strict level order, so a comment's parent is always
//! resolved before the comment, whatever the id ordering.

use std::collections::{HashMap, HashSet};

use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, warn, Span};

use crate::error::SyncError;
use crate::metrics::LatencyTimer;
use crate::node::{Kind, Node, ParentRef};
use crate::remote::RemoteItem;
use crate::storage::traits::ParentResolver;
use crate::tree::{ChildIndex, TreeAssembler, TreeNode};

use super::fetch::{first_seen, FetchMemo};
use super::types::{page_bounds, Page};
use super::{outcome, SyncEngine};

impl SyncEngine {
    /// Page `page` of the comments under `parent`, each expanded `depth`
    /// levels (default `default_depth`). A depth above `max_depth` is
    /// rejected. `page_size` defaults to the configured one.
    ///
    /// Nodes above the frontier carry `children` (empty for leaves); frontier
    /// nodes carry `children == None` and a `__comments__` link when they have
    /// children of their own. `count` is the number of root comments.
    ///
    /// Each missing comment is fetched from the remote at most once per call.
    /// Any failure aborts the whole tree.
    ///
    /// ```rust,no_run
    /// # use hn_sync_engine::{SyncEngine, ParentRef};
    /// # async fn example(engine: &SyncEngine) -> Result<(), hn_sync_engine::SyncError> {
    /// let tree = engine.comment_tree(ParentRef::story(8863), 0, None, Some(2)).await?;
    /// for root in &tree.results {
    ///     println!("{} replies", root.children.as_ref().map_or(0, Vec::len));
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self), fields(parent = %parent, depth, roots, fetched))]
    pub async fn comment_tree(
        &self,
        parent: ParentRef,
        page: usize,
        page_size: Option<usize>,
        depth: Option<usize>,
    ) -> Result<Page<TreeNode>, SyncError> {
        let _timer = LatencyTimer::new("comment_tree");
        let result = self.comment_tree_inner(parent, page, page_size, depth).await;
        crate::metrics::record_operation("comment_tree", outcome(&result));
        result
    }

    async fn comment_tree_inner(
        &self,
        parent: ParentRef,
        page: usize,
        page_size: Option<usize>,
        depth: Option<usize>,
    ) -> Result<Page<TreeNode>, SyncError> {
        let page_size = self.page_size(page_size)?;
        let depth = self.depth(depth)?;
        Span::current().record("depth", depth);

        let parent_node = self.store.as_ref().resolve(parent).await?;
        let memo = FetchMemo::default();

        let all_roots = first_seen(&self.child_ids(parent, Some(&memo)).await?);
        let count = all_roots.len();
        let (start, end) = page_bounds(count, page, page_size);
        let roots = all_roots[start..end].to_vec();
        Span::current().record("roots", roots.len());

        let mut index = ChildIndex::new();
        let levels = self.expand(&roots, depth, &mut index, &memo).await?;

        let all_ids: Vec<u64> = levels.iter().flatten().copied().collect();
        let (mut resolved, _) = self.lookup(Kind::Comment, &all_ids).await?;

        let mut fetched = 0;
        for level in &levels {
            let missing: Vec<u64> = level
                .iter()
                .copied()
                .filter(|id| !resolved.contains_key(id))
                .collect();
            if missing.is_empty() {
                continue;
            }

            let nodes: Vec<Node> = stream::iter(missing)
                .map(|id| {
                    let resolved = &resolved;
                    let parent_node = &parent_node;
                    self.materialize(id, Some(&memo), move |item| {
                        declared_parent(item, parent_node, resolved)
                            .map(|parent| Node::comment_from_remote(item, parent))
                    })
                })
                .buffered(self.config.concurrency())
                .try_collect()
                .await?;

            fetched += nodes.len();
            resolved.extend(nodes.into_iter().map(|node| (node.item_id, node)));
        }
        Span::current().record("fetched", fetched);
        crate::metrics::record_tree_fetches(fetched);

        // The last level was never expanded; its lists only feed the links.
        if let Some(frontier) = levels.get(depth) {
            for (id, kids) in self.comment_child_lists(frontier, &memo).await? {
                index.insert_frontier(id, kids);
            }
        }

        let results = TreeAssembler::new(&resolved, &index, &self.links).assemble(&roots);
        debug!(roots = roots.len(), fetched, "Comment tree assembled");

        Ok(Page {
            page,
            count,
            has_next: end < count,
            results,
        })
    }

    /// Requested depth, or the configured default. Past `max_depth` is rejected.
    fn depth(&self, requested: Option<usize>) -> Result<usize, SyncError> {
        match requested.unwrap_or(self.config.default_depth) {
            depth if depth > self.config.max_depth => Err(SyncError::InvalidRequest(format!(
                "depth {} exceeds max_depth {}",
                depth, self.config.max_depth
            ))),
            depth => Ok(depth),
        }
    }

    /// Breadth-first expansion from `roots`.
    ///
    /// Returns the id lists level by level: `levels[0]` is `roots`, and when
    /// expansion ran the full `depth` levels, `levels[depth]` is the frontier.
    /// An id already seen at a shallower level is not repeated.
    async fn expand(
        &self,
        roots: &[u64],
        depth: usize,
        index: &mut ChildIndex,
        memo: &FetchMemo,
    ) -> Result<Vec<Vec<u64>>, SyncError> {
        let mut seen: HashSet<u64> = roots.iter().copied().collect();
        let mut levels = vec![roots.to_vec()];

        for _ in 0..depth {
            let Some(current) = levels.last().filter(|level| !level.is_empty()) else {
                break;
            };

            let lists = self.comment_child_lists(current, memo).await?;
            let mut next = Vec::new();
            for (id, kids) in lists {
                next.extend(kids.iter().copied().filter(|kid| seen.insert(*kid)));
                index.insert_expanded(id, kids);
            }
            levels.push(next);
        }

        Ok(levels)
    }
}

/// Parent of a freshly fetched comment, checked against what is resolved.
fn declared_parent(
    item: &RemoteItem,
    parent_node: &Node,
    resolved: &HashMap<u64, Node>,
) -> Result<ParentRef, SyncError> {
    let parent = match item.parent {
        Some(id) if id == parent_node.item_id => Some(parent_node.as_parent()),
        Some(id) => resolved.get(&id).map(Node::as_parent),
        None => None,
    };

    parent.ok_or_else(|| {
        warn!(id = item.id, parent_id = ?item.parent, "Comment parent not resolved");
        crate::metrics::record_inconsistent_parent();
        SyncError::InconsistentParent {
            id: item.id,
            parent_id: item.parent,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeBody;

    fn story(id: u64) -> Node {
        Node {
            item_id: id,
            by: None,
            text: None,
            body: NodeBody::Story {
                title: String::new(),
                url: None,
                score: 0,
                descendants: 0,
            },
        }
    }

    #[test]
    fn test_declared_parent_resolution() {
        let root = story(1);
        let mut resolved = HashMap::new();
        resolved.insert(
            5,
            Node::comment_from_remote(&RemoteItem { id: 5, ..Default::default() }, ParentRef::story(1)),
        );

        let top_level = RemoteItem { id: 5, parent: Some(1), ..Default::default() };
        assert_eq!(declared_parent(&top_level, &root, &resolved).unwrap(), ParentRef::story(1));

        let reply = RemoteItem { id: 6, parent: Some(5), ..Default::default() };
        assert_eq!(declared_parent(&reply, &root, &resolved).unwrap(), ParentRef::comment(5));

        let orphan = RemoteItem { id: 7, parent: Some(99), ..Default::default() };
        assert!(matches!(
            declared_parent(&orphan, &root, &resolved),
            Err(SyncError::InconsistentParent { id: 7, parent_id: Some(99) })
        ));

        let no_parent = RemoteItem { id: 8, ..Default::default() };
        assert!(matches!(
            declared_parent(&no_parent, &root, &resolved),
            Err(SyncError::InconsistentParent { id: 8, parent_id: None })
        ));
    }
}
