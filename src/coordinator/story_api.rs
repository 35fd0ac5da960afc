// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Story detail with its direct comments.

use tracing::{debug, Span};

use crate::error::SyncError;
use crate::metrics::LatencyTimer;
use crate::node::{Kind, Node};

use super::fetch::first_seen;
use super::types::{CommentView, StoryDetail, StoryView};
use super::{outcome, SyncEngine};

impl SyncEngine {
    /// A stored story plus its direct comments in remote order.
    ///
    /// The story itself must already be stored (it got there through
    /// [`SyncEngine::top_page`]); a story absent locally is `NotFound` and is
    /// not fetched. Missing comments are fetched and upserted with the story
    /// as their parent.
    #[tracing::instrument(skip(self), fields(comments, fetched))]
    pub async fn story_with_comments(&self, story_id: u64) -> Result<StoryDetail, SyncError> {
        let _timer = LatencyTimer::new("story_detail");
        let result = self.story_with_comments_inner(story_id).await;
        crate::metrics::record_operation("story_detail", outcome(&result));
        result
    }

    async fn story_with_comments_inner(&self, story_id: u64) -> Result<StoryDetail, SyncError> {
        let story = self
            .store
            .get(Kind::Story, story_id)
            .await?
            .ok_or_else(|| SyncError::not_found(Kind::Story, story_id))?;
        let parent = story.as_parent();

        let comment_ids = first_seen(&self.child_ids(parent, None).await?);
        let (mut comments, missing) = self.lookup(Kind::Comment, &comment_ids).await?;
        Span::current().record("comments", comment_ids.len());
        Span::current().record("fetched", missing.len());

        if !missing.is_empty() {
            debug!(story_id, missing = missing.len(), "Fetching comments absent from the store");
            let fetched = self
                .materialize_all(missing, |item| Ok(Node::comment_from_remote(item, parent)))
                .await?;
            comments.extend(fetched.into_iter().map(|node| (node.item_id, node)));
        }

        let story = StoryView::from_node(&story, &self.links)
            .ok_or_else(|| SyncError::not_found(Kind::Story, story_id))?;
        let comments = comment_ids
            .iter()
            .filter_map(|id| comments.get(id))
            .map(CommentView::from)
            .collect();

        Ok(StoryDetail { story, comments })
    }
}
