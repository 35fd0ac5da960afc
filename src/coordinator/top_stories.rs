// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Top stories page.

use futures::FutureExt;
use tracing::{debug, Span};

use crate::error::SyncError;
use crate::metrics::LatencyTimer;
use crate::node::{Kind, Node};
use crate::storage::traits::CacheKey;

use super::types::{page_bounds, Page, StoryView};
use super::{outcome, SyncEngine};

impl SyncEngine {
    /// One page of the remote's top story list.
    ///
    /// The id list is cached for `top_ids_ttl_secs`. Stories already stored
    /// are served locally; the rest are fetched concurrently and upserted.
    /// Results keep the remote list order. Page indices are 0-based; a page
    /// past the end is empty with `has_next == false`. `page_size` defaults to
    /// the configured one.
    ///
    /// ```rust,no_run
    /// # use hn_sync_engine::SyncEngine;
    /// # async fn example(engine: &SyncEngine) -> Result<(), hn_sync_engine::SyncError> {
    /// let page = engine.top_page(0, Some(20)).await?;
    /// for story in &page.results {
    ///     println!("{} ({} points) {}", story.title, story.score, story.comments_link);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self), fields(count, fetched))]
    pub async fn top_page(&self, page: usize, page_size: Option<usize>) -> Result<Page<StoryView>, SyncError> {
        let _timer = LatencyTimer::new("top_page");
        let result = self.top_page_inner(page, page_size).await;
        crate::metrics::record_operation("top_page", outcome(&result));
        result
    }

    async fn top_page_inner(&self, page: usize, page_size: Option<usize>) -> Result<Page<StoryView>, SyncError> {
        let page_size = self.page_size(page_size)?;

        let remote = &self.remote;
        let populate = async move { Ok::<_, SyncError>(remote.fetch_top_ids().await?) }.boxed();
        let top_ids = self
            .cache
            .get_or_populate(&CacheKey::TopStories, self.config.top_ids_ttl(), populate)
            .await?;

        let count = top_ids.len();
        let (start, end) = page_bounds(count, page, page_size);
        let page_ids = &top_ids[start..end];

        let (mut stories, missing) = self.lookup(Kind::Story, page_ids).await?;
        Span::current().record("count", count);
        Span::current().record("fetched", missing.len());

        if !missing.is_empty() {
            debug!(missing = missing.len(), "Fetching stories absent from the store");
            let fetched = self
                .materialize_all(missing, |item| Ok(Node::story_from_remote(item)))
                .await?;
            stories.extend(fetched.into_iter().map(|node| (node.item_id, node)));
        }

        let results = page_ids
            .iter()
            .filter_map(|id| stories.get(id))
            .filter_map(|node| StoryView::from_node(node, &self.links))
            .collect();

        Ok(Page {
            page,
            count,
            has_next: end < count,
            results,
        })
    }
}
