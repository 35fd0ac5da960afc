//! Engine behaviour against a scripted in-process remote.
//!
//! No Docker, no network: the remote is [`common::MockRemote`], the store and
//! cache are the in-memory backends. Every test counts remote calls to check
//! the cache-aside guarantees.
//!
//! Run with: `cargo test --test engine`

mod common;

use std::sync::Arc;
use std::time::Duration;

use hn_sync_engine::{Kind, NodeBody, NodeStore, ParentRef, SyncEngineConfig, SyncError, TreeNode};

use common::{init_tracing, Harness, MockRemote};

fn ids(nodes: &[TreeNode]) -> Vec<u64> {
    nodes.iter().map(|n| n.id).collect()
}

/// story 1 ─┬─ 5 ─┬─ 6
///          │     └─ 7 ── 8
///          └─ 9
fn scenario_remote() -> Arc<MockRemote> {
    let remote = MockRemote::new();
    remote.add_story(1, &[5, 9]);
    remote.add_comment(5, 1, &[6, 7]);
    remote.add_comment(6, 5, &[]);
    remote.add_comment(7, 5, &[8]);
    remote.add_comment(8, 7, &[]);
    remote.add_comment(9, 1, &[]);
    remote
}

// =============================================================================
// Top stories
// =============================================================================

#[tokio::test]
async fn top_page_fetches_missing_stories_in_remote_order() {
    init_tracing();
    let remote = MockRemote::new();
    for id in [30, 10, 20] {
        remote.add_story(id, &[]);
    }
    remote.set_top_ids(&[30, 10, 20]);
    let h = Harness::new(remote.clone());
    h.seed_story(10).await;

    let page = h.engine.top_page(0, Some(2)).await.unwrap();

    assert_eq!(page.results.iter().map(|s| s.id).collect::<Vec<_>>(), vec![30, 10]);
    assert_eq!(page.count, 3);
    assert!(page.has_next);
    assert_eq!(page.results[0].title, "Story 30");
    assert_eq!(page.results[0].comments_link, "/comments/story/30");
    assert_eq!(remote.item_calls(30), 1);
    assert_eq!(remote.item_calls(10), 0, "stored story must not be fetched");
    assert_eq!(remote.item_calls(20), 0, "story outside the page must not be fetched");
    assert!(h.store.contains(30));
}

#[tokio::test]
async fn top_page_first_of_three() {
    let remote = MockRemote::new();
    for id in [10, 20, 30] {
        remote.add_story(id, &[]);
    }
    remote.set_top_ids(&[10, 20, 30]);
    let h = Harness::new(remote.clone());

    let page = h.engine.top_page(0, Some(2)).await.unwrap();

    assert_eq!(page.results.iter().map(|s| s.id).collect::<Vec<_>>(), vec![10, 20]);
    assert_eq!(page.count, 3);
    assert!(page.has_next);
    assert_eq!(page.next_page(), Some(1));
}

#[tokio::test]
async fn top_page_uses_configured_page_size() {
    let remote = MockRemote::new();
    let ids: Vec<u64> = (1..=25).collect();
    for id in &ids {
        remote.add_story(*id, &[]);
    }
    remote.set_top_ids(&ids);
    let h = Harness::new(remote.clone());

    let page = h.engine.top_page(0, None).await.unwrap();

    assert_eq!(page.results.len(), 20);
    assert!(page.has_next);
}

#[tokio::test]
async fn top_page_second_call_is_fully_local() {
    let remote = MockRemote::new();
    remote.add_story(1, &[]);
    remote.add_story(2, &[]);
    remote.set_top_ids(&[1, 2]);
    let h = Harness::new(remote.clone());

    let first = h.engine.top_page(0, Some(20)).await.unwrap();
    let calls = remote.total_item_calls();
    let second = h.engine.top_page(0, Some(20)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(remote.total_item_calls(), calls);
    assert_eq!(remote.top_calls(), 1);
}

#[tokio::test]
async fn top_page_past_the_end_is_empty() {
    let remote = MockRemote::new();
    remote.add_story(1, &[]);
    remote.set_top_ids(&[1]);
    let h = Harness::new(remote.clone());

    let page = h.engine.top_page(3, Some(20)).await.unwrap();

    assert!(page.results.is_empty());
    assert_eq!(page.count, 1);
    assert!(!page.has_next);
    assert_eq!(remote.total_item_calls(), 0);
}

#[tokio::test]
async fn top_page_rejects_zero_page_size() {
    let h = Harness::new(MockRemote::new());

    let err = h.engine.top_page(0, Some(0)).await.unwrap_err();

    assert!(matches!(err, SyncError::InvalidRequest(_)));
}

#[tokio::test]
async fn top_page_surfaces_remote_outage() {
    let remote = MockRemote::new();
    remote.set_down(true);
    let h = Harness::new(remote.clone());

    let err = h.engine.top_page(0, Some(20)).await.unwrap_err();

    assert!(matches!(err, SyncError::RemoteUnavailable(_)));
    assert!(err.is_transient());
    assert_eq!(h.cache.fresh_len().await, 0, "failed populate must not be cached");
}

#[tokio::test(start_paused = true)]
async fn top_ids_are_refetched_after_ttl() {
    let remote = MockRemote::new();
    remote.add_story(1, &[]);
    remote.set_top_ids(&[1]);
    let h = Harness::new(remote.clone());

    h.engine.top_page(0, Some(20)).await.unwrap();
    tokio::time::advance(Duration::from_secs(10)).await;
    h.engine.top_page(0, Some(20)).await.unwrap();
    assert_eq!(remote.top_calls(), 1);

    tokio::time::advance(Duration::from_secs(25)).await;
    h.engine.top_page(0, Some(20)).await.unwrap();
    assert_eq!(remote.top_calls(), 2);
}

#[tokio::test]
async fn concurrent_top_pages_populate_once() {
    let remote = MockRemote::new();
    remote.add_story(1, &[]);
    remote.set_top_ids(&[1]);
    remote.set_latency(Duration::from_millis(20));
    let h = Arc::new(Harness::new(remote.clone()));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let h = h.clone();
            tokio::spawn(async move { h.engine.top_page(0, Some(20)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(remote.top_calls(), 1);
    assert_eq!(h.store.len(), 1);
}

// =============================================================================
// Story detail
// =============================================================================

#[tokio::test]
async fn story_detail_requires_a_stored_story() {
    let remote = scenario_remote();
    let h = Harness::new(remote.clone());

    let err = h.engine.story_with_comments(1).await.unwrap_err();

    assert!(matches!(err, SyncError::NotFound { kind: Some(Kind::Story), id: 1 }));
    assert_eq!(remote.total_item_calls(), 0);
}

#[tokio::test]
async fn story_detail_fetches_only_missing_comments() {
    let remote = scenario_remote();
    remote.set_top_ids(&[1]);
    let h = Harness::new(remote.clone());
    h.engine.top_page(0, Some(20)).await.unwrap();
    h.seed_comment(5, ParentRef::story(1)).await;

    let detail = h.engine.story_with_comments(1).await.unwrap();

    assert_eq!(detail.story.id, 1);
    assert_eq!(detail.comments.iter().map(|c| c.id).collect::<Vec<_>>(), vec![5, 9]);
    assert_eq!(detail.comments[1].by.as_deref(), Some("user9"));
    assert_eq!(remote.item_calls(1), 1, "child list cached by top_page");
    assert_eq!(remote.item_calls(5), 0);
    assert_eq!(remote.item_calls(9), 1);

    let stored = h.store.get(Kind::Comment, 9).await.unwrap().unwrap();
    assert_eq!(stored.parent(), Some(ParentRef::story(1)));
}

#[tokio::test]
async fn story_detail_fully_local_makes_no_remote_calls() {
    let remote = MockRemote::new();
    remote.add_story(10, &[100, 101]);
    remote.add_comment(100, 10, &[]);
    remote.add_comment(101, 10, &[]);
    let h = Harness::new(remote.clone());
    h.seed_story(10).await;
    h.seed_comment(100, ParentRef::story(10)).await;
    h.seed_comment(101, ParentRef::story(10)).await;
    hn_sync_engine::IdListCache::set(
        h.cache.as_ref(),
        &hn_sync_engine::CacheKey::Children(ParentRef::story(10)),
        &[100, 101],
        Duration::from_secs(300),
    )
    .await
    .unwrap();

    let detail = h.engine.story_with_comments(10).await.unwrap();

    assert_eq!(detail.comments.iter().map(|c| c.id).collect::<Vec<_>>(), vec![100, 101]);
    assert_eq!(remote.total_item_calls(), 0);
}

#[tokio::test]
async fn story_detail_cold_then_warm_is_identical() {
    let remote = scenario_remote();
    let h = Harness::new(remote.clone());
    h.seed_story(1).await;

    let cold = h.engine.story_with_comments(1).await.unwrap();
    let calls = remote.total_item_calls();
    let comments = h.store.count(Kind::Comment).await.unwrap();
    let warm = h.engine.story_with_comments(1).await.unwrap();

    assert_eq!(cold, warm);
    assert_eq!(remote.total_item_calls(), calls);
    assert_eq!(h.store.count(Kind::Comment).await.unwrap(), comments);
}

#[tokio::test]
async fn story_detail_serializes_flat() {
    let remote = scenario_remote();
    let h = Harness::new(remote.clone());
    h.seed_story(1).await;

    let detail = h.engine.story_with_comments(1).await.unwrap();
    let json = serde_json::to_value(&detail).unwrap();

    assert_eq!(json["title"], "Story 1");
    assert_eq!(json["__comments__"], "/comments/story/1");
    assert_eq!(json["comments"].as_array().unwrap().len(), 2);
}

// =============================================================================
// Comment trees
// =============================================================================

#[tokio::test]
async fn tree_fetches_each_missing_node_exactly_once() {
    init_tracing();
    let remote = scenario_remote();
    let h = Harness::new(remote.clone());
    h.seed_story(1).await;
    h.seed_comment(5, ParentRef::story(1)).await;

    let page = h.engine.comment_tree(ParentRef::story(1), 0, Some(1), Some(1)).await.unwrap();

    assert_eq!(page.count, 2);
    assert!(page.has_next);
    assert_eq!(ids(&page.results), vec![5]);

    let root = &page.results[0];
    assert_eq!(root.more_link.as_deref(), Some("/comments/comment/5"));
    let children = root.children.as_ref().unwrap();
    assert_eq!(ids(children), vec![6, 7]);
    assert_eq!(children[0].children, None);
    assert_eq!(children[0].more_link, None);
    assert_eq!(children[1].children, None);
    assert_eq!(children[1].more_link.as_deref(), Some("/comments/comment/7"));

    assert_eq!(remote.item_calls(6), 1);
    assert_eq!(remote.item_calls(7), 1);
    assert_eq!(remote.item_calls(8), 0, "frontier children are never fetched");

    let seven = h.store.get(Kind::Comment, 7).await.unwrap().unwrap();
    assert_eq!(seven.parent(), Some(ParentRef::comment(5)));
}

#[tokio::test]
async fn tree_repeat_request_is_fully_local() {
    let remote = scenario_remote();
    let h = Harness::new(remote.clone());
    h.seed_story(1).await;

    let first = h.engine.comment_tree(ParentRef::story(1), 0, Some(20), Some(3)).await.unwrap();
    let calls = remote.total_item_calls();
    let second = h.engine.comment_tree(ParentRef::story(1), 0, Some(20), Some(3)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(remote.total_item_calls(), calls);
}

#[tokio::test]
async fn tree_expanded_leaf_has_empty_children() {
    let remote = scenario_remote();
    let h = Harness::new(remote.clone());
    h.seed_story(1).await;

    let page = h.engine.comment_tree(ParentRef::story(1), 0, Some(20), Some(2)).await.unwrap();

    assert_eq!(ids(&page.results), vec![5, 9]);
    let five = page.results[0].children.as_ref().unwrap();
    assert_eq!(five[0].children, Some(vec![]), "6 expanded with no replies");
    let eight = &five[1].children.as_ref().unwrap()[0];
    assert_eq!(eight.id, 8);
    assert_eq!(eight.children, None, "8 sits on the frontier");
    assert_eq!(page.results[1].children, Some(vec![]));
}

#[tokio::test]
async fn tree_depth_zero_only_lists_roots() {
    let remote = scenario_remote();
    let h = Harness::new(remote.clone());
    h.seed_story(1).await;

    let page = h.engine.comment_tree(ParentRef::story(1), 0, Some(20), Some(0)).await.unwrap();

    assert_eq!(ids(&page.results), vec![5, 9]);
    assert!(page.results.iter().all(|n| n.children.is_none()));
    assert_eq!(page.results[0].more_link.as_deref(), Some("/comments/comment/5"));
    assert_eq!(page.results[1].more_link, None);
    for grandchild in [6, 7, 8] {
        assert_eq!(remote.item_calls(grandchild), 0);
    }
}

#[tokio::test]
async fn tree_rejects_depth_past_max() {
    let remote = scenario_remote();
    let config = SyncEngineConfig { max_depth: 1, ..Default::default() };
    let h = Harness::with_config(remote.clone(), config);
    h.seed_story(1).await;

    let err = h.engine.comment_tree(ParentRef::story(1), 0, Some(20), Some(2)).await.unwrap_err();

    assert!(matches!(err, SyncError::InvalidRequest(_)));
    assert_eq!(remote.total_item_calls(), 0);

    let page = h.engine.comment_tree(ParentRef::story(1), 0, Some(20), Some(1)).await.unwrap();
    assert!(page.results[0].children.as_ref().unwrap().iter().all(|n| n.children.is_none()));
}

#[tokio::test]
async fn tree_expands_long_chain_to_full_requested_depth() {
    let remote = MockRemote::new();
    remote.add_story(1, &[100]);
    for id in 100..115 {
        let parent = if id == 100 { 1 } else { id - 1 };
        remote.add_comment(id, parent, &[id + 1]);
    }
    remote.add_comment(115, 114, &[]);
    let config = SyncEngineConfig { max_depth: 12, ..Default::default() };
    let h = Harness::with_config(remote.clone(), config);
    h.seed_story(1).await;

    let page = h.engine.comment_tree(ParentRef::story(1), 0, Some(20), Some(12)).await.unwrap();

    let mut node = &page.results[0];
    let mut level = 0;
    while let Some(children) = &node.children {
        node = &children[0];
        level += 1;
    }
    assert_eq!(level, 12);
    assert_eq!(node.id, 112);
    assert_eq!(node.more_link.as_deref(), Some("/comments/comment/112"));
}

#[tokio::test]
async fn tree_uses_default_depth() {
    let remote = scenario_remote();
    let config = SyncEngineConfig { default_depth: 1, ..Default::default() };
    let h = Harness::with_config(remote.clone(), config);
    h.seed_story(1).await;

    let page = h.engine.comment_tree(ParentRef::story(1), 0, Some(20), None).await.unwrap();

    assert!(page.results[0].children.as_ref().unwrap().iter().all(|n| n.children.is_none()));
}

#[tokio::test]
async fn tree_pages_over_root_comments() {
    let remote = MockRemote::new();
    remote.add_story(1, &[5, 6, 7]);
    for id in [5, 6, 7] {
        remote.add_comment(id, 1, &[]);
    }
    let h = Harness::new(remote.clone());
    h.seed_story(1).await;

    let page = h.engine.comment_tree(ParentRef::story(1), 1, Some(2), Some(1)).await.unwrap();

    assert_eq!(ids(&page.results), vec![7]);
    assert_eq!(page.count, 3);
    assert!(!page.has_next);
    assert_eq!(remote.item_calls(5), 0, "roots on other pages are untouched");
}

#[tokio::test]
async fn tree_rooted_at_a_comment() {
    let remote = scenario_remote();
    let h = Harness::new(remote.clone());
    h.seed_comment(5, ParentRef::story(1)).await;

    let page = h.engine.comment_tree(ParentRef::comment(5), 0, Some(20), Some(1)).await.unwrap();

    assert_eq!(ids(&page.results), vec![6, 7]);
    assert_eq!(page.results[1].children.as_ref().map(|c| ids(c)), Some(vec![8]));
}

#[tokio::test]
async fn tree_handles_children_with_smaller_ids() {
    let remote = MockRemote::new();
    remote.add_story(100, &[50]);
    remote.add_comment(50, 100, &[20, 30]);
    remote.add_comment(20, 50, &[10]);
    remote.add_comment(30, 50, &[]);
    remote.add_comment(10, 20, &[]);
    let h = Harness::new(remote.clone());
    h.seed_story(100).await;

    let page = h.engine.comment_tree(ParentRef::story(100), 0, Some(20), Some(3)).await.unwrap();

    let fifty = &page.results[0];
    let twenty = &fifty.children.as_ref().unwrap()[0];
    assert_eq!(twenty.id, 20);
    assert_eq!(ids(twenty.children.as_ref().unwrap()), vec![10]);

    let ten = h.store.get(Kind::Comment, 10).await.unwrap().unwrap();
    assert_eq!(ten.parent(), Some(ParentRef::comment(20)));
}

#[tokio::test]
async fn tree_unknown_parent_is_not_found() {
    let h = Harness::new(scenario_remote());

    let err = h.engine.comment_tree(ParentRef::story(404), 0, Some(20), None).await.unwrap_err();

    assert!(matches!(err, SyncError::NotFound { kind: Some(Kind::Story), id: 404 }));
}

#[tokio::test]
async fn tree_rejects_inconsistent_parent() {
    let remote = MockRemote::new();
    remote.add_story(1, &[5]);
    remote.add_comment(5, 1, &[6]);
    remote.add_comment(6, 999, &[]);
    let h = Harness::new(remote.clone());
    h.seed_story(1).await;

    let err = h.engine.comment_tree(ParentRef::story(1), 0, Some(20), Some(1)).await.unwrap_err();

    assert!(matches!(err, SyncError::InconsistentParent { id: 6, parent_id: Some(999) }));
    assert!(!h.store.contains(6), "rejected comment must not be stored");
}

#[tokio::test]
async fn tree_aborts_on_first_fetch_failure() {
    let remote = scenario_remote();
    remote.fail_item(7);
    let h = Harness::new(remote.clone());
    h.seed_story(1).await;

    let err = h.engine.comment_tree(ParentRef::story(1), 0, Some(20), Some(2)).await.unwrap_err();

    assert!(matches!(err, SyncError::RemoteUnavailable(_)));
    assert!(!h.store.contains(8));
}

#[tokio::test]
async fn tree_missing_remote_item_is_not_found() {
    let remote = MockRemote::new();
    remote.add_story(1, &[5]);
    let h = Harness::new(remote.clone());
    h.seed_story(1).await;

    let err = h.engine.comment_tree(ParentRef::story(1), 0, Some(20), Some(1)).await.unwrap_err();

    assert!(matches!(err, SyncError::NotFound { kind: None, id: 5 }));
}

#[tokio::test]
async fn concurrent_trees_leave_one_record_per_comment() {
    let remote = scenario_remote();
    remote.set_latency(Duration::from_millis(5));
    let h = Arc::new(Harness::new(remote.clone()));
    h.seed_story(1).await;

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let h = h.clone();
            tokio::spawn(async move { h.engine.comment_tree(ParentRef::story(1), 0, Some(20), Some(3)).await })
        })
        .collect();
    let mut pages = Vec::new();
    for task in tasks {
        pages.push(task.await.unwrap().unwrap());
    }

    assert!(pages.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(h.store.count(Kind::Comment).await.unwrap(), 5);
    assert_eq!(remote.item_calls(1), 1, "root list populated once");
}

#[tokio::test]
async fn stored_story_fields_follow_remote() {
    let remote = MockRemote::new();
    remote.add_story(42, &[1, 2, 3]);
    remote.set_top_ids(&[42]);
    let h = Harness::new(remote.clone());

    h.engine.top_page(0, Some(20)).await.unwrap();

    let story = h.store.get(Kind::Story, 42).await.unwrap().unwrap();
    match story.body {
        NodeBody::Story { title, score, descendants, .. } => {
            assert_eq!(title, "Story 42");
            assert_eq!(score, 42);
            assert_eq!(descendants, 3);
        }
        NodeBody::Comment { .. } => panic!("expected a story"),
    }
}
