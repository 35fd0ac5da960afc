// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation.
//!
//! Uses the `metrics` facade; the embedding application picks the exporter.
//!
//! # Naming
//! - `hn_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `target`: item, top_ids
//! - `outcome`: ok, not_found, error, hit, miss
//! - `kind`: story, comment
//! - `operation`: top_page, story_detail, comment_tree

use std::time::{Duration, Instant};

use metrics::{counter, histogram};

/// Record one remote fetch.
pub fn record_remote_fetch(target: &str, outcome: &str) {
    counter!(
        "hn_sync_remote_fetches_total",
        "target" => target.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_remote_latency(target: &str, duration: Duration) {
    histogram!(
        "hn_sync_remote_fetch_seconds",
        "target" => target.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record an id-list cache lookup (`hit` or `miss`).
pub fn record_cache_lookup(outcome: &str) {
    counter!(
        "hn_sync_id_cache_lookups_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_cache_set() {
    counter!("hn_sync_id_cache_sets_total").increment(1);
}

/// Record a bulk store lookup: how many ids were asked for and how many hit.
pub fn record_store_lookup(kind: &str, requested: usize, found: usize) {
    counter!("hn_sync_store_lookup_ids_total", "kind" => kind.to_string())
        .increment(requested as u64);
    counter!("hn_sync_store_lookup_hits_total", "kind" => kind.to_string())
        .increment(found as u64);
}

pub fn record_store_upsert(kind: &str) {
    counter!("hn_sync_store_upserts_total", "kind" => kind.to_string()).increment(1);
}

/// Record the outcome of a top-level engine operation.
pub fn record_operation(operation: &str, outcome: &str) {
    counter!(
        "hn_sync_operations_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_operation_latency(operation: &str, duration: Duration) {
    histogram!(
        "hn_sync_operation_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record how many nodes a tree request had to fetch from remote.
pub fn record_tree_fetches(count: usize) {
    histogram!("hn_sync_tree_remote_fetches").record(count as f64);
}

pub fn record_inconsistent_parent() {
    counter!("hn_sync_inconsistent_parents_total").increment(1);
}

pub fn record_circuit_call(circuit: &str, outcome: &str) {
    counter!(
        "hn_sync_circuit_breaker_calls_total",
        "circuit" => circuit.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Records operation latency when dropped.
///
/// ```
/// use hn_sync_engine::LatencyTimer;
///
/// {
///     let _timer = LatencyTimer::new("comment_tree");
///     // ... work ...
/// } // latency recorded here
/// ```
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_operation_latency(self.operation, self.start.elapsed());
    }
}
