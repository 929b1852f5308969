// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for read-sync-engine.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `read_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `trigger`: threshold, ceiling, manual
//! - `outcome`: success, error, empty
//! - `decision`: insert, overwrite, keep_local

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Set current in-memory queue depth
pub fn set_queue_depth(depth: usize) {
    gauge!("read_sync_queue_depth").set(depth as f64);
}

/// Record a queue flush attempt
pub fn record_flush(trigger: &str, outcome: &str, items: usize) {
    counter!(
        "read_sync_flushes_total",
        "trigger" => trigger.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("read_sync_flush_batch_size", "trigger" => trigger.to_string())
        .record(items as f64);
}

/// Record records written to the remote store
pub fn record_items_uploaded(source: &str, count: usize) {
    counter!("read_sync_items_uploaded_total", "source" => source.to_string())
        .increment(count as u64);
}

/// Record records pulled from the remote store
pub fn record_items_downloaded(count: usize) {
    counter!("read_sync_items_downloaded_total").increment(count as u64);
}

/// Record one conflict-resolution decision
pub fn record_merge_decisions(decision: &str, count: usize) {
    counter!("read_sync_merge_decisions_total", "decision" => decision.to_string())
        .increment(count as u64);
}

/// Record a full coordinator round
pub fn record_sync_round(outcome: &str, duration: Duration) {
    counter!("read_sync_rounds_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("read_sync_round_seconds", "outcome" => outcome.to_string())
        .record(duration.as_secs_f64());
}

/// Record a retry of a named operation
pub fn record_retry(operation: &str) {
    counter!("read_sync_retries_total", "operation" => operation.to_string()).increment(1);
}

/// Record rows removed by retention cleanup
pub fn record_cleanup(local_deleted: u64, remote_deleted: u64) {
    counter!("read_sync_cleanup_deleted_total", "store" => "local").increment(local_deleted);
    counter!("read_sync_cleanup_deleted_total", "store" => "remote").increment(remote_deleted);
}

/// Set number of local rows still waiting for upload
pub fn set_pending_rows(count: u64) {
    gauge!("read_sync_pending_rows").set(count as f64);
}
