// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the sync engine.
//!
//! Uses the `metrics` crate for backend-agnostic collection; the embedding
//! app chooses the exporter.
//!
//! # Metric Naming Convention
//! - `offline_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `kind`: payload kind tag ("performance", "scenario", ...)
//! - `trigger`: timer, reconnect, demand
//! - `reason` / `outcome`: skip and cache-read classifications

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a durably accepted enqueue
pub fn record_enqueued(kind: &str) {
    counter!(
        "offline_sync_enqueued_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a dispatch pass trigger firing
pub fn record_pass_trigger(trigger: &str) {
    counter!(
        "offline_sync_pass_triggers_total",
        "trigger" => trigger.to_string()
    )
    .increment(1);
}

/// Record a skipped pass (offline or busy)
pub fn record_pass_skipped(reason: &str) {
    counter!(
        "offline_sync_passes_skipped_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record items dispatched and removed from the queue
pub fn record_dispatched(kind: &str, count: usize) {
    counter!(
        "offline_sync_dispatched_total",
        "kind" => kind.to_string()
    )
    .increment(count as u64);
}

/// Record items whose batch failed (requeued or dead-lettered)
pub fn record_dispatch_failed(kind: &str, count: usize) {
    counter!(
        "offline_sync_dispatch_failed_total",
        "kind" => kind.to_string()
    )
    .increment(count as u64);
}

/// Record wall time of one dispatch pass
pub fn record_pass_duration(duration: Duration) {
    histogram!("offline_sync_pass_seconds").record(duration.as_secs_f64());
}

/// Record a cache-aside read outcome ("refresh", "fallback", "miss")
pub fn record_cache_read(outcome: &str) {
    counter!(
        "offline_sync_cache_reads_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Set current queue depth by status
pub fn set_queue_depth(pending: usize, in_flight: usize, dead_letter: usize) {
    gauge!("offline_sync_queue_pending").set(pending as f64);
    gauge!("offline_sync_queue_in_flight").set(in_flight as f64);
    gauge!("offline_sync_queue_dead_letter").set(dead_letter as f64);
}

/// Set current connectivity as seen by the gate
pub fn set_online(connected: bool) {
    gauge!("offline_sync_online").set(if connected { 1.0 } else { 0.0 });
}
