// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Dispatch executor: the single-flight sync pass.
//!
//! A pass selects the ready items, plans one bounded batch per kind, and
//! sends each batch through the transport. Success removes the whole batch
//! from the queue atomically; failure applies the retry policy to every
//! item in the batch. One kind's failure never blocks dispatch of the
//! other kinds in the same pass.
//!
//! Concurrent `dispatch_pass` calls short-circuit: at most one pass owns
//! the queue at a time, enforced by an in-pass flag with an RAII reset
//! guard.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::batch::BatchPlanner;
use crate::network::NetworkGate;
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::store::queue::{DurableQueue, FailureUpdate};
use crate::store::traits::StorageError;
use crate::sync_item::epoch_millis;
use crate::transport::Transport;

/// Why a pass did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Network gate reports disconnected.
    Offline,
    /// Another pass is already running.
    Busy,
}

/// What one pass accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Kind-batches attempted.
    pub batches: usize,
    /// Items successfully dispatched and removed.
    pub dispatched: usize,
    /// Items requeued for a later attempt.
    pub requeued: usize,
    /// Items moved to dead-letter.
    pub dead_lettered: usize,
    /// Ready items deferred to the next pass by the batch cap.
    pub deferred: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Skipped(SkipReason),
    Completed(PassReport),
}

/// Sends batches through the transport, one pass at a time.
pub struct Dispatcher {
    queue: Arc<DurableQueue>,
    transport: Arc<dyn Transport>,
    gate: Arc<NetworkGate>,
    retry: RetryPolicy,
    planner: BatchPlanner,

    in_pass: AtomicBool,
    pass_starts: AtomicU64,
    /// Epoch millis of the last successful batch; 0 = never.
    last_sync_at: AtomicI64,
    last_failure: RwLock<Option<String>>,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<DurableQueue>,
        transport: Arc<dyn Transport>,
        gate: Arc<NetworkGate>,
        retry: RetryPolicy,
        planner: BatchPlanner,
    ) -> Self {
        Self {
            queue,
            transport,
            gate,
            retry,
            planner,
            in_pass: AtomicBool::new(false),
            pass_starts: AtomicU64::new(0),
            last_sync_at: AtomicI64::new(0),
            last_failure: RwLock::new(None),
        }
    }

    /// Run one dispatch pass to completion.
    ///
    /// Returns `Skipped` without touching the queue when offline or when
    /// another pass is in flight. A storage error aborts the pass; any
    /// batch the pass had already marked in-flight is released back to
    /// pending before the error surfaces, so the items stay selectable
    /// without waiting for a restart.
    pub async fn dispatch_pass(&self) -> Result<PassOutcome, StorageError> {
        if !self.gate.is_connected() {
            debug!("Dispatch pass skipped: offline");
            crate::metrics::record_pass_skipped("offline");
            return Ok(PassOutcome::Skipped(SkipReason::Offline));
        }
        if self.in_pass.swap(true, Ordering::AcqRel) {
            debug!("Dispatch pass skipped: already running");
            crate::metrics::record_pass_skipped("busy");
            return Ok(PassOutcome::Skipped(SkipReason::Busy));
        }
        let _guard = PassGuard(&self.in_pass);
        self.pass_starts.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let now = epoch_millis();
        let ready = self.queue.ready_items(now).await;
        if ready.is_empty() {
            return Ok(PassOutcome::Completed(PassReport::default()));
        }

        let mut report = PassReport::default();
        for batch in self.planner.plan(ready) {
            report.batches += 1;
            report.deferred += batch.deferred;

            let ids: Vec<String> = batch.items.iter().map(|i| i.id.clone()).collect();
            self.queue.mark_in_flight(&ids).await?;

            let payloads: Vec<Value> =
                batch.items.iter().map(|i| i.payload.clone()).collect();
            let result = if payloads.len() == 1 {
                self.transport.send(&batch.kind, &payloads[0]).await
            } else {
                self.transport.send_batch(&batch.kind, &payloads).await
            };

            match result {
                Ok(()) => {
                    let removed = match self.queue.complete(&ids).await {
                        Ok(removed) => removed,
                        Err(e) => {
                            self.release_batch(&ids).await;
                            return Err(e);
                        }
                    };
                    report.dispatched += removed;
                    self.last_sync_at.store(epoch_millis(), Ordering::Release);
                    crate::metrics::record_dispatched(&batch.kind, removed);
                    debug!(kind = %batch.kind, count = removed, "Batch dispatched");
                }
                Err(err) => {
                    warn!(
                        kind = %batch.kind,
                        count = ids.len(),
                        retryable = err.is_retryable(),
                        error = %err,
                        "Batch dispatch failed"
                    );
                    *self.last_failure.write() = Some(err.to_string());

                    let failed_at = epoch_millis();
                    let updates: Vec<FailureUpdate> = batch
                        .items
                        .iter()
                        .map(|item| {
                            let attempts = item.attempts + 1;
                            let dead = matches!(
                                self.retry.assess(attempts, &err),
                                RetryOutcome::DeadLetter
                            );
                            if dead {
                                report.dead_lettered += 1;
                            } else {
                                report.requeued += 1;
                            }
                            FailureUpdate {
                                id: item.id.clone(),
                                error: err.to_string(),
                                dead_letter: dead,
                                next_attempt_at: failed_at
                                    + self.retry.next_delay(attempts).as_millis() as i64,
                            }
                        })
                        .collect();
                    if let Err(e) = self.queue.record_failures(&updates).await {
                        self.release_batch(&ids).await;
                        return Err(e);
                    }
                    crate::metrics::record_dispatch_failed(&batch.kind, updates.len());
                    // Fall through to the next kind: per-kind isolation.
                }
            }
        }

        crate::metrics::record_pass_duration(started.elapsed());
        info!(
            batches = report.batches,
            dispatched = report.dispatched,
            requeued = report.requeued,
            dead_lettered = report.dead_lettered,
            deferred = report.deferred,
            "Dispatch pass complete"
        );
        Ok(PassOutcome::Completed(report))
    }

    /// Epoch millis of the last successful batch dispatch.
    #[must_use]
    pub fn last_sync_at(&self) -> Option<i64> {
        match self.last_sync_at.load(Ordering::Acquire) {
            0 => None,
            at => Some(at),
        }
    }

    /// Last transport failure summary, for diagnostics.
    #[must_use]
    pub fn last_failure(&self) -> Option<String> {
        self.last_failure.read().clone()
    }

    /// How many passes have actually started (skips excluded).
    #[must_use]
    pub fn pass_starts(&self) -> u64 {
        self.pass_starts.load(Ordering::Relaxed)
    }

    /// Best-effort release when a batch is abandoned mid-pass. The
    /// in-memory reset always applies; a failed persist only delays the
    /// durable correction until the next save or load.
    async fn release_batch(&self, ids: &[String]) {
        if let Err(e) = self.queue.release_in_flight(ids).await {
            warn!(error = %e, "Failed to persist release of abandoned batch");
        }
    }
}

/// RAII reset for the in-pass flag.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
