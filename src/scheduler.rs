// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Scheduler: wakes the dispatcher on a timer, on reconnect, on demand.
//!
//! One logical worker per queue drives passes. The loop runs each pass to
//! completion before selecting again, so trigger signals arriving mid-pass
//! are held by the pending interval tick, watch flag, or notify permit and
//! produce exactly one follow-up pass (edge-triggered coalescing), never a
//! second concurrent pass and never an un-drained backlog.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::dispatch::{Dispatcher, PassOutcome};

/// Drives dispatch passes until shut down.
pub struct Scheduler {
    interval: Duration,
    kick: Arc<Notify>,
    reconnects: watch::Receiver<u64>,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        interval: Duration,
        kick: Arc<Notify>,
        reconnects: watch::Receiver<u64>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            interval,
            kick,
            reconnects,
            shutdown,
        }
    }

    /// Run the trigger loop. Returns when shutdown is signalled.
    ///
    /// The first interval tick completes immediately, so startup drains any
    /// backlog recovered from disk without waiting a full period.
    pub async fn run(mut self, dispatcher: Arc<Dispatcher>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "Scheduler running");

        loop {
            let trigger = tokio::select! {
                _ = ticker.tick() => "timer",
                changed = self.reconnects.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    "reconnect"
                }
                _ = self.kick.notified() => "demand",
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            debug!(trigger, "Dispatch pass triggered");
            crate::metrics::record_pass_trigger(trigger);
            match dispatcher.dispatch_pass().await {
                Ok(PassOutcome::Completed(report)) => {
                    if report.deferred > 0 {
                        // Bounded pass left ready work behind; follow up
                        // immediately instead of waiting for the timer.
                        self.kick.notify_one();
                    }
                }
                Ok(PassOutcome::Skipped(reason)) => {
                    debug!(?reason, trigger, "Dispatch pass skipped");
                }
                Err(e) => {
                    error!(error = %e, trigger, "Dispatch pass failed");
                }
            }
        }
        info!("Scheduler stopped");
    }
}
