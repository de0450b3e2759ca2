// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Durable operation queue.
//!
//! The [`DurableQueue`] is the single source of truth for pending write
//! operations. Every mutation persists a candidate snapshot through the
//! [`StorageBackend`] *before* committing it to memory: a caller that sees
//! success is guaranteed the state survives a crash, and a failed persist
//! leaves the in-memory collection exactly as it was.
//!
//! On [`load`](DurableQueue::load), items left `InFlight` by a previous run
//! (crash mid-dispatch) are reset to `Pending`: no acknowledgment was
//! durably recorded, so they must be dispatched again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::sync_item::{ItemStatus, SyncItem};
use super::traits::{StorageBackend, StorageError};

/// Queue population broken down by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: usize,
    pub in_flight: usize,
    pub dead_letter: usize,
}

/// Outcome of a failed dispatch attempt, decided by the retry policy and
/// applied by the queue.
#[derive(Debug, Clone)]
pub struct FailureUpdate {
    pub id: String,
    pub error: String,
    /// Terminal: move to dead-letter instead of requeueing.
    pub dead_letter: bool,
    /// Earliest next attempt (epoch millis); ignored when dead-lettering.
    pub next_attempt_at: i64,
}

/// Ordered, persisted collection of pending operations.
pub struct DurableQueue {
    backend: Arc<dyn StorageBackend>,
    collection: String,
    items: Mutex<Vec<SyncItem>>,

    // Lifetime counters for diagnostics
    total_enqueued: AtomicU64,
    total_completed: AtomicU64,
    total_dead_lettered: AtomicU64,
}

impl DurableQueue {
    pub fn new(backend: Arc<dyn StorageBackend>, collection: impl Into<String>) -> Self {
        Self {
            backend,
            collection: collection.into(),
            items: Mutex::new(Vec::new()),
            total_enqueued: AtomicU64::new(0),
            total_completed: AtomicU64::new(0),
            total_dead_lettered: AtomicU64::new(0),
        }
    }

    /// Reconstruct the queue from the last persisted snapshot.
    ///
    /// Returns the number of items recovered. `InFlight` survivors are
    /// reset to `Pending` and the corrected snapshot is persisted.
    pub async fn load(&self) -> Result<usize, StorageError> {
        let mut guard = self.items.lock().await;

        let mut recovered: Vec<SyncItem> = match self.backend.load(&self.collection).await? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };

        let mut reset = 0;
        for item in recovered.iter_mut() {
            if item.status == ItemStatus::InFlight {
                item.status = ItemStatus::Pending;
                reset += 1;
            }
        }

        if reset > 0 {
            warn!(reset, "Reset in-flight items from previous run to pending");
            let bytes = serde_json::to_vec(&recovered)?;
            self.backend.save(&self.collection, &bytes).await?;
        }

        let count = recovered.len();
        if count > 0 {
            info!(count, reset, "Recovered persisted queue");
        }
        *guard = recovered;
        Ok(count)
    }

    /// Append an item and persist. Returns the item id.
    ///
    /// The item is durable when this returns `Ok`, and not before.
    pub async fn enqueue(&self, item: SyncItem) -> Result<String, StorageError> {
        let id = item.id.clone();
        let mut guard = self.items.lock().await;

        let mut candidate = guard.clone();
        candidate.push(item);
        let bytes = serde_json::to_vec(&candidate)?;
        self.backend.save(&self.collection, &bytes).await?;

        *guard = candidate;
        self.total_enqueued.fetch_add(1, Ordering::Relaxed);
        debug!(id = %id, depth = guard.len(), "Item enqueued");
        Ok(id)
    }

    /// Clone of the full collection, in queue order.
    pub async fn snapshot(&self) -> Vec<SyncItem> {
        self.items.lock().await.clone()
    }

    /// Pending items whose backoff window has elapsed at `now`.
    pub async fn ready_items(&self, now: i64) -> Vec<SyncItem> {
        self.items
            .lock()
            .await
            .iter()
            .filter(|item| item.is_ready(now))
            .cloned()
            .collect()
    }

    /// Mark the given items as owned by the current dispatch pass.
    pub async fn mark_in_flight(&self, ids: &[String]) -> Result<(), StorageError> {
        self.mutate(|items| {
            for item in items.iter_mut() {
                if ids.contains(&item.id) && item.status == ItemStatus::Pending {
                    item.status = ItemStatus::InFlight;
                }
            }
        })
        .await
    }

    /// Return in-flight items to pending without counting an attempt.
    ///
    /// Unlike the other mutations this applies to memory first and then
    /// persists: the caller is abandoning a batch after a storage error,
    /// and the items must stay selectable even if this persist fails too.
    /// A restart corrects the persisted status either way, since `load`
    /// resets in-flight survivors.
    pub async fn release_in_flight(&self, ids: &[String]) -> Result<(), StorageError> {
        let mut guard = self.items.lock().await;

        let mut released = 0;
        for item in guard.iter_mut() {
            if ids.contains(&item.id) && item.status == ItemStatus::InFlight {
                item.status = ItemStatus::Pending;
                released += 1;
            }
        }
        if released == 0 {
            return Ok(());
        }
        warn!(released, "Released in-flight items from abandoned batch");

        let bytes = serde_json::to_vec(&*guard)?;
        self.backend.save(&self.collection, &bytes).await
    }

    /// Remove successfully dispatched items. Returns how many were removed.
    pub async fn complete(&self, ids: &[String]) -> Result<usize, StorageError> {
        let mut removed = 0;
        self.mutate(|items| {
            let before = items.len();
            items.retain(|item| !ids.contains(&item.id));
            removed = before - items.len();
        })
        .await?;

        self.total_completed.fetch_add(removed as u64, Ordering::Relaxed);
        debug!(removed, "Completed items removed from queue");
        Ok(removed)
    }

    /// Apply failure outcomes from a dispatch pass in one persisted step.
    pub async fn record_failures(&self, updates: &[FailureUpdate]) -> Result<(), StorageError> {
        let mut dead = 0u64;
        self.mutate(|items| {
            for item in items.iter_mut() {
                let Some(update) = updates.iter().find(|u| u.id == item.id) else {
                    continue;
                };
                item.attempts += 1;
                item.last_error = Some(update.error.clone());
                if update.dead_letter {
                    item.status = ItemStatus::DeadLetter;
                    dead += 1;
                } else {
                    item.status = ItemStatus::Pending;
                    item.next_attempt_at = update.next_attempt_at;
                }
            }
        })
        .await?;

        if dead > 0 {
            self.total_dead_lettered.fetch_add(dead, Ordering::Relaxed);
            warn!(dead_lettered = dead, "Items moved to dead-letter");
        }
        Ok(())
    }

    /// Reset dead-letter items to pending with a fresh retry budget.
    /// Returns how many were reset.
    pub async fn reset_dead_letters(&self) -> Result<usize, StorageError> {
        let mut reset = 0;
        self.mutate(|items| {
            for item in items.iter_mut() {
                if item.status == ItemStatus::DeadLetter {
                    item.status = ItemStatus::Pending;
                    item.attempts = 0;
                    item.next_attempt_at = 0;
                    reset += 1;
                }
            }
        })
        .await?;

        if reset > 0 {
            info!(reset, "Dead-letter items requeued");
        }
        Ok(reset)
    }

    /// Current population by status.
    pub async fn counts(&self) -> QueueCounts {
        let guard = self.items.lock().await;
        let mut counts = QueueCounts::default();
        for item in guard.iter() {
            match item.status {
                ItemStatus::Pending => counts.pending += 1,
                ItemStatus::InFlight => counts.in_flight += 1,
                ItemStatus::DeadLetter => counts.dead_letter += 1,
            }
        }
        counts
    }

    /// Lifetime totals: (enqueued, completed, dead-lettered).
    #[must_use]
    pub fn totals(&self) -> (u64, u64, u64) {
        (
            self.total_enqueued.load(Ordering::Relaxed),
            self.total_completed.load(Ordering::Relaxed),
            self.total_dead_lettered.load(Ordering::Relaxed),
        )
    }

    /// Persist-then-commit: run `apply` on a cloned candidate, save it, and
    /// only then replace the in-memory collection.
    async fn mutate<F>(&self, apply: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Vec<SyncItem>),
    {
        let mut guard = self.items.lock().await;

        let mut candidate = guard.clone();
        apply(&mut candidate);
        let bytes = serde_json::to_vec(&candidate)?;
        self.backend.save(&self.collection, &bytes).await?;

        *guard = candidate;
        Ok(())
    }
}
