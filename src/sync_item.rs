//! Core data units that flow through the engine.
//!
//! A [`SyncItem`] is one pending write operation: an opaque payload tagged
//! with a `kind` that selects the remote route, plus the bookkeeping the
//! queue needs (status, attempts, backoff window). A [`CacheEntry`] is a
//! keyed snapshot of a previously successful read.
//!
//! # Example
//!
//! ```
//! use offline_sync::{SyncItem, ItemStatus};
//! use serde_json::json;
//!
//! let item = SyncItem::new("performance", json!({"score": 87}), 0);
//!
//! assert_eq!(item.kind, "performance");
//! assert_eq!(item.status, ItemStatus::Pending);
//! assert_eq!(item.attempts, 0);
//! assert!(!item.id.is_empty());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Epoch milliseconds now. Saturates to 0 before the epoch.
pub(crate) fn epoch_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Queue-visible lifecycle state of a [`SyncItem`].
///
/// A retryable failure does not get its own state: the item returns to
/// `Pending` with `attempts` incremented and `last_error` set, which is
/// exactly what makes it eligible for the next pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting for a dispatch pass (possibly after failed attempts).
    Pending,
    /// Owned by the currently running dispatch pass.
    InFlight,
    /// Terminal: exhausted the retry budget or failed non-retryably.
    /// Retained for inspection, excluded from automatic dispatch.
    DeadLetter,
}

/// A pending write operation.
///
/// The payload is opaque to the engine: producers own serialization and
/// validation of their own `kind`. The `kind` tag is assigned explicitly
/// at enqueue time and is the only routing information the engine uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncItem {
    /// Unique id, assigned at enqueue time (uuid v4).
    pub id: String,
    /// Payload kind tag (e.g. `"performance"`, `"scenario"`, `"settings"`).
    pub kind: String,
    /// Opaque payload blob. Never inspected by the engine.
    pub payload: Value,
    /// Higher dispatches first within a kind.
    #[serde(default)]
    pub priority: i32,
    /// Enqueue timestamp (epoch millis); oldest-first tie-break.
    pub enqueued_at: i64,
    /// Failed dispatch attempts so far.
    #[serde(default)]
    pub attempts: u32,
    /// Backoff window: not eligible for selection before this (epoch millis).
    #[serde(default)]
    pub next_attempt_at: i64,
    /// Last failure reason, for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Lifecycle state.
    pub status: ItemStatus,
}

impl SyncItem {
    /// Create a new pending item with a fresh uuid.
    pub fn new(kind: impl Into<String>, payload: Value, priority: i32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            payload,
            priority,
            enqueued_at: epoch_millis(),
            attempts: 0,
            next_attempt_at: 0,
            last_error: None,
            status: ItemStatus::Pending,
        }
    }

    /// Whether the item is eligible for selection at time `now`.
    #[must_use]
    pub fn is_ready(&self, now: i64) -> bool {
        self.status == ItemStatus::Pending && self.next_attempt_at <= now
    }
}

/// A keyed snapshot of the last successful read for a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Logical resource identifier (e.g. user id + resource kind).
    pub key: String,
    /// Last-known-good payload.
    pub value: Value,
    /// Snapshot timestamp (epoch millis), drives optional expiry.
    pub cached_at: i64,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            cached_at: epoch_millis(),
        }
    }

    /// Age of the snapshot relative to `now` (epoch millis).
    #[must_use]
    pub fn age_millis(&self, now: i64) -> i64 {
        now.saturating_sub(self.cached_at)
    }
}
