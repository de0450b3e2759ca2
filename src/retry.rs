// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry policy: bounded exponential backoff with a dead-letter fast path.
//!
//! On every failed dispatch the policy decides whether the item is worth
//! another attempt. Transient failures back off exponentially until the
//! attempt budget is spent; permanent failures (validation, auth) route
//! straight to dead-letter, since retrying them cannot succeed.
//!
//! # Example
//!
//! ```
//! use offline_sync::{RetryPolicy, RetryOutcome, TransportError};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.max_attempts, 3);
//!
//! // A permanent failure dead-letters on the first attempt.
//! let outcome = policy.assess(1, &TransportError::Permanent("422".into()));
//! assert_eq!(outcome, RetryOutcome::DeadLetter);
//!
//! // Delays grow but stay capped.
//! assert!(policy.next_delay(1) < policy.next_delay(3));
//! assert!(policy.next_delay(30) <= Duration::from_millis(300_000));
//! ```

use std::time::Duration;

use crate::transport::TransportError;

/// What to do with an item after a failed dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Keep the item pending; eligible again after the backoff delay.
    Requeue,
    /// Terminal: park the item for operator inspection.
    DeadLetter,
}

/// Configurable retry behavior for failed dispatches.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Failed attempts before a transiently failing item dead-letters.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Build from engine config values (delays in milliseconds).
    #[must_use]
    pub fn from_millis(max_attempts: u32, initial_ms: u64, max_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            factor: 2.0,
        }
    }

    /// Zero-delay policy for tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            factor: 2.0,
        }
    }

    /// Decide the item's fate given its attempt count *after* the failure
    /// being assessed.
    #[must_use]
    pub fn assess(&self, attempts: u32, error: &TransportError) -> RetryOutcome {
        if !error.is_retryable() {
            return RetryOutcome::DeadLetter;
        }
        if attempts >= self.max_attempts {
            RetryOutcome::DeadLetter
        } else {
            RetryOutcome::Requeue
        }
    }

    /// Backoff delay before the next attempt, exponential in the number of
    /// failed attempts so far and capped at `max_delay`.
    #[must_use]
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exp = attempts.saturating_sub(1).min(24);
        self.initial_delay
            .mul_f64(self.factor.powi(exp as i32))
            .min(self.max_delay)
    }
}
