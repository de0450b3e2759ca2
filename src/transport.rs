//! Transport collaborator seam.
//!
//! The engine does not speak HTTP itself: the embedding app supplies a
//! [`Transport`] that knows how to deliver one payload (or a batch of
//! payloads of the same kind) to the right remote route, and how to fetch
//! a resource for cache-aside reads.
//!
//! Failures are discriminated so the retry policy can act on them:
//! [`TransportError::Transient`] for network/timeout/server errors that may
//! succeed later, [`TransportError::Permanent`] for validation/auth errors
//! that retrying cannot fix.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Network, timeout, or 5xx server failure. Retryable.
    #[error("transient transport failure: {0}")]
    Transient(String),
    /// Validation, auth, or other 4xx failure. Retrying cannot succeed.
    #[error("permanent transport failure: {0}")]
    Permanent(String),
}

impl TransportError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Delivery and fetch capability supplied by the HTTP layer.
///
/// `send_batch` has a default implementation that loops `send`, for
/// transports without a batch endpoint for a given kind. Batch delivery is
/// all-or-nothing from the engine's point of view: return `Ok` only when
/// every payload in the batch was accepted.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one payload of the given kind.
    async fn send(&self, kind: &str, payload: &Value) -> Result<(), TransportError>;

    /// Deliver a batch of payloads of the same kind.
    async fn send_batch(&self, kind: &str, payloads: &[Value]) -> Result<(), TransportError> {
        for payload in payloads {
            self.send(kind, payload).await?;
        }
        Ok(())
    }

    /// Fetch a resource by key (cache-aside read path).
    async fn fetch(&self, key: &str) -> Result<Value, TransportError>;
}
