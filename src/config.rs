//! Configuration for the sync engine.
//!
//! # Example
//!
//! ```
//! use offline_sync::EngineConfig;
//!
//! // Minimal config (uses defaults)
//! let config = EngineConfig::default();
//! assert_eq!(config.max_batch, 25);
//! assert_eq!(config.max_attempts, 3);
//!
//! // Full config
//! let config = EngineConfig {
//!     sync_interval_secs: 60,
//!     max_batch: 10,
//!     reconnect_quiet_ms: 500,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;

/// Configuration for the sync engine.
///
/// All fields have sensible defaults tuned for an app syncing every few
/// minutes over an intermittent connection.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Timer-driven dispatch pass interval in seconds (default: 300)
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Maximum items per kind-batch in one pass (default: 25)
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,

    /// Failed dispatch attempts before an item dead-letters (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry backoff delay in milliseconds (default: 2000)
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,

    /// Backoff delay cap in milliseconds (default: 300_000)
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    /// Quiet period for coalescing connectivity flapping, in milliseconds
    /// (default: 2000)
    #[serde(default = "default_reconnect_quiet_ms")]
    pub reconnect_quiet_ms: u64,

    /// Cache entry max age in seconds; `None` disables expiry
    #[serde(default)]
    pub cache_max_age_secs: Option<u64>,

    /// Dead-letter count at which `status()` reports degraded sync
    /// (default: 25)
    #[serde(default = "default_dead_letter_alarm")]
    pub dead_letter_alarm: usize,

    /// Storage collection name for the operation queue (default: "sync_queue")
    #[serde(default = "default_queue_collection")]
    pub queue_collection: String,
}

fn default_sync_interval_secs() -> u64 { 300 }
fn default_max_batch() -> usize { 25 }
fn default_max_attempts() -> u32 { 3 }
fn default_retry_initial_ms() -> u64 { 2_000 }
fn default_retry_max_ms() -> u64 { 300_000 }
fn default_reconnect_quiet_ms() -> u64 { 2_000 }
fn default_dead_letter_alarm() -> usize { 25 }
fn default_queue_collection() -> String { "sync_queue".to_string() }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_interval_secs(),
            max_batch: default_max_batch(),
            max_attempts: default_max_attempts(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_max_ms: default_retry_max_ms(),
            reconnect_quiet_ms: default_reconnect_quiet_ms(),
            cache_max_age_secs: None,
            dead_letter_alarm: default_dead_letter_alarm(),
            queue_collection: default_queue_collection(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sync_interval_secs, 300);
        assert_eq!(config.max_batch, 25);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_initial_ms, 2_000);
        assert_eq!(config.retry_max_ms, 300_000);
        assert!(config.cache_max_age_secs.is_none());
        assert_eq!(config.queue_collection, "sync_queue");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"max_batch": 10, "cache_max_age_secs": 3600}"#).unwrap();
        assert_eq!(config.max_batch, 10);
        assert_eq!(config.cache_max_age_secs, Some(3600));
        // Untouched fields fall back to defaults
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.reconnect_quiet_ms, 2_000);
    }

    #[test]
    fn test_deserialize_empty_object() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.dead_letter_alarm, 25);
    }
}
