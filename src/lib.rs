//! # Offline Sync
//!
//! An offline-first durable synchronization engine: the app keeps working
//! and keeps recording data when connectivity is intermittent, and the
//! engine delivers it when it can.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Producers                           │
//! │  • enqueue(kind, payload): durable before return            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Durable Queue Store                      │
//! │  • Ordered, persisted via StorageBackend (atomic overwrite) │
//! │  • Crash recovery: in-flight items reset to pending on load │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              (Scheduler: timer / reconnect / demand)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Dispatch Executor                       │
//! │  • Network-gated, single-flight pass                        │
//! │  • One bounded batch per kind (priority, then oldest)       │
//! │  • Retry policy: backoff, dead-letter on budget/4xx         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Transport (collaborator)                   │
//! │  • send / send_batch per kind, fetch for reads              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads take a separate path: the [`CacheAside`] reader tries the live
//! fetch first and falls back to the last-known-good snapshot when the
//! transport fails.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//! use offline_sync::{
//!     EngineConfig, JsonFileBackend, SyncEngine, Transport, TransportError,
//! };
//!
//! struct HttpTransport;
//!
//! #[async_trait]
//! impl Transport for HttpTransport {
//!     async fn send(&self, kind: &str, payload: &Value) -> Result<(), TransportError> {
//!         // POST to the route for `kind`...
//!         Ok(())
//!     }
//!     async fn fetch(&self, key: &str) -> Result<Value, TransportError> {
//!         // GET the resource for `key`...
//!         Ok(json!({}))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = Arc::new(
//!         JsonFileBackend::new("./sync-data").await.expect("storage dir"),
//!     );
//!     let engine = SyncEngine::new(EngineConfig::default(), Arc::new(HttpTransport), backend);
//!     engine.start().await.expect("queue recovery");
//!
//!     // Durable before return: "recorded, will sync eventually".
//!     engine
//!         .enqueue("performance", json!({"student": "s-1", "score": 87}))
//!         .await
//!         .expect("persist");
//!
//!     // Feed platform connectivity events into the gate.
//!     engine.set_connected(true);
//!
//!     // Cache-aside read survives a flaky backend.
//!     if let Ok(settings) = engine.fetch("user-1:settings").await {
//!         println!("settings: {settings}");
//!     }
//!
//!     engine.shutdown().await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: the [`SyncEngine`] facade producers talk to
//! - [`store`]: persistence seam and the [`DurableQueue`]
//! - [`dispatch`]: single-flight batched dispatch passes
//! - [`scheduler`]: timer / reconnect / demand triggers with coalescing
//! - [`network`]: connectivity gate with debounced reconnect events
//! - [`retry`]: backoff and dead-letter policy
//! - [`batch`]: per-kind batch planning
//! - [`cache`]: cache-aside reads
//! - [`transport`]: the HTTP-layer collaborator seam
//! - [`metrics`]: `metrics`-crate instrumentation helpers

pub mod config;
pub mod sync_item;
pub mod store;
pub mod transport;
pub mod network;
pub mod retry;
pub mod batch;
pub mod dispatch;
pub mod scheduler;
pub mod cache;
pub mod engine;
pub mod metrics;

pub use config::EngineConfig;
pub use sync_item::{CacheEntry, ItemStatus, SyncItem};
pub use store::{DurableQueue, JsonFileBackend, MemoryBackend, QueueCounts, StorageBackend, StorageError};
pub use transport::{Transport, TransportError};
pub use network::NetworkGate;
pub use retry::{RetryOutcome, RetryPolicy};
pub use batch::{BatchPlanner, KindBatch};
pub use dispatch::{Dispatcher, PassOutcome, PassReport, SkipReason};
pub use scheduler::Scheduler;
pub use cache::CacheAside;
pub use engine::{EngineStatus, SyncEngine};
