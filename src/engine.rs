// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine facade: the producer-facing API.
//!
//! [`SyncEngine`] wires the durable queue, network gate, dispatcher, and
//! scheduler together behind the four operations producers see:
//! `enqueue`, `status`, `retry_dead_letters`, and `read`. Construct it once
//! at process start and pass it explicitly to producers; there is no
//! global accessor.
//!
//! Producers never see retry machinery: `enqueue` either succeeds durably
//! or fails outright, and everything after that is observable only through
//! [`status`](SyncEngine::status).

use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::batch::BatchPlanner;
use crate::cache::CacheAside;
use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::network::NetworkGate;
use crate::retry::RetryPolicy;
use crate::scheduler::Scheduler;
use crate::store::queue::DurableQueue;
use crate::store::traits::{StorageBackend, StorageError};
use crate::sync_item::SyncItem;
use crate::transport::{Transport, TransportError};

/// Diagnostics snapshot for UI / operator surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub pending: usize,
    pub in_flight: usize,
    pub dead_letter: usize,
    /// Epoch millis of the last successful batch; `None` = never synced.
    pub last_sync_at: Option<i64>,
    pub is_online: bool,
    /// Dead-letter accumulation crossed the configured alarm threshold.
    /// Degraded sync, not a hard failure: the writes are parked, not lost.
    pub degraded: bool,
}

/// Offline-first durable synchronization engine.
pub struct SyncEngine {
    config: EngineConfig,
    queue: Arc<DurableQueue>,
    dispatcher: Arc<Dispatcher>,
    gate: Arc<NetworkGate>,
    cache: Arc<CacheAside>,
    transport: Arc<dyn Transport>,
    kick: Arc<Notify>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Create an engine over the given collaborators.
    ///
    /// Spawns the gate's debounce task, so this must be called inside a
    /// tokio runtime. The engine is inert until [`start`](Self::start).
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        let gate = Arc::new(NetworkGate::new(Duration::from_millis(
            config.reconnect_quiet_ms,
        )));
        let queue = Arc::new(DurableQueue::new(backend, config.queue_collection.clone()));
        let retry = RetryPolicy::from_millis(
            config.max_attempts,
            config.retry_initial_ms,
            config.retry_max_ms,
        );
        let dispatcher = Arc::new(Dispatcher::new(
            queue.clone(),
            transport.clone(),
            gate.clone(),
            retry,
            BatchPlanner::new(config.max_batch),
        ));
        let cache = Arc::new(CacheAside::new(
            config.cache_max_age_secs.map(Duration::from_secs),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            queue,
            dispatcher,
            gate,
            cache,
            transport,
            kick: Arc::new(Notify::new()),
            shutdown_tx,
            shutdown_rx,
            worker: Mutex::new(None),
        }
    }

    /// Recover the persisted queue and start the scheduler.
    ///
    /// Returns the number of items recovered from the last run. Items left
    /// in-flight by a crash come back as pending and are drained by the
    /// scheduler's startup pass.
    pub async fn start(&self) -> Result<usize, StorageError> {
        let recovered = self.queue.load().await?;

        let scheduler = Scheduler::new(
            Duration::from_secs(self.config.sync_interval_secs),
            self.kick.clone(),
            self.gate.reconnects(),
            self.shutdown_rx.clone(),
        );
        let worker = tokio::spawn(scheduler.run(self.dispatcher.clone()));
        *self.worker.lock() = Some(worker);

        info!(recovered, "Sync engine started");
        Ok(recovered)
    }

    /// Durably record a write operation with default priority.
    ///
    /// Returns once the item is persisted: "recorded, will sync
    /// eventually". Wakes the scheduler if it is idle.
    pub async fn enqueue(&self, kind: &str, payload: Value) -> Result<String, StorageError> {
        self.enqueue_with_priority(kind, payload, 0).await
    }

    /// Durably record a write operation; higher priority dispatches first
    /// within its kind.
    pub async fn enqueue_with_priority(
        &self,
        kind: &str,
        payload: Value,
        priority: i32,
    ) -> Result<String, StorageError> {
        let item = SyncItem::new(kind, payload, priority);
        let id = self.queue.enqueue(item).await?;
        crate::metrics::record_enqueued(kind);
        self.kick.notify_one();
        Ok(id)
    }

    /// Diagnostics snapshot.
    pub async fn status(&self) -> EngineStatus {
        let counts = self.queue.counts().await;
        crate::metrics::set_queue_depth(counts.pending, counts.in_flight, counts.dead_letter);

        EngineStatus {
            pending: counts.pending,
            in_flight: counts.in_flight,
            dead_letter: counts.dead_letter,
            last_sync_at: self.dispatcher.last_sync_at(),
            is_online: self.gate.is_connected(),
            degraded: counts.dead_letter >= self.config.dead_letter_alarm,
        }
    }

    /// Reset dead-letter items to pending with a fresh retry budget and
    /// trigger a pass. Returns how many were requeued.
    pub async fn retry_dead_letters(&self) -> Result<usize, StorageError> {
        let reset = self.queue.reset_dead_letters().await?;
        if reset > 0 {
            self.kick.notify_one();
        }
        Ok(reset)
    }

    /// Cache-aside read: live fetch first, last-known-good snapshot on
    /// failure.
    pub async fn read<F, Fut>(&self, key: &str, fetch: F) -> Result<Value, TransportError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Value, TransportError>>,
    {
        self.cache.read(key, fetch).await
    }

    /// Cache-aside read going through the engine's own transport.
    pub async fn fetch(&self, key: &str) -> Result<Value, TransportError> {
        let transport = self.transport.clone();
        self.cache.read(key, || async move { transport.fetch(key).await }).await
    }

    /// Demand trigger: run a pass as soon as the scheduler is free.
    pub fn sync_now(&self) {
        self.kick.notify_one();
    }

    /// Feed a platform connectivity transition into the gate.
    pub fn set_connected(&self, connected: bool) {
        self.gate.set_connected(connected);
    }

    /// Current (undebounced) connectivity.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.gate.is_connected()
    }

    /// Stop the scheduler and make one final best-effort dispatch pass.
    ///
    /// Pending items stay durably queued either way; the next `start`
    /// recovers them.
    pub async fn shutdown(&self) {
        info!("Sync engine shutting down");
        let _ = self.shutdown_tx.send(true);

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.await.is_err() {
                warn!("Scheduler worker aborted during shutdown");
            }
        }

        if self.gate.is_connected() {
            if let Err(e) = self.dispatcher.dispatch_pass().await {
                warn!(error = %e, "Final dispatch pass failed during shutdown");
            }
        }
        info!("Sync engine shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBackend;
    use crate::sync_item::ItemStatus;
    use async_trait::async_trait;
    use parking_lot::RwLock;
    use serde_json::json;

    /// Transport whose behavior can be flipped mid-test.
    struct FlippableTransport {
        fail: RwLock<Option<TransportError>>,
        fetch_result: RwLock<Result<Value, TransportError>>,
    }

    impl FlippableTransport {
        fn ok() -> Self {
            Self {
                fail: RwLock::new(None),
                fetch_result: RwLock::new(Ok(json!({"fetched": true}))),
            }
        }

        fn set_fail(&self, err: Option<TransportError>) {
            *self.fail.write() = err;
        }

        fn set_fetch(&self, result: Result<Value, TransportError>) {
            *self.fetch_result.write() = result;
        }
    }

    #[async_trait]
    impl Transport for FlippableTransport {
        async fn send(&self, _kind: &str, _payload: &Value) -> Result<(), TransportError> {
            match self.fail.read().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        async fn fetch(&self, _key: &str) -> Result<Value, TransportError> {
            self.fetch_result.read().clone()
        }
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            sync_interval_secs: 100_000,
            max_batch: 10,
            max_attempts: 3,
            retry_initial_ms: 0,
            retry_max_ms: 0,
            reconnect_quiet_ms: 10,
            dead_letter_alarm: 2,
            ..Default::default()
        }
    }

    fn engine_with(transport: Arc<FlippableTransport>) -> SyncEngine {
        SyncEngine::new(test_config(), transport, Arc::new(MemoryBackend::new()))
    }

    async fn wait_for<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                if check().await {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("condition never met");
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_drains_via_demand_trigger() {
        let transport = Arc::new(FlippableTransport::ok());
        let engine = engine_with(transport);
        engine.start().await.unwrap();

        engine.enqueue("performance", json!({"score": 91})).await.unwrap();
        wait_for(|| async { engine.status().await.pending == 0 }).await;

        let status = engine.status().await;
        assert!(status.last_sync_at.is_some());
        assert!(!status.degraded);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_holds_items_until_reconnect() {
        let transport = Arc::new(FlippableTransport::ok());
        let engine = engine_with(transport);
        engine.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        engine.set_connected(false);
        engine.enqueue("scenario", json!({"result": "pass"})).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(engine.status().await.pending, 1);
        assert!(!engine.status().await.is_online);

        engine.set_connected(true);
        wait_for(|| async { engine.status().await.pending == 0 }).await;
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_status_and_dead_letter_retry() {
        let transport = Arc::new(FlippableTransport::ok());
        transport.set_fail(Some(TransportError::Permanent("422".into())));
        let engine = engine_with(transport.clone());
        engine.start().await.unwrap();

        engine.enqueue("performance", json!({"n": 1})).await.unwrap();
        engine.enqueue("performance", json!({"n": 2})).await.unwrap();
        wait_for(|| async { engine.status().await.dead_letter == 2 }).await;

        // Alarm threshold (2) crossed.
        assert!(engine.status().await.degraded);

        // Operator retry after the backend accepts again.
        transport.set_fail(None);
        let reset = engine.retry_dead_letters().await.unwrap();
        assert_eq!(reset, 2);
        wait_for(|| async {
            let s = engine.status().await;
            s.pending == 0 && s.dead_letter == 0
        })
        .await;
        assert!(!engine.status().await.degraded);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_falls_back_to_cache() {
        let transport = Arc::new(FlippableTransport::ok());
        let engine = engine_with(transport.clone());

        let value = engine.fetch("user-1:settings").await.unwrap();
        assert_eq!(value, json!({"fetched": true}));

        transport.set_fetch(Err(TransportError::Transient("offline".into())));
        let value = engine.fetch("user-1:settings").await.unwrap();
        assert_eq!(value, json!({"fetched": true}));

        // Unknown key propagates the failure.
        assert!(engine.fetch("user-2:settings").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_leaves_pending_items_durable() {
        let backend = Arc::new(MemoryBackend::new());
        let transport = Arc::new(FlippableTransport::ok());
        transport.set_fail(Some(TransportError::Transient("503".into())));

        let engine = SyncEngine::new(test_config(), transport.clone(), backend.clone());
        engine.start().await.unwrap();
        engine.enqueue("performance", json!({"n": 1})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        engine.shutdown().await;

        // Second engine over the same backend recovers the item.
        transport.set_fail(None);
        let engine = SyncEngine::new(test_config(), transport, backend);
        let recovered = engine.start().await.unwrap();
        assert_eq!(recovered, 1);
        wait_for(|| async { engine.status().await.pending == 0 }).await;
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_while_pass_running_coalesces() {
        let transport = Arc::new(FlippableTransport::ok());
        let engine = engine_with(transport);
        engine.start().await.unwrap();

        for i in 0..25 {
            engine.enqueue("performance", json!({"n": i})).await.unwrap();
        }
        wait_for(|| async { engine.status().await.pending == 0 }).await;

        let snapshot = engine.queue.snapshot().await;
        assert!(snapshot.iter().all(|i| i.status != ItemStatus::InFlight));
        engine.shutdown().await;
    }
}
