// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Network gate: connectivity state plus debounced reconnect events.
//!
//! The embedding app feeds platform connectivity callbacks into
//! [`NetworkGate::set_connected`]. Dispatch gating reads the raw state via
//! [`is_connected`](NetworkGate::is_connected), which always sees the
//! truth immediately. Reconnect *events*, the wake source for the
//! scheduler, are debounced: transitions inside the quiet period collapse,
//! so a flapping radio does not trigger a dispatch pass per flap.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Connectivity state with a coalesced offline-to-online event stream.
pub struct NetworkGate {
    raw_tx: watch::Sender<bool>,
    reconnects_rx: watch::Receiver<u64>,
    debounce: JoinHandle<()>,
}

impl NetworkGate {
    /// Create a gate assuming an initially online state.
    ///
    /// Spawns the debounce task, so this must be called inside a tokio
    /// runtime.
    #[must_use]
    pub fn new(quiet_period: Duration) -> Self {
        Self::with_initial(quiet_period, true)
    }

    #[must_use]
    pub fn with_initial(quiet_period: Duration, connected: bool) -> Self {
        let (raw_tx, raw_rx) = watch::channel(connected);
        let (reconnects_tx, reconnects_rx) = watch::channel(0u64);

        let debounce = tokio::spawn(debounce_loop(raw_rx, reconnects_tx, quiet_period));

        Self {
            raw_tx,
            reconnects_rx,
            debounce,
        }
    }

    /// Feed a connectivity transition from the platform.
    pub fn set_connected(&self, connected: bool) {
        let changed = self.raw_tx.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        });
        if changed {
            debug!(connected, "Connectivity transition");
            crate::metrics::set_online(connected);
        }
    }

    /// Current (undebounced) connectivity.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.raw_tx.borrow()
    }

    /// Watch receiver bumped once per settled offline-to-online transition.
    #[must_use]
    pub fn reconnects(&self) -> watch::Receiver<u64> {
        self.reconnects_rx.clone()
    }
}

impl Drop for NetworkGate {
    fn drop(&mut self) {
        self.debounce.abort();
    }
}

/// Waits out flapping: after any raw transition, keeps absorbing further
/// transitions until the state has been stable for `quiet_period`, then
/// emits a reconnect event if the settled state is a fresh online.
async fn debounce_loop(
    mut raw_rx: watch::Receiver<bool>,
    reconnects_tx: watch::Sender<u64>,
    quiet_period: Duration,
) {
    let mut settled = *raw_rx.borrow();
    let mut reconnects = 0u64;

    loop {
        if raw_rx.changed().await.is_err() {
            return;
        }
        // Quiet window: every further flap restarts the wait.
        loop {
            match tokio::time::timeout(quiet_period, raw_rx.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return,
                Err(_) => break,
            }
        }
        let current = *raw_rx.borrow_and_update();
        if current && !settled {
            reconnects += 1;
            info!(reconnects, "Connectivity restored, waking dispatcher");
            let _ = reconnects_tx.send(reconnects);
        }
        settled = current;
    }
}
