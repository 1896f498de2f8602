//! Optimistic mutation ledger (spec §4.5): outstanding local writes awaiting
//! confirmation by an echo, auto-expired after a timeout by a background
//! sweep. The sweep thread is grounded on the teacher's
//! `server_thread::create_server_thread` shape (a named background
//! `std::thread` driven by a channel) rather than a bare `sleep` loop, so
//! it can be stopped deterministically from tests.

use parking_lot::Mutex;
use portkit_core::prelude::*;
use rand::Rng;
use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Clone, Debug, PartialEq)]
pub struct PendingMutation {
    pub port_key: PortKey,
    pub value: serde_json::Value,
    pub version: u64,
    pub timestamp: i64,
    pub mutation_id: String,
    pub client_id: String,
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// `${now}-${9-char random base36}`.
pub fn generate_mutation_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", now_ms(), suffix)
}

static CLIENT_ID: OnceLock<String> = OnceLock::new();

/// Persists a UUID-like string for the life of the process, so echoes from
/// other sessions can be distinguished (spec §4.5).
pub fn client_id() -> &'static str {
    CLIENT_ID.get_or_init(|| uuid::Uuid::new_v4().to_string())
}

#[derive(Clone, Default)]
pub struct PendingMutationLedger {
    inner: Arc<Mutex<HashMap<PortKey, Vec<PendingMutation>>>>,
}

impl PendingMutationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, mutation: PendingMutation) {
        self.inner
            .lock()
            .entry(mutation.port_key.clone())
            .or_default()
            .push(mutation);
    }

    /// Remove the matching entry; delete the portKey if its list becomes empty.
    pub fn confirm(&self, port_key: &PortKey, mutation_id: &str) -> bool {
        let mut guard = self.inner.lock();
        let Some(list) = guard.get_mut(port_key) else {
            return false;
        };
        let before = list.len();
        list.retain(|m| m.mutation_id != mutation_id);
        let removed = list.len() != before;
        if list.is_empty() {
            guard.remove(port_key);
        }
        removed
    }

    pub fn reject(&self, port_key: &PortKey, mutation_id: &str, reason: &str) -> bool {
        let removed = self.confirm(port_key, mutation_id);
        if removed {
            tracing::warn!(%port_key, mutation_id, reason, "pending mutation rejected");
        }
        removed
    }

    pub fn pending_for(&self, port_key: &PortKey) -> Vec<PendingMutation> {
        self.inner.lock().get(port_key).cloned().unwrap_or_default()
    }

    pub fn latest_version(&self, port_key: &PortKey) -> Option<u64> {
        self.inner
            .lock()
            .get(port_key)
            .and_then(|list| list.iter().map(|m| m.version).max())
    }

    pub fn has_pending(&self, port_key: &PortKey) -> bool {
        self.inner.lock().contains_key(port_key)
    }

    pub fn reset(&self) {
        self.inner.lock().clear();
    }

    /// Drop entries older than `timeout` as of `now_ms`. Logs a warning with
    /// the count dropped per portKey (spec §4.5, §7 `PendingExpired`). The
    /// local optimistic value is *not* rolled back: the store retains it
    /// until contradicted by a later echo.
    pub fn sweep(&self, now_ms: i64, timeout: Duration) -> usize {
        let cutoff_age = timeout.as_millis() as i64;
        let mut guard = self.inner.lock();
        let mut total_removed = 0usize;
        guard.retain(|port_key, list| {
            let before = list.len();
            list.retain(|m| now_ms - m.timestamp < cutoff_age);
            let removed = before - list.len();
            if removed > 0 {
                total_removed += removed;
                tracing::warn!(%port_key, removed, "pending mutation(s) expired and auto-cleaned");
            }
            !list.is_empty()
        });
        total_removed
    }
}

/// A running sweep thread; dropping or calling [`SweepHandle::stop`] joins it.
pub struct SweepHandle {
    stop_tx: mpsc::Sender<()>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl SweepHandle {
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        self.join_inner();
    }

    fn join_inner(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        self.join_inner();
    }
}

/// Spawn the periodic sweep (spec §4.5, §5): every `interval`, drop pending
/// mutations older than `timeout`.
pub fn spawn_sweep(ledger: PendingMutationLedger, interval: Duration, timeout: Duration) -> SweepHandle {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let join = std::thread::Builder::new()
        .name("portkit-pending-sweep".to_string())
        .spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Ok(()) => break,
                Err(RecvTimeoutError::Timeout) => {
                    ledger.sweep(now_ms(), timeout);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        })
        .expect("failed to spawn pending-mutation sweep thread");
    SweepHandle {
        stop_tx,
        join: Some(join),
    }
}
