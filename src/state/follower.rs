//! Per-follower health tracking.
//!
//! Mirrors the three-state liveness machine a heartbeat prober drives:
//! every success resets straight to [`Health::Healthy`]; consecutive
//! failures step down through [`Health::Suspected`] into
//! [`Health::Unhealthy`]. The higher threshold is checked first, so a
//! burst of failures can jump straight from healthy to unhealthy without
//! stopping at suspected.

use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Suspected,
    Unhealthy,
}

/// Consecutive failures before a follower is considered unhealthy and
/// replication pauses against it.
const ALIVE_LIMIT: u32 = 5;
/// Consecutive failures before a follower is considered merely suspected.
const SUSPECTED_LIMIT: u32 = 2;

/// A follower as seen from the primary: its address, current health, and
/// an "open for traffic" latch that replication tasks wait on while the
/// follower is unhealthy.
///
/// The latch is a manual-reset `watch<bool>`, set `true` whenever the
/// follower is not unhealthy and cleared on the unhealthy transition —
/// the same shape as a condition variable that stays signalled until
/// explicitly reset, just expressed with a broadcastable channel so many
/// waiting replication tasks can resume at once.
pub struct FollowerHandle {
    pub name: String,
    pub address: String,
    failed_count: AtomicU32,
    health: std::sync::Mutex<Health>,
    open_tx: watch::Sender<bool>,
    open_rx: watch::Receiver<bool>,
}

impl FollowerHandle {
    pub fn new(name: String, address: String) -> Self {
        let (open_tx, open_rx) = watch::channel(true);
        Self {
            name,
            address,
            failed_count: AtomicU32::new(0),
            health: std::sync::Mutex::new(Health::Healthy),
            open_tx,
            open_rx,
        }
    }

    pub fn health(&self) -> Health {
        *self.health.lock().unwrap()
    }

    pub fn is_unhealthy(&self) -> bool {
        self.health() == Health::Unhealthy
    }

    /// Any successful contact with the follower calls this: resets the
    /// failure counter, marks healthy, and opens the latch. Returns
    /// `true` if this is a change from the previous state.
    pub fn mark_healthy(&self) -> bool {
        self.failed_count.store(0, Ordering::SeqCst);
        let mut health = self.health.lock().unwrap();
        let changed = *health != Health::Healthy;
        *health = Health::Healthy;
        drop(health);
        let _ = self.open_tx.send(true);
        changed
    }

    /// Records a failed contact. Returns `true` if the health state
    /// changed as a result, so callers only need to emit a status-change
    /// event on transitions rather than on every failure.
    pub fn heartbeat_failed(&self) -> bool {
        let count = self.failed_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut health = self.health.lock().unwrap();
        let previous = *health;

        let next = if count >= ALIVE_LIMIT {
            Health::Unhealthy
        } else if count >= SUSPECTED_LIMIT {
            Health::Suspected
        } else {
            previous
        };

        *health = next;
        drop(health);

        if next == Health::Unhealthy && previous != Health::Unhealthy {
            let _ = self.open_tx.send(false);
        }

        next != previous
    }

    /// Suspends until the follower is not unhealthy. Returns immediately
    /// if it already isn't.
    pub async fn wait_until_open(&self) {
        let mut rx = self.open_rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.wait_for(|open| *open).await;
    }
}
