//! Heartbeat probing and the quorum event consumer.
//!
//! Each follower gets its own repeating probe task; probes never touch
//! `read_only` directly. Instead a status change pushes an event onto a
//! single serialized queue, and one consumer task recomputes `read_only`
//! from scratch. Serializing through one consumer means two probes
//! completing at the same instant can never race on the flag, and the
//! resulting log lines come out in the same order the state actually
//! changed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::state::ClusterView;

/// Emitted by a probe task whenever a follower's health changes.
struct StatusChanged {
    follower: String,
}

pub struct HeartbeatController {
    probe_handles: Vec<tokio::task::JoinHandle<()>>,
    consumer_handle: Option<tokio::task::JoinHandle<()>>,
    event_tx: mpsc::Sender<Option<StatusChanged>>,
}

impl HeartbeatController {
    /// Spawns a probe task per follower plus the quorum consumer task.
    /// Call [`HeartbeatController::shutdown`] to stop them.
    pub fn start(cluster: Arc<ClusterView>, client: reqwest::Client, interval: Duration) -> Self {
        let (event_tx, event_rx) = mpsc::channel(64);

        let mut probe_handles = Vec::new();
        for follower in cluster.followers() {
            let follower = follower.clone();
            let client = client.clone();
            let tx = event_tx.clone();
            probe_handles.push(tokio::spawn(async move {
                probe_loop(follower, client, interval, tx).await;
            }));
        }

        let consumer_handle = tokio::spawn(async move {
            consume_events(cluster, event_rx).await;
        });

        Self {
            probe_handles,
            consumer_handle: Some(consumer_handle),
            event_tx,
        }
    }

    pub async fn shutdown(mut self) {
        for handle in self.probe_handles.drain(..) {
            handle.abort();
        }
        let _ = self.event_tx.send(None).await;
        if let Some(handle) = self.consumer_handle.take() {
            let _ = handle.await;
        }
    }
}

async fn probe_loop(
    follower: Arc<crate::state::FollowerHandle>,
    client: reqwest::Client,
    interval: Duration,
    event_tx: mpsc::Sender<Option<StatusChanged>>,
) {
    let mut ticker = tokio::time::interval(interval);
    let probe_timeout = interval / 2;

    loop {
        ticker.tick().await;

        let url = format!("{}/heartbeat", follower.address);
        let result = client.get(&url).timeout(probe_timeout).send().await;

        let changed = match result {
            Ok(resp) if resp.status().is_success() => follower.mark_healthy(),
            _ => follower.heartbeat_failed(),
        };

        if changed {
            let _ = event_tx
                .send(Some(StatusChanged {
                    follower: follower.name.clone(),
                }))
                .await;
        }
    }
}

async fn consume_events(cluster: Arc<ClusterView>, mut event_rx: mpsc::Receiver<Option<StatusChanged>>) {
    while let Some(event) = event_rx.recv().await {
        let Some(event) = event else {
            break;
        };

        let flipped = cluster.recompute_read_only();
        if flipped {
            if cluster.is_read_only() {
                tracing::warn!(follower = %event.follower, "quorum lost, primary entering read-only mode");
            } else {
                tracing::info!(follower = %event.follower, "quorum restored, primary accepting writes again");
            }
        }
    }
}
