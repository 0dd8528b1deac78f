//! Fan-out replication from primary to secondaries.
//!
//! [`Replicator::replicate`] dispatches one task per follower and returns
//! to the caller once `write_concern - 1` of them have acknowledged,
//! using a semaphore as a count-down barrier. Tasks that haven't acked
//! yet keep retrying in the background after the caller returns; a late
//! ack just adds an unconsumed permit, which is harmless.

use std::sync::Arc;
use std::time::Duration;

use crate::state::{ClusterView, FollowerHandle};
use tokio::sync::Semaphore;

/// Backoff schedule in seconds between follower retry attempts, matching
/// the cadence the original system used; the last value repeats once
/// reached.
const BACKOFF_SCHEDULE_SECS: &[u64] = &[1, 2, 5, 10, 30, 60, 90, 180, 300];

fn backoff_for_attempt(attempt: usize) -> Duration {
    let idx = attempt.min(BACKOFF_SCHEDULE_SECS.len() - 1);
    Duration::from_secs(BACKOFF_SCHEDULE_SECS[idx])
}

#[derive(Debug, Clone, serde::Serialize)]
struct SetValueRequest {
    key: u64,
    value: String,
}

pub struct Replicator {
    client: reqwest::Client,
    /// Caps retry attempts per follower per entry; 0 means unbounded, the
    /// production default. Tests set this to bound run time.
    max_iterations: usize,
}

impl Replicator {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            max_iterations: 0,
        }
    }

    pub fn with_max_iterations(client: reqwest::Client, max_iterations: usize) -> Self {
        Self {
            client,
            max_iterations,
        }
    }

    /// Replicates `(key, value)` to every follower in `cluster`, returning
    /// once `write_concern - 1` of them have acknowledged (the primary
    /// itself counts as the 1st). `write_concern` of 1 returns immediately
    /// without waiting on any follower.
    pub async fn replicate(&self, cluster: &Arc<ClusterView>, key: u64, value: &str, write_concern: usize) {
        let needed_acks = write_concern.saturating_sub(1);

        let barrier = Arc::new(Semaphore::new(0));

        for follower in cluster.followers() {
            let follower = follower.clone();
            let barrier = barrier.clone();
            let client = self.client.clone();
            let value = value.to_string();
            let max_iterations = self.max_iterations;

            tokio::spawn(async move {
                replicate_to_one(client, follower, key, value, barrier, max_iterations).await;
            });
        }

        if needed_acks == 0 {
            return;
        }

        // `acquire_many` on a semaphore that never reaches `needed_acks`
        // permits would hang the caller forever; the spec accepts this as
        // the intended backpressure when too few followers exist to
        // satisfy the requested write concern; callers validate
        // `write_concern <= followers + 1` before calling in here.
        let _ = barrier.acquire_many(needed_acks as u32).await;
    }
}

async fn replicate_to_one(
    client: reqwest::Client,
    follower: Arc<FollowerHandle>,
    key: u64,
    value: String,
    barrier: Arc<Semaphore>,
    max_iterations: usize,
) {
    let mut attempt = 0usize;
    loop {
        follower.wait_until_open().await;

        let timeout = backoff_for_attempt(attempt);
        let url = format!("{}/message", follower.address);
        let body = SetValueRequest { key, value: value.clone() };

        let result = client
            .put(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(follower = %follower.name, key, "replication ack");
                barrier.add_permits(1);
                return;
            }
            Ok(resp) => {
                tracing::debug!(follower = %follower.name, key, status = %resp.status(), "replication rejected");
            }
            Err(err) => {
                tracing::debug!(follower = %follower.name, key, error = %err, "replication transport error");
            }
        }

        attempt += 1;
        if max_iterations > 0 && attempt >= max_iterations {
            tracing::warn!(follower = %follower.name, key, "giving up replication after max attempts");
            return;
        }

        tokio::time::sleep(backoff_for_attempt(attempt)).await;
    }
}
