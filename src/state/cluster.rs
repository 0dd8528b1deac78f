//! The primary's view of its followers and the quorum-derived read-only flag.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::follower::{FollowerHandle, Health};

/// Owns every [`FollowerHandle`] plus the `read_only` flag that
/// `add_value` consults before accepting a write. `read_only` is mutated
/// only by the quorum event consumer (see `heartbeat` module) and read
/// lock-free here, since it is checked on every write request.
pub struct ClusterView {
    followers: HashMap<String, Arc<FollowerHandle>>,
    quorum_size: usize,
    read_only: AtomicBool,
}

impl ClusterView {
    pub fn new(secondaries: &HashMap<String, String>, quorum_size: usize) -> Self {
        let followers = secondaries
            .iter()
            .map(|(name, address)| {
                (
                    name.clone(),
                    Arc::new(FollowerHandle::new(name.clone(), address.clone())),
                )
            })
            .collect();

        let view = Self {
            followers,
            quorum_size,
            read_only: AtomicBool::new(false),
        };
        view.recompute_read_only();
        view
    }

    pub fn followers(&self) -> impl Iterator<Item = &Arc<FollowerHandle>> {
        self.followers.values()
    }

    pub fn follower(&self, name: &str) -> Option<&Arc<FollowerHandle>> {
        self.followers.get(name)
    }

    pub fn follower_count(&self) -> usize {
        self.followers.len()
    }

    /// 1 (self) plus every follower that is not unhealthy.
    pub fn alive_count(&self) -> usize {
        1 + self
            .followers
            .values()
            .filter(|f| f.health() != Health::Unhealthy)
            .count()
    }

    pub fn quorum_size(&self) -> usize {
        self.quorum_size
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    /// Recomputes `read_only` from current follower health. Called by the
    /// quorum event consumer whenever a follower's health changes; returns
    /// `true` if this call flipped the flag, so the caller can log the
    /// transition exactly once.
    pub fn recompute_read_only(&self) -> bool {
        let should_be_read_only = self.alive_count() < self.quorum_size;
        let previous = self.read_only.swap(should_be_read_only, Ordering::SeqCst);
        previous != should_be_read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secondaries(names: &[&str]) -> HashMap<String, String> {
        names
            .iter()
            .map(|n| (n.to_string(), format!("http://{n}")))
            .collect()
    }

    #[test]
    fn alive_count_includes_self() {
        let view = ClusterView::new(&secondaries(&["s1", "s2"]), 2);
        assert_eq!(view.alive_count(), 3);
        assert!(!view.is_read_only());
    }

    #[test]
    fn quorum_loss_marks_read_only() {
        let view = ClusterView::new(&secondaries(&["s1"]), 2);
        assert_eq!(view.alive_count(), 2);
        assert!(!view.is_read_only());

        let follower = view.follower("s1").unwrap();
        for _ in 0..5 {
            follower.heartbeat_failed();
        }
        assert!(follower.is_unhealthy());

        assert!(view.recompute_read_only());
        assert!(view.is_read_only());
        // idempotent: recomputing again with no health change reports no flip
        assert!(!view.recompute_read_only());
    }

    #[test]
    fn quorum_restored_clears_read_only() {
        let view = ClusterView::new(&secondaries(&["s1"]), 2);
        let follower = view.follower("s1").unwrap();
        for _ in 0..5 {
            follower.heartbeat_failed();
        }
        view.recompute_read_only();
        assert!(view.is_read_only());

        follower.mark_healthy();
        assert!(view.recompute_read_only());
        assert!(!view.is_read_only());
    }

    #[test]
    fn suspected_followers_still_count_as_alive() {
        let view = ClusterView::new(&secondaries(&["s1", "s2"]), 2);
        let follower = view.follower("s1").unwrap();
        follower.heartbeat_failed();
        follower.heartbeat_failed(); // suspected, not unhealthy
        assert_eq!(view.alive_count(), 3);
        assert!(!view.recompute_read_only());
    }
}
