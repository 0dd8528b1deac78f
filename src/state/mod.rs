//! Cluster state: per-follower health and the primary's quorum view.

mod cluster;
mod follower;

pub use cluster::ClusterView;
pub use follower::{FollowerHandle, Health};
