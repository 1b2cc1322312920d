pub mod cluster;
pub mod config;
pub mod error;
pub mod membership;
pub mod quorum;
pub mod raft;
pub mod shutdown;

pub use cluster::Cluster;
pub use config::{ClusterConfig, ElectionConfig};
pub use error::{ElectionError, Result};
pub use membership::Membership;
pub use raft::{ElectionEvent, ElectionOutcome, NodeStatus, Peer, RaftNode, RaftRole};
