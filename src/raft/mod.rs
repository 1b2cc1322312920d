pub mod event;
pub mod node;
pub mod peer;
pub mod rpc;
pub mod state;
pub mod timer;

pub use event::{ElectionEvent, ElectionOutcome, NodeStatus};
pub use node::RaftNode;
pub use peer::Peer;
pub use state::{NodeId, RaftRole, RaftState};
