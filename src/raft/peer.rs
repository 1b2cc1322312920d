use crate::raft::event::NodeStatus;

/// The seam a node uses to talk to another cluster member.
///
/// The in-process implementation is [`RaftNode`](crate::raft::RaftNode)
/// itself; calls are synchronous and must return quickly because the caller
/// fans out to every peer sequentially. A transport-backed peer would
/// implement the same trait.
pub trait Peer: Send + Sync {
    fn id(&self) -> &str;

    /// Whether the peer participates in the protocol. Dead peers are skipped
    /// by broadcasts and excluded from majority counts.
    fn is_alive(&self) -> bool;

    /// Deliver a heartbeat for `term` from `leader_id`
    fn send_heartbeat(&self, term: u64, leader_id: &str);

    /// Ask for a vote in `term`; returns whether it was granted
    fn send_vote_request(&self, term: u64, candidate_id: &str) -> bool;

    /// Hand a freshly admitted peer the admitting member's term, so it cannot
    /// vote in terms that were already decided before it joined
    fn send_term_sync(&self, term: u64);

    /// Lock-free snapshot of the peer's observable state
    fn status(&self) -> NodeStatus;
}
