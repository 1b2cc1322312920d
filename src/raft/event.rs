use serde::Serialize;

use crate::raft::state::{NodeId, RaftRole, RaftState};

/// Read-only snapshot of a node, published after every state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub id: NodeId,
    pub role: RaftRole,
    pub current_term: u64,
    pub alive: bool,
    pub leader_id: Option<NodeId>,
    pub voted_for: Option<NodeId>,
    /// Votes behind the current candidacy or leadership; 0 for followers
    pub votes_received: u64,
}

impl NodeStatus {
    pub fn from_state(id: &str, state: &RaftState, alive: bool) -> Self {
        Self {
            id: id.to_string(),
            role: state.role,
            current_term: state.current_term,
            alive,
            leader_id: state.leader_id.clone(),
            voted_for: state.voted_for.clone(),
            votes_received: state.votes_received,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.alive && self.role == RaftRole::Leader
    }
}

/// Structured protocol events emitted by a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ElectionEvent {
    ElectionStarted {
        node_id: NodeId,
        term: u64,
    },
    ElectionWon {
        node_id: NodeId,
        term: u64,
        votes: u64,
    },
    ElectionLost {
        node_id: NodeId,
        term: u64,
        votes: u64,
        alive: usize,
    },
    /// A higher or equal term arrived while votes were being collected
    ElectionSuperseded {
        node_id: NodeId,
        term: u64,
    },
    HeartbeatsSent {
        node_id: NodeId,
        term: u64,
        peers: usize,
    },
    HeartbeatAccepted {
        node_id: NodeId,
        leader_id: NodeId,
        term: u64,
    },
    VoteGranted {
        node_id: NodeId,
        candidate_id: NodeId,
        term: u64,
    },
    NodeJoined {
        node_id: NodeId,
        joined: NodeId,
    },
    Failed {
        node_id: NodeId,
        term: u64,
    },
}

/// Result of a single election attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionOutcome {
    Won { term: u64, votes: u64 },
    Lost { term: u64, votes: u64, alive: usize },
    Superseded { term: u64 },
    /// The node is not alive and did not campaign
    Halted,
}

impl ElectionOutcome {
    pub fn is_won(&self) -> bool {
        matches!(self, ElectionOutcome::Won { .. })
    }
}
