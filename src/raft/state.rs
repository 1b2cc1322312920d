use serde::Serialize;
use tokio::time::{Duration, Instant};

/// Unique, never reused node identifier
pub type NodeId = String;

/// Raft node role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RaftRole {
    Follower,
    Candidate,
    Leader,
}

impl std::fmt::Display for RaftRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RaftRole::Follower => write!(f, "follower"),
            RaftRole::Candidate => write!(f, "candidate"),
            RaftRole::Leader => write!(f, "leader"),
        }
    }
}

/// Election state of a single node. Only mutated under the owning node's lock.
///
/// # Election Safety
///
/// At most one leader can be elected in a given term. Enforced by:
/// - A vote is granted only for a term strictly greater than `current_term`,
///   and granting adopts that term, so a node answers yes at most once per term
/// - `voted_for` records the grant so a replayed request for the same term
///   is refused even from the candidate that already received the vote
/// - A candidate needs a strict majority of the nodes alive at tally time
///
/// `current_term` never decreases: every path that writes it either increments
/// it or adopts a term that was compared against it first.
#[derive(Debug, Clone)]
pub struct RaftState {
    pub current_term: u64,
    pub voted_for: Option<NodeId>,
    pub role: RaftRole,

    // Known leader (if any)
    pub leader_id: Option<NodeId>,

    // Votes received in the most recent election (for candidates)
    pub votes_received: u64,

    /// Last accepted heartbeat or granted vote
    pub last_heartbeat: Instant,
}

impl RaftState {
    pub fn new(now: Instant) -> Self {
        Self {
            current_term: 0,
            voted_for: None,
            role: RaftRole::Follower,
            leader_id: None,
            votes_received: 0,
            last_heartbeat: now,
        }
    }

    /// Time since the last accepted heartbeat or granted vote
    pub fn heartbeat_elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_heartbeat)
    }

    /// Transition to follower state, adopting `term` if it is newer.
    ///
    /// The vote record is cleared only when the term actually advances; an
    /// equal-term demotion keeps the vote already cast in this term.
    pub fn become_follower(&mut self, term: u64) {
        debug_assert!(term >= self.current_term, "term must not decrease");
        if term > self.current_term {
            self.current_term = term;
            self.voted_for = None;
            self.leader_id = None;
        }
        self.role = RaftRole::Follower;
        self.votes_received = 0;
    }

    /// Transition to candidate state for the next term, voting for self
    pub fn become_candidate(&mut self, my_id: &str) {
        self.role = RaftRole::Candidate;
        self.current_term += 1;
        self.voted_for = Some(my_id.to_string());
        self.votes_received = 1; // Vote for self
        self.leader_id = None;
    }

    /// Transition to leader state
    pub fn become_leader(&mut self, my_id: &str) {
        self.role = RaftRole::Leader;
        self.leader_id = Some(my_id.to_string());
    }

    pub fn is_leader(&self) -> bool {
        self.role == RaftRole::Leader
    }
}
