use tokio::time::Instant;

use crate::raft::state::RaftState;

/// Handle a leader heartbeat.
///
/// Accepted when `term >= current_term`: the node adopts the term, follows
/// `leader_id` and restarts its timeout window. Lower terms are ignored.
/// Returns whether the heartbeat was accepted.
pub fn handle_heartbeat(state: &mut RaftState, term: u64, leader_id: &str, now: Instant) -> bool {
    if term < state.current_term {
        return false;
    }

    state.become_follower(term);
    state.leader_id = Some(leader_id.to_string());
    state.last_heartbeat = now;
    true
}

/// Handle a RequestVote call.
///
/// Unlike heartbeats a vote needs a strictly greater term. Granting adopts the
/// term, records the vote and restarts the timeout window, so a second request
/// for the same term (from any candidate) is refused.
pub fn handle_request_vote(
    state: &mut RaftState,
    term: u64,
    candidate_id: &str,
    now: Instant,
) -> bool {
    if term <= state.current_term {
        return false;
    }

    state.become_follower(term);
    state.voted_for = Some(candidate_id.to_string());
    state.last_heartbeat = now;
    true
}

/// Handle the term handed over by the member that admitted this node.
///
/// Adopts `term` as a follower when it is newer. Names no leader and leaves
/// the timeout window alone. Returns whether the term advanced.
pub fn handle_term_sync(state: &mut RaftState, term: u64) -> bool {
    if term <= state.current_term {
        return false;
    }

    state.become_follower(term);
    true
}
