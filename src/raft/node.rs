use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ElectionConfig;
use crate::error::{ElectionError, Result};
use crate::membership::Membership;
use crate::quorum::{has_majority, majority};
use crate::raft::event::{ElectionEvent, ElectionOutcome, NodeStatus};
use crate::raft::peer::Peer;
use crate::raft::rpc::{handle_heartbeat, handle_request_vote, handle_term_sync};
use crate::raft::state::{NodeId, RaftRole, RaftState};
use crate::raft::timer::ElectionTimer;

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// A single election participant.
///
/// All term/role/heartbeat mutations happen under `state`. The lock is never
/// held while calling into a peer, so two candidates canvassing each other
/// cannot deadlock; a candidate instead re-checks its term before tallying.
pub struct RaftNode {
    pub id: NodeId,
    state: Mutex<RaftState>,
    alive: AtomicBool,
    config: ElectionConfig,
    membership: Weak<Membership>,
    /// Child of the cluster-wide token; also cancelled by `simulate_failure`
    halt: CancellationToken,
    status_tx: watch::Sender<NodeStatus>,
    events_tx: broadcast::Sender<ElectionEvent>,
}

impl RaftNode {
    /// Create a follower in term 0. The node is not registered or started;
    /// see [`Membership::join`] and [`RaftNode::start`].
    pub fn new(
        id: impl Into<NodeId>,
        membership: &Arc<Membership>,
        cancel: &CancellationToken,
        config: ElectionConfig,
    ) -> Arc<Self> {
        let id = id.into();
        let state = RaftState::new(Instant::now());
        let (status_tx, _) = watch::channel(NodeStatus::from_state(&id, &state, true));
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Arc::new(Self {
            id,
            state: Mutex::new(state),
            alive: AtomicBool::new(true),
            config,
            membership: Arc::downgrade(membership),
            halt: cancel.child_token(),
            status_tx,
            events_tx,
        })
    }

    /// Spawn the scheduling loop on the current runtime
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            node.run().await;
        })
    }

    /// Run the node's scheduling loop until cancellation or failure.
    ///
    /// Leaders broadcast then sleep the heartbeat interval. Everyone else
    /// sleeps a randomized timeout and campaigns if the heartbeat deadline
    /// passed in the meantime.
    pub async fn run(&self) {
        let mut timer = ElectionTimer::new(&self.config, &self.id);
        tracing::info!(node_id = %self.id, "Node started");

        loop {
            if self.halt.is_cancelled() || !self.is_alive() {
                break;
            }

            let role = self.state.lock().role;
            if role == RaftRole::Leader {
                self.send_heartbeats();
                tokio::select! {
                    _ = self.halt.cancelled() => break,
                    _ = tokio::time::sleep(timer.heartbeat_interval()) => {}
                }
            } else {
                let wait = timer.next_election_timeout();
                tokio::select! {
                    _ = self.halt.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                let elapsed = self.state.lock().heartbeat_elapsed(Instant::now());
                if timer.deadline_passed(elapsed) {
                    tracing::info!(
                        node_id = %self.id,
                        ?elapsed,
                        "No heartbeat within deadline, starting election"
                    );
                    if self.start_election() == ElectionOutcome::Halted {
                        break;
                    }
                }
            }
        }

        tracing::debug!(node_id = %self.id, alive = self.is_alive(), "Node loop exited");
    }

    /// Campaign for the next term.
    ///
    /// Votes are requested sequentially from every peer alive at the start of
    /// the attempt; the tally is compared against the alive set at tally time.
    pub fn start_election(&self) -> ElectionOutcome {
        let Ok(membership) = self.membership() else {
            tracing::warn!(node_id = %self.id, "Membership dropped, not campaigning");
            return ElectionOutcome::Halted;
        };

        let term = {
            let mut state = self.state.lock();
            if !self.is_alive() {
                return ElectionOutcome::Halted;
            }
            state.become_candidate(&self.id);
            self.publish(&state);
            state.current_term
        };

        tracing::info!(node_id = %self.id, term, "Starting election");
        self.emit(ElectionEvent::ElectionStarted {
            node_id: self.id.clone(),
            term,
        });

        let roster = membership.snapshot();
        let mut votes = 1u64; // Vote for self
        for peer in roster.alive_peers(&self.id) {
            if peer.send_vote_request(term, &self.id) {
                votes += 1;
                tracing::debug!(node_id = %self.id, peer_id = %peer.id(), votes, "Received vote");
            }
        }

        let alive = membership.snapshot().alive_peers(&self.id).count() + 1;

        let mut state = self.state.lock();
        if !self.is_alive() {
            return ElectionOutcome::Halted;
        }
        if state.role != RaftRole::Candidate || state.current_term != term {
            drop(state);
            tracing::info!(node_id = %self.id, term, "Election superseded by a newer term");
            self.emit(ElectionEvent::ElectionSuperseded {
                node_id: self.id.clone(),
                term,
            });
            return ElectionOutcome::Superseded { term };
        }

        state.votes_received = votes;
        if has_majority(votes, alive) {
            state.become_leader(&self.id);
            self.publish(&state);
            drop(state);
            tracing::info!(node_id = %self.id, term, votes, alive, "Became leader");
            self.emit(ElectionEvent::ElectionWon {
                node_id: self.id.clone(),
                term,
                votes,
            });
            ElectionOutcome::Won { term, votes }
        } else {
            state.become_follower(term);
            self.publish(&state);
            drop(state);
            tracing::info!(
                node_id = %self.id,
                term,
                votes,
                alive,
                needed = majority(alive),
                "Election failed, not enough votes"
            );
            self.emit(ElectionEvent::ElectionLost {
                node_id: self.id.clone(),
                term,
                votes,
                alive,
            });
            ElectionOutcome::Lost { term, votes, alive }
        }
    }

    /// Broadcast a heartbeat to every alive peer (leader only).
    /// Returns the number of peers contacted.
    pub fn send_heartbeats(&self) -> usize {
        let term = {
            let state = self.state.lock();
            if !self.is_alive() || !state.is_leader() {
                return 0;
            }
            state.current_term
        };

        let Ok(membership) = self.membership() else {
            return 0;
        };

        let roster = membership.snapshot();
        let mut peers = 0;
        for peer in roster.alive_peers(&self.id) {
            peer.send_heartbeat(term, &self.id);
            peers += 1;
        }

        tracing::debug!(node_id = %self.id, term, peers, "Sent heartbeats");
        self.emit(ElectionEvent::HeartbeatsSent {
            node_id: self.id.clone(),
            term,
            peers,
        });
        peers
    }

    /// Handle a heartbeat from `leader_id`. No effect on a failed node or for
    /// a term lower than ours.
    pub fn receive_heartbeat(&self, term: u64, leader_id: &str) {
        let mut state = self.state.lock();
        if !self.is_alive() {
            return;
        }

        let previous = state.role;
        if !handle_heartbeat(&mut state, term, leader_id, Instant::now()) {
            tracing::trace!(node_id = %self.id, term, current_term = state.current_term, "Ignored stale heartbeat");
            return;
        }
        self.publish(&state);
        drop(state);

        if previous != RaftRole::Follower {
            tracing::info!(node_id = %self.id, leader_id, term, role = %previous, "Stepping down");
        }
        tracing::debug!(node_id = %self.id, leader_id, term, "Received heartbeat");
        self.emit(ElectionEvent::HeartbeatAccepted {
            node_id: self.id.clone(),
            leader_id: leader_id.to_string(),
            term,
        });
    }

    /// Handle a vote request. Granted only for a term strictly greater than
    /// ours, and never by a failed node.
    pub fn request_vote(&self, term: u64, candidate_id: &str) -> bool {
        let mut state = self.state.lock();
        if !self.is_alive() {
            return false;
        }

        let granted = handle_request_vote(&mut state, term, candidate_id, Instant::now());
        if granted {
            self.publish(&state);
        }
        drop(state);

        tracing::debug!(node_id = %self.id, candidate_id, term, granted, "RequestVote response");
        if granted {
            self.emit(ElectionEvent::VoteGranted {
                node_id: self.id.clone(),
                candidate_id: candidate_id.to_string(),
                term,
            });
        }
        granted
    }

    /// Mark the node failed. It stays registered as a ghost, stops its loop
    /// and ignores all further protocol calls. Irreversible.
    pub fn simulate_failure(&self) {
        let state = self.state.lock();
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        self.publish(&state);
        let term = state.current_term;
        drop(state);

        self.halt.cancel();
        tracing::warn!(node_id = %self.id, term, "Node failed");
        self.emit(ElectionEvent::Failed {
            node_id: self.id.clone(),
            term,
        });
    }

    /// Register `peer` into the shared membership on behalf of the cluster.
    ///
    /// The newcomer is then brought up to this node's term: a leader sends it
    /// a heartbeat, anyone else a term sync. A joiner therefore never grants a
    /// vote for a term that may already have a leader.
    ///
    /// # Errors
    ///
    /// Returns [`ElectionError::DuplicateNode`] if the id is taken, or
    /// [`ElectionError::RegistryClosed`] if the membership was dropped.
    pub fn add_node(&self, peer: Arc<dyn Peer>) -> Result<()> {
        let membership = self.membership()?;
        let joined = peer.id().to_string();
        membership.join(peer.clone())?;

        let (term, leading) = {
            let state = self.state.lock();
            (state.current_term, self.is_alive() && state.is_leader())
        };
        if leading {
            peer.send_heartbeat(term, &self.id);
        } else if self.is_alive() {
            peer.send_term_sync(term);
        }

        tracing::info!(node_id = %self.id, joined = %joined, term, "Acknowledged new node");
        self.emit(ElectionEvent::NodeJoined {
            node_id: self.id.clone(),
            joined,
        });
        Ok(())
    }

    /// Catch up to a term learned from the member that admitted this node
    pub fn adopt_term(&self, term: u64) {
        let mut state = self.state.lock();
        if !self.is_alive() || !handle_term_sync(&mut state, term) {
            return;
        }
        self.publish(&state);
        drop(state);

        tracing::debug!(node_id = %self.id, term, "Adopted term on admission");
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Latest published status; does not touch the state lock
    pub fn status(&self) -> NodeStatus {
        self.status_tx.borrow().clone()
    }

    /// Watch status changes
    pub fn watch(&self) -> watch::Receiver<NodeStatus> {
        self.status_tx.subscribe()
    }

    /// Subscribe to protocol events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ElectionEvent> {
        self.events_tx.subscribe()
    }

    pub fn current_term(&self) -> u64 {
        self.status_tx.borrow().current_term
    }

    pub fn role(&self) -> RaftRole {
        self.status_tx.borrow().role
    }

    pub fn is_leader(&self) -> bool {
        self.status_tx.borrow().is_leader()
    }

    /// Time of the last accepted heartbeat or granted vote
    pub fn last_heartbeat(&self) -> Instant {
        self.state.lock().last_heartbeat
    }

    fn membership(&self) -> Result<Arc<Membership>> {
        self.membership.upgrade().ok_or(ElectionError::RegistryClosed)
    }

    // Caller holds the state lock, so published statuses are totally ordered
    fn publish(&self, state: &RaftState) {
        let next = NodeStatus::from_state(&self.id, state, self.is_alive());
        self.status_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn emit(&self, event: ElectionEvent) {
        // No subscribers is fine
        let _ = self.events_tx.send(event);
    }
}

impl Peer for RaftNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_alive(&self) -> bool {
        RaftNode::is_alive(self)
    }

    fn send_heartbeat(&self, term: u64, leader_id: &str) {
        self.receive_heartbeat(term, leader_id);
    }

    fn send_vote_request(&self, term: u64, candidate_id: &str) -> bool {
        self.request_vote(term, candidate_id)
    }

    fn send_term_sync(&self, term: u64) {
        self.adopt_term(term);
    }

    fn status(&self) -> NodeStatus {
        RaftNode::status(self)
    }
}

impl std::fmt::Debug for RaftNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaftNode")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}
