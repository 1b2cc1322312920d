//! Append-only cluster membership registry.
//!
//! Readers take a cheap snapshot (an `Arc` clone under a short read lock) and
//! iterate it without holding any lock, so heartbeat broadcasts and majority
//! counts never contend with a concurrent join beyond that clone. Joins copy
//! the roster, append and publish a new generation. Entries are never removed:
//! a failed node stays as a ghost that is filtered out by [`Peer::is_alive`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ElectionError, Result};
use crate::raft::{NodeStatus, Peer};

/// Immutable view of the membership at one generation
pub struct Roster {
    generation: u64,
    members: Vec<Arc<dyn Peer>>,
    index: HashMap<String, usize>,
}

impl Roster {
    fn empty() -> Self {
        Self {
            generation: 0,
            members: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Peer>> {
        self.index.get(id).map(|&i| &self.members[i])
    }

    /// All members in join order, ghosts included
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Peer>> {
        self.members.iter()
    }

    /// Alive members other than `self_id`
    pub fn alive_peers<'a>(&'a self, self_id: &'a str) -> impl Iterator<Item = &'a Arc<dyn Peer>> {
        self.members
            .iter()
            .filter(move |p| p.id() != self_id && p.is_alive())
    }

    pub fn alive_count(&self) -> usize {
        self.members.iter().filter(|p| p.is_alive()).count()
    }
}

/// Shared, ever-growing set of node handles
pub struct Membership {
    roster: RwLock<Arc<Roster>>,
}

impl Membership {
    pub fn new() -> Self {
        Self {
            roster: RwLock::new(Arc::new(Roster::empty())),
        }
    }

    /// Current roster; stays valid (and unchanged) after later joins
    pub fn snapshot(&self) -> Arc<Roster> {
        self.roster.read().clone()
    }

    /// Register a node.
    ///
    /// # Errors
    ///
    /// Returns [`ElectionError::DuplicateNode`] if the id is already present,
    /// alive or not; ids are never reused.
    pub fn join(&self, peer: Arc<dyn Peer>) -> Result<u64> {
        let mut roster = self.roster.write();
        let id = peer.id().to_string();
        if roster.index.contains_key(&id) {
            return Err(ElectionError::DuplicateNode(id));
        }

        let mut members = roster.members.clone();
        let mut index = roster.index.clone();
        index.insert(id, members.len());
        members.push(peer);

        let generation = roster.generation + 1;
        *roster = Arc::new(Roster {
            generation,
            members,
            index,
        });
        Ok(generation)
    }

    pub fn generation(&self) -> u64 {
        self.roster.read().generation
    }

    pub fn len(&self) -> usize {
        self.roster.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.read().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.roster.read().index.contains_key(id)
    }

    pub fn alive_count(&self) -> usize {
        self.snapshot().alive_count()
    }

    /// Status of every member in join order
    pub fn statuses(&self) -> Vec<NodeStatus> {
        self.snapshot().iter().map(|p| p.status()).collect()
    }
}

impl Default for Membership {
    fn default() -> Self {
        Self::new()
    }
}
