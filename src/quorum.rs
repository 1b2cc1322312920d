//! Majority arithmetic over the alive set.
//!
//! Failed nodes stay registered but are left out of the denominator, so a
//! minority of failures never blocks an election.

/// Smallest vote count that is a strict majority of `alive` nodes
pub fn majority(alive: usize) -> usize {
    alive / 2 + 1
}

/// Whether `votes` (self-vote included) is a strict majority of `alive`
pub fn has_majority(votes: u64, alive: usize) -> bool {
    votes > (alive / 2) as u64
}
