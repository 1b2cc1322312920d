use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use crate::config::ElectionConfig;

/// Per-node timing policy: the only source of timing nondeterminism.
#[derive(Debug)]
pub struct ElectionTimer {
    rng: StdRng,
    min_ms: u64,
    max_ms: u64,
    heartbeat_interval: Duration,
    heartbeat_timeout: Duration,
}

impl ElectionTimer {
    /// Builds a timer for `node_id`. With a configured seed, each node gets its
    /// own reproducible stream so runs can be replayed.
    pub fn new(config: &ElectionConfig, node_id: &str) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ id_salt(node_id)),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            min_ms: config.election_timeout_min_ms,
            max_ms: config.election_timeout_max_ms,
            heartbeat_interval: config.heartbeat_interval(),
            heartbeat_timeout: config.heartbeat_timeout(),
        }
    }

    /// Next randomized follower wait
    pub fn next_election_timeout(&mut self) -> Duration {
        Duration::from_millis(self.rng.gen_range(self.min_ms..=self.max_ms))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Whether `elapsed` since the last heartbeat exceeds the deadline
    pub fn deadline_passed(&self, elapsed: Duration) -> bool {
        elapsed > self.heartbeat_timeout
    }
}

// FNV-1a, stable across builds unlike the std hasher
fn id_salt(node_id: &str) -> u64 {
    node_id.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
