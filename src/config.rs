use std::time::Duration;

use crate::error::{ElectionError, Result};

/// Timing policy shared by every node in a cluster.
///
/// Followers sleep a uniformly random duration in
/// `[election_timeout_min_ms, election_timeout_max_ms]` per loop iteration and
/// then start an election if nothing was heard for `heartbeat_timeout_ms`.
/// Leaders broadcast every `heartbeat_interval_ms`, which must stay below both
/// the deadline and the minimum wait so a healthy leader suppresses elections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionConfig {
    pub election_timeout_min_ms: u64,
    pub election_timeout_max_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Seed for the per-node timeout generators. `None` draws from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            election_timeout_min_ms: 1500,
            election_timeout_max_ms: 3000,
            heartbeat_timeout_ms: 2000,
            heartbeat_interval_ms: 1000,
            rng_seed: None,
        }
    }
}

impl ElectionConfig {
    pub fn with_election_timeout(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.election_timeout_min_ms = min_ms;
        self.election_timeout_max_ms = max_ms;
        self
    }

    pub fn with_heartbeat(mut self, interval_ms: u64, timeout_ms: u64) -> Self {
        self.heartbeat_interval_ms = interval_ms;
        self.heartbeat_timeout_ms = timeout_ms;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    /// Upper bound on how long a follower can go without noticing a dead leader.
    pub fn max_detection_delay(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms + self.election_timeout_max_ms)
    }

    /// Validates the timing policy.
    ///
    /// # Errors
    ///
    /// Returns [`ElectionError::InvalidConfig`] if:
    /// - the election timeout range is empty or starts at zero
    /// - the heartbeat interval is zero
    /// - the heartbeat interval is not shorter than the heartbeat timeout
    /// - the heartbeat interval is not shorter than the minimum election timeout
    pub fn validate(&self) -> Result<()> {
        if self.election_timeout_min_ms == 0 {
            return Err(ElectionError::InvalidConfig(
                "election_timeout_min_ms must be > 0".to_string(),
            ));
        }
        if self.election_timeout_min_ms > self.election_timeout_max_ms {
            return Err(ElectionError::InvalidConfig(format!(
                "election_timeout_min_ms ({}) must be <= election_timeout_max_ms ({})",
                self.election_timeout_min_ms, self.election_timeout_max_ms
            )));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ElectionError::InvalidConfig(
                "heartbeat_interval_ms must be > 0".to_string(),
            ));
        }
        if self.heartbeat_interval_ms >= self.heartbeat_timeout_ms {
            return Err(ElectionError::InvalidConfig(format!(
                "heartbeat_interval_ms ({}) must be < heartbeat_timeout_ms ({})",
                self.heartbeat_interval_ms, self.heartbeat_timeout_ms
            )));
        }
        if self.heartbeat_interval_ms >= self.election_timeout_min_ms {
            return Err(ElectionError::InvalidConfig(format!(
                "heartbeat_interval_ms ({}) must be < election_timeout_min_ms ({})",
                self.heartbeat_interval_ms, self.election_timeout_min_ms
            )));
        }
        Ok(())
    }
}

/// Scenario driven by the `raft-election` binary.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub election: ElectionConfig,
    /// Nodes started before the warmup phase
    pub initial_nodes: usize,
    /// Nodes joined at runtime after warmup
    pub joining_nodes: usize,
    pub warmup_ms: u64,
    pub join_settle_ms: u64,
    pub recovery_ms: u64,
    /// Node ids are `{prefix}{n}`, starting at 1
    pub id_prefix: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            election: ElectionConfig::default(),
            initial_nodes: 3,
            joining_nodes: 2,
            warmup_ms: 5000,
            join_settle_ms: 7000,
            recovery_ms: 10000,
            id_prefix: "Node-".to_string(),
        }
    }
}

impl ClusterConfig {
    pub fn node_id(&self, n: usize) -> String {
        format!("{}{}", self.id_prefix, n)
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_nodes == 0 {
            return Err(ElectionError::InvalidConfig(
                "initial_nodes must be > 0".to_string(),
            ));
        }
        self.election.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn election_config_default() {
        let cfg = ElectionConfig::default();
        assert_eq!(cfg.election_timeout_min_ms, 1500);
        assert_eq!(cfg.election_timeout_max_ms, 3000);
        assert_eq!(cfg.heartbeat_timeout_ms, 2000);
        assert_eq!(cfg.heartbeat_interval_ms, 1000);
        assert!(cfg.rng_seed.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn election_config_builders() {
        let cfg = ElectionConfig::default()
            .with_election_timeout(150, 300)
            .with_heartbeat(50, 200)
            .with_seed(7);
        assert_eq!(cfg.election_timeout_min_ms, 150);
        assert_eq!(cfg.election_timeout_max_ms, 300);
        assert_eq!(cfg.heartbeat_interval(), Duration::from_millis(50));
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_millis(200));
        assert_eq!(cfg.rng_seed, Some(7));
        assert_eq!(cfg.max_detection_delay(), Duration::from_millis(500));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_timeout_range() {
        let cfg = ElectionConfig::default().with_election_timeout(3000, 1500);
        assert!(matches!(
            cfg.validate(),
            Err(ElectionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_zero_values() {
        let cfg = ElectionConfig::default().with_election_timeout(0, 100);
        assert!(cfg.validate().is_err());

        let cfg = ElectionConfig::default().with_heartbeat(0, 2000);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_heartbeat_not_shorter_than_deadline() {
        let cfg = ElectionConfig::default().with_heartbeat(2000, 2000);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_heartbeat_not_shorter_than_min_timeout() {
        let cfg = ElectionConfig::default()
            .with_election_timeout(500, 1000)
            .with_heartbeat(600, 2000);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn cluster_config_default() {
        let cfg = ClusterConfig::default();
        assert_eq!(cfg.initial_nodes, 3);
        assert_eq!(cfg.joining_nodes, 2);
        assert_eq!(cfg.node_id(4), "Node-4");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn cluster_config_requires_nodes() {
        let cfg = ClusterConfig {
            initial_nodes: 0,
            ..ClusterConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
