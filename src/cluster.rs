use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{ClusterConfig, ElectionConfig};
use crate::error::{ElectionError, Result};
use crate::membership::Membership;
use crate::raft::{NodeId, NodeStatus, RaftNode};

/// Driver-side handle over a set of running nodes.
///
/// Owns the membership registry and the cluster-wide cancellation token and
/// passes both to every node it creates.
pub struct Cluster {
    config: ElectionConfig,
    membership: Arc<Membership>,
    cancel: CancellationToken,
    nodes: Vec<Arc<RaftNode>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Cluster {
    pub fn new(config: ElectionConfig) -> Result<Self> {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Build a cluster whose nodes stop when `cancel` fires
    pub fn with_cancellation(config: ElectionConfig, cancel: CancellationToken) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            membership: Arc::new(Membership::new()),
            cancel,
            nodes: Vec::new(),
            tasks: Vec::new(),
        })
    }

    pub fn membership(&self) -> &Arc<Membership> {
        &self.membership
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Create an unregistered, stopped node wired to this cluster
    pub fn create_node(&self, id: impl Into<NodeId>) -> Arc<RaftNode> {
        RaftNode::new(id, &self.membership, &self.cancel, self.config.clone())
    }

    /// Create, register and start a node.
    ///
    /// # Errors
    ///
    /// Returns [`ElectionError::DuplicateNode`] if the id was used before.
    pub fn spawn_node(&mut self, id: impl Into<NodeId>) -> Result<Arc<RaftNode>> {
        let node = self.create_node(id);
        self.membership.join(node.clone())?;
        tracing::info!(node_id = %node.id, members = self.membership.len(), "Node registered");
        Ok(self.start(node))
    }

    /// Add a node to a live cluster.
    ///
    /// Registration goes through the current leader (or any alive member when
    /// there is none) so the join is acknowledged by an existing node. The new
    /// node is created as a follower in term 0 and leaves registration in the
    /// registrar's term. With no alive member it registers directly in term 0.
    pub fn join_node(&mut self, id: impl Into<NodeId>) -> Result<Arc<RaftNode>> {
        let node = self.create_node(id);
        let registrar = self
            .leader()
            .or_else(|| self.nodes.iter().find(|n| n.is_alive()).cloned());

        match registrar {
            Some(existing) => existing.add_node(node.clone())?,
            None => {
                self.membership.join(node.clone())?;
            }
        }
        tracing::info!(node_id = %node.id, members = self.membership.len(), "Node joined");
        Ok(self.start(node))
    }

    fn start(&mut self, node: Arc<RaftNode>) -> Arc<RaftNode> {
        self.tasks.push(node.start());
        self.nodes.push(node.clone());
        node
    }

    /// Look up a node this cluster created
    pub fn node(&self, id: &str) -> Result<&Arc<RaftNode>> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| ElectionError::UnknownNode(id.to_string()))
    }

    pub fn nodes(&self) -> &[Arc<RaftNode>] {
        &self.nodes
    }

    pub fn simulate_failure(&self, id: &str) -> Result<()> {
        self.node(id)?.simulate_failure();
        Ok(())
    }

    /// Fail the current leader and return its id
    pub fn fail_leader(&self) -> Result<NodeId> {
        let leader = self.leader().ok_or(ElectionError::NoLeader)?;
        leader.simulate_failure();
        Ok(leader.id.clone())
    }

    /// Alive leader with the highest term. A stale leader from an older term
    /// can coexist briefly until the newer leader's heartbeat reaches it.
    pub fn leader(&self) -> Option<Arc<RaftNode>> {
        self.nodes
            .iter()
            .filter(|n| n.is_leader())
            .max_by_key(|n| n.current_term())
            .cloned()
    }

    pub fn statuses(&self) -> Vec<NodeStatus> {
        self.nodes.iter().map(|n| n.status()).collect()
    }

    pub fn alive_count(&self) -> usize {
        self.membership.alive_count()
    }

    /// Cancel every node loop and wait for them to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Node task ended abnormally");
            }
        }
    }
}

/// Final state of a driver scenario run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub failed_leader: Option<NodeId>,
    pub leader: Option<NodeStatus>,
    pub nodes: Vec<NodeStatus>,
}

/// Start `initial_nodes`, join `joining_nodes` after warmup, fail the leader
/// after the join settles, then let the cluster recover. Cancelling `cancel`
/// ends the current phase early and shuts the cluster down.
pub async fn run_scenario(
    config: &ClusterConfig,
    cancel: CancellationToken,
) -> Result<ScenarioReport> {
    config.validate()?;
    let mut cluster = Cluster::with_cancellation(config.election.clone(), cancel.clone())?;

    for n in 1..=config.initial_nodes {
        cluster.spawn_node(config.node_id(n))?;
    }
    tracing::info!(nodes = config.initial_nodes, "Cluster started");
    pause(&cancel, config.warmup_ms).await;

    let first_joiner = config.initial_nodes + 1;
    for n in first_joiner..first_joiner + config.joining_nodes {
        if cancel.is_cancelled() {
            break;
        }
        cluster.join_node(config.node_id(n))?;
    }
    pause(&cancel, config.join_settle_ms).await;

    let failed_leader = if cancel.is_cancelled() {
        None
    } else {
        match cluster.fail_leader() {
            Ok(id) => Some(id),
            Err(ElectionError::NoLeader) => {
                tracing::warn!("No leader to fail");
                None
            }
            Err(e) => return Err(e),
        }
    };
    pause(&cancel, config.recovery_ms).await;

    let report = ScenarioReport {
        failed_leader,
        leader: cluster.leader().map(|n| n.status()),
        nodes: cluster.statuses(),
    };
    cluster.shutdown().await;
    tracing::info!("Simulation ended");
    Ok(report)
}

async fn pause(cancel: &CancellationToken, ms: u64) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
    }
}
