//! Dynamic membership tests: nodes joining a live cluster.


use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use raft_election::raft::{ElectionEvent, ElectionOutcome, RaftRole};
use raft_election::ElectionError;
use test_harness::{wait_for, TestCluster};

/// Test 1: A fourth node joins through the leader, takes the leader's term
/// at once and never takes over
#[tokio::test(start_paused = true)]
async fn test_joining_node_follows_current_leader() {
    let mut cluster = TestCluster::new(3);

    let leader_id = cluster
        .wait_for_leader(Duration::from_secs(5))
        .await
        .expect("Leader should be elected");
    let leader_term = cluster.get_node(&leader_id).current_term();

    let newcomer = cluster.join("n4");
    let status = newcomer.status();
    assert_eq!(status.role, RaftRole::Follower);
    assert_eq!(status.current_term, leader_term);
    assert_eq!(status.leader_id.as_deref(), Some(leader_id.as_str()));

    let roles = Arc::new(Mutex::new(Vec::new()));
    let mut rx = newcomer.watch();
    let seen = roles.clone();
    let watcher = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let role = rx.borrow_and_update().role;
            seen.lock().push(role);
        }
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(
        roles.lock().iter().all(|r| *r == RaftRole::Follower),
        "Newcomer must never campaign while heartbeats flow"
    );
    assert!(cluster.get_node(&leader_id).is_leader());
    assert_eq!(cluster.cluster.membership().alive_count(), 4);

    watcher.abort();
    cluster.shutdown().await;
}

/// Test 2: The join is acknowledged by the current leader
#[tokio::test(start_paused = true)]
async fn test_join_is_acknowledged_by_leader() {
    let mut cluster = TestCluster::new(3);

    let leader_id = cluster
        .wait_for_leader(Duration::from_secs(5))
        .await
        .expect("Leader should be elected");
    let mut events = cluster.get_node(&leader_id).subscribe();

    cluster.join("n4");

    let mut acknowledged = false;
    while let Ok(event) = events.try_recv() {
        if let ElectionEvent::NodeJoined { node_id, joined } = event {
            assert_eq!(node_id, leader_id);
            assert_eq!(joined, "n4");
            acknowledged = true;
        }
    }
    assert!(acknowledged, "Leader should acknowledge the new node");

    cluster.shutdown().await;
}

/// Test 3: Ids are never reused, not even for ghosts
#[tokio::test(start_paused = true)]
async fn test_duplicate_ids_are_rejected() {
    let cluster = TestCluster::new(2);
    cluster.cluster.simulate_failure("n1").unwrap();

    let mut inner = cluster.cluster;
    assert_eq!(
        inner.join_node("n1").unwrap_err(),
        ElectionError::DuplicateNode("n1".to_string())
    );
    assert_eq!(inner.membership().len(), 2);

    inner.shutdown().await;
}

/// Test 4: Many joins while elections and heartbeats are running
#[tokio::test(start_paused = true)]
async fn test_joins_during_elections() {
    let mut cluster = TestCluster::new(3);

    for i in 4..=12 {
        tokio::time::sleep(Duration::from_millis(37)).await;
        cluster.join(&format!("n{}", i));
    }

    let membership = cluster.cluster.membership().clone();
    assert_eq!(membership.len(), 12);
    assert_eq!(membership.generation(), 12);

    cluster
        .wait_for_leader(Duration::from_secs(10))
        .await
        .expect("Grown cluster should settle on a leader");
    cluster.log.assert_one_winner_per_term();

    // Everyone converges on the leader's term
    let leader = cluster.leaders()[0].clone();
    assert!(
        wait_for(
            || cluster.followers_of(&leader.id).len() == 11,
            Duration::from_secs(2),
            Duration::from_millis(10)
        )
        .await,
        "All other nodes should follow the leader"
    );

    cluster.shutdown().await;
}

/// Test 5: A join after the leader failed still lets survivors plus the
/// newcomer form a majority
#[tokio::test(start_paused = true)]
async fn test_join_after_failure_restores_quorum_size() {
    let mut cluster = TestCluster::new(3);

    let leader_id = cluster
        .wait_for_leader(Duration::from_secs(5))
        .await
        .expect("Leader should be elected");
    cluster.cluster.simulate_failure(&leader_id).unwrap();
    cluster.join("n4");

    assert_eq!(cluster.cluster.membership().len(), 4);
    assert_eq!(cluster.cluster.alive_count(), 3);

    let new_leader = cluster
        .wait_for_new_leader(&leader_id, Duration::from_secs(10))
        .await
        .expect("New leader should be elected");
    assert_ne!(new_leader, leader_id);
    cluster.log.assert_one_winner_per_term();

    cluster.shutdown().await;
}

/// Test 6: Joiners that outnumber the founders never elect a second leader
/// in a term that already has one
#[tokio::test(start_paused = true)]
async fn test_joiner_majority_respects_existing_leader() {
    let mut cluster = TestCluster::new(3);

    let leader_id = cluster
        .wait_for_leader(Duration::from_secs(5))
        .await
        .expect("Leader should be elected");
    let leader_term = cluster.get_node(&leader_id).current_term();

    for i in 4..=9 {
        let joiner = cluster.join(&format!("n{}", i));
        assert_eq!(joiner.current_term(), leader_term);
    }

    // Joiners campaign on their own before any heartbeat round reaches them
    for i in 4..=9 {
        let outcome = cluster.get_node(&format!("n{}", i)).start_election();
        if let ElectionOutcome::Won { term, .. } = outcome {
            assert!(term > leader_term, "won already decided term {}", term);
        }
    }
    for (term, leaders) in cluster.leaders_by_term() {
        assert!(leaders.len() <= 1, "term {} has leaders {:?}", term, leaders);
    }

    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(25)).await;
        for (term, leaders) in cluster.leaders_by_term() {
            assert!(leaders.len() <= 1, "term {} has leaders {:?}", term, leaders);
        }
    }
    cluster.log.assert_one_winner_per_term();

    cluster.shutdown().await;
}
