//! Instance shutdown tests.
//!
//! These tests verify that an instance whose presence node is evicted
//! stops its scheduler and gives up leadership, while instances that
//! leave on purpose clean up after themselves.

mod test_harness;

use std::time::Duration;

use shard_lite::job::JobConfiguration;
use shard_lite::reg::CoordinatorRegistry;
use test_harness::{assert_eventually, TestFleet};

fn job() -> JobConfiguration {
    JobConfiguration::new("billing", "com.example.BillingJob", 4)
}

/// Test 1: An expired session shuts the instance's scheduler down
#[tokio::test]
async fn test_expired_session_shuts_down_scheduler() {
    let fleet = TestFleet::new(2, job()).await;
    let node = fleet.get_node(2).unwrap();
    assert!(!node.is_shutdown().await);

    fleet.registry.expire_session(node.session.id()).await;

    assert_eventually(
        || async { node.is_shutdown().await },
        Duration::from_secs(2),
        "Evicted instance should shut its scheduler down",
    )
    .await;
    assert!(node.node.controller().is_shut_down());
    assert!(!fleet.get_node(1).unwrap().is_shutdown().await);

    fleet.shutdown().await;
}

/// Test 2: An evicted leader vacates leadership for the rest of the fleet
#[tokio::test]
async fn test_expired_leader_hands_over() {
    let fleet = TestFleet::new(3, job()).await;
    let initial = fleet.wait_for_leader(Duration::from_secs(2)).await.unwrap();
    let leader = fleet.get_node(initial).unwrap();

    fleet.registry.expire_session(leader.session.id()).await;

    assert_eventually(
        || async { leader.is_shutdown().await },
        Duration::from_secs(2),
        "Evicted leader should shut down",
    )
    .await;
    let successor = fleet
        .wait_for_new_leader(initial, Duration::from_secs(2))
        .await
        .expect("Another instance should lead");
    assert_ne!(successor, initial);

    fleet.shutdown().await;
}

/// Test 3: A graceful shutdown withdraws the instance but keeps the server
#[tokio::test]
async fn test_graceful_shutdown_cleans_up() {
    let fleet = TestFleet::new(2, job()).await;
    let node = fleet.get_node(2).unwrap();
    let observer = fleet.observer().await;
    let instance_path = format!("/billing/instances/{}", node.instance_id());
    assert!(observer.is_existed(&instance_path).await.unwrap());

    node.node.shutdown().await.unwrap();

    assert!(!observer.is_existed(&instance_path).await.unwrap());
    assert!(observer
        .is_existed(&format!("/billing/servers/{}", node.ip()))
        .await
        .unwrap());
    assert!(node.is_shutdown().await);
    assert_eq!(fleet.leaders().await, vec![1]);

    fleet.shutdown().await;
}

/// Test 4: A paused scheduler is left alone when its node disappears
#[tokio::test]
async fn test_paused_scheduler_not_shut_down() {
    let fleet = TestFleet::new(1, job()).await;
    let node = fleet.get_node(1).unwrap();
    node.node.controller().pause();

    fleet.registry.expire_session(node.session.id()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!node.is_shutdown().await);
    assert!(!node.node.controller().is_shut_down());

    node.node.controller().resume();
    node.node.shutdown().await.unwrap();
}

/// Test 5: Instances on other hosts do not see each other's evictions
#[tokio::test]
async fn test_other_instance_removal_ignored() {
    let fleet = TestFleet::new(3, job()).await;

    fleet
        .registry
        .expire_session(fleet.get_node(3).unwrap().session.id())
        .await;

    assert_eventually(
        || async { fleet.get_node(3).unwrap().is_shutdown().await },
        Duration::from_secs(2),
        "Evicted instance should shut down",
    )
    .await;
    assert!(!fleet.get_node(1).unwrap().is_shutdown().await);
    assert!(!fleet.get_node(2).unwrap().is_shutdown().await);

    fleet.shutdown().await;
}

/// Test 6: A crashed instance's listeners stop with it
#[tokio::test]
async fn test_crashed_instance_listeners_stop() {
    let fleet = TestFleet::new(2, job()).await;

    let crashed = tokio::time::timeout(Duration::from_secs(2), fleet.crash_node(2))
        .await
        .expect("Listener tasks should finish after a crash");
    assert!(crashed);
    assert!(fleet.get_node(2).unwrap().session.is_closed());
    assert!(fleet.get_node(2).unwrap().is_shutdown().await);
    assert!(!fleet.get_node(1).unwrap().is_shutdown().await);

    fleet.shutdown().await;
}
