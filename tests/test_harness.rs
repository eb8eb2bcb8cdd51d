//! Test harness for multi-instance job fleet integration tests.
//!
//! Every instance gets its own registry session and process-local job
//! registry, the way separate processes would, all sharing one
//! in-memory registry.

#![allow(dead_code)]

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use shard_lite::config::CoordinatorConfig;
use shard_lite::job::JobConfiguration;
use shard_lite::node::JobNode;
use shard_lite::reg::{CoordinatorRegistry, InMemoryRegistry, RegistrySession};
use shard_lite::schedule::JobRegistry;

/// Coordinator configuration with short waits for faster tests
pub fn test_coordinator_config(host: u8) -> CoordinatorConfig {
    CoordinatorConfig::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, host)), 1000 + u32::from(host))
        .with_leader_poll_interval_ms(10)
        .with_leader_wait_timeout_ms(1_000)
}

/// Handle to one running instance
pub struct TestNode {
    pub host: u8,
    pub node: JobNode,
    pub session: Arc<RegistrySession>,
    pub job_registry: Arc<JobRegistry>,
}

impl TestNode {
    pub async fn is_leader(&self) -> bool {
        self.node.is_leader().await.unwrap_or(false)
    }

    pub fn ip(&self) -> &str {
        self.node.instance().ip()
    }

    pub fn instance_id(&self) -> &str {
        self.node.instance().id()
    }

    pub async fn is_shutdown(&self) -> bool {
        self.job_registry.is_shutdown(self.node.job_name()).await
    }
}

/// A fleet of instances of one job sharing a registry
pub struct TestFleet {
    pub registry: InMemoryRegistry,
    pub nodes: Vec<TestNode>,
}

impl TestFleet {
    /// Start `num_nodes` instances of `job`, hosts 10.0.0.1 upwards
    pub async fn new(num_nodes: u8, job: JobConfiguration) -> Self {
        let mut fleet = Self {
            registry: InMemoryRegistry::new(),
            nodes: Vec::new(),
        };
        for host in 1..=num_nodes {
            fleet
                .add_node(host, job.clone())
                .await
                .expect("Instance should start");
        }
        fleet
    }

    /// Start one more instance on `host`
    pub async fn add_node(
        &mut self,
        host: u8,
        job: JobConfiguration,
    ) -> shard_lite::error::Result<()> {
        let node = self.build_node(host, job).await;
        node.node.start().await?;
        self.nodes.push(node);
        Ok(())
    }

    /// Build an instance without starting it
    pub async fn build_node(&self, host: u8, job: JobConfiguration) -> TestNode {
        let session = Arc::new(self.registry.connect().await);
        let job_registry = Arc::new(JobRegistry::new());
        let node = JobNode::new(
            test_coordinator_config(host),
            job,
            session.clone(),
            job_registry.clone(),
        );
        TestNode {
            host,
            node,
            session,
            job_registry,
        }
    }

    /// A fresh session for inspecting the registry directly
    pub async fn observer(&self) -> Arc<dyn CoordinatorRegistry> {
        Arc::new(self.registry.connect().await)
    }

    pub fn get_node(&self, host: u8) -> Option<&TestNode> {
        self.nodes.iter().find(|n| n.host == host)
    }

    /// Hosts currently holding leadership; more than one is a bug
    pub async fn leaders(&self) -> Vec<u8> {
        let mut leaders = Vec::new();
        for node in &self.nodes {
            if !node.session.is_closed() && node.is_leader().await {
                leaders.push(node.host);
            }
        }
        leaders
    }

    /// Wait for exactly one leader
    pub async fn wait_for_leader(&self, timeout_duration: Duration) -> Option<u8> {
        let found = wait_for(
            || async { self.leaders().await.len() == 1 },
            timeout_duration,
            Duration::from_millis(10),
        )
        .await;
        if found {
            self.leaders().await.first().copied()
        } else {
            None
        }
    }

    /// Wait for a leader other than `old_leader`
    pub async fn wait_for_new_leader(
        &self,
        old_leader: u8,
        timeout_duration: Duration,
    ) -> Option<u8> {
        let found = wait_for(
            || async {
                let leaders = self.leaders().await;
                leaders.len() == 1 && leaders[0] != old_leader
            },
            timeout_duration,
            Duration::from_millis(10),
        )
        .await;
        if found {
            self.leaders().await.first().copied()
        } else {
            None
        }
    }

    /// Close a host's session as if its process died. The process's job
    /// state dies with it, so its listeners are stopped first.
    pub async fn crash_node(&self, host: u8) -> bool {
        match self.get_node(host) {
            Some(node) => {
                node.job_registry.shutdown(node.node.job_name()).await;
                node.session.close().await;
                node.node.join_listeners().await;
                true
            }
            None => false,
        }
    }

    /// Shut down every instance whose session is still open
    pub async fn shutdown(&self) {
        for node in &self.nodes {
            if !node.session.is_closed() {
                let _ = node.node.shutdown().await;
            }
        }
    }
}

/// Wait for a condition to become true with timeout
pub async fn wait_for<F, Fut>(
    condition: F,
    timeout_duration: Duration,
    poll_interval: Duration,
) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout_duration {
        if condition().await {
            return true;
        }
        tokio::time::sleep(poll_interval).await;
    }
    false
}

/// Assert a condition eventually becomes true
pub async fn assert_eventually<F, Fut>(condition: F, timeout_duration: Duration, message: &str)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = wait_for(condition, timeout_duration, Duration::from_millis(10)).await;
    assert!(result, "{}", message);
}
