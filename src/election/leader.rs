use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::schedule::JobRegistry;
use crate::server::ServerService;
use crate::storage::node::LEADER_INSTANCE_NODE;
use crate::storage::JobNodeStorage;

/// Leader record operations for one job.
///
/// Leadership is only ever taken through the registry's atomic
/// create-if-absent on `leader/election/instance`, so concurrent attempts from
/// different hosts leave exactly one winner. Losing is not an error.
#[derive(Clone)]
pub struct LeaderService {
    storage: JobNodeStorage,
    job_registry: Arc<JobRegistry>,
    server_service: ServerService,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl LeaderService {
    pub fn new(
        storage: JobNodeStorage,
        job_registry: Arc<JobRegistry>,
        server_service: ServerService,
    ) -> Self {
        Self {
            storage,
            job_registry,
            server_service,
            poll_interval: Duration::from_millis(100),
            wait_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_wait(mut self, poll_interval: Duration, wait_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.wait_timeout = wait_timeout;
        self
    }

    fn job_name(&self) -> &str {
        self.storage.paths().job_name()
    }

    /// Try to become leader. Returns whether this call created the record.
    pub async fn elect_leader(&self) -> Result<bool> {
        if self.job_registry.is_shutdown(self.job_name()).await {
            return Ok(false);
        }
        let instance = self.job_registry.require_job_instance(self.job_name()).await?;
        let won = self
            .storage
            .create_ephemeral_if_absent(LEADER_INSTANCE_NODE, instance.id())
            .await?;
        if won {
            tracing::info!(job_name = %self.job_name(), instance_id = %instance, "Became leader");
        } else {
            tracing::debug!(job_name = %self.job_name(), instance_id = %instance, "Leader already elected");
        }
        Ok(won)
    }

    pub async fn has_leader(&self) -> Result<bool> {
        self.storage.is_job_node_existed(LEADER_INSTANCE_NODE).await
    }

    pub async fn leader_instance_id(&self) -> Result<Option<String>> {
        self.storage
            .get_job_node_data_directly(LEADER_INSTANCE_NODE)
            .await
    }

    pub async fn is_leader(&self) -> Result<bool> {
        if self.job_registry.is_shutdown(self.job_name()).await {
            return Ok(false);
        }
        let Some(instance) = self.job_registry.job_instance(self.job_name()).await else {
            return Ok(false);
        };
        Ok(self.leader_instance_id().await?.as_deref() == Some(instance.id()))
    }

    /// Vacate leadership. Removing an absent record is fine.
    pub async fn remove_leader(&self) -> Result<()> {
        self.storage
            .remove_job_node_if_existed(LEADER_INSTANCE_NODE)
            .await?;
        tracing::info!(job_name = %self.job_name(), "Leader record removed");
        Ok(())
    }

    /// Wait until some instance holds leadership, taking part in the election
    /// while the local server is available. Gives up when no server is
    /// available or the wait timeout elapses. Returns whether this process
    /// ended up as leader.
    pub async fn await_leadership(&self) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + self.wait_timeout;
        while !self.has_leader().await? && self.server_service.has_available_servers().await? {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    job_name = %self.job_name(),
                    timeout_ms = self.wait_timeout.as_millis() as u64,
                    "Timed out waiting for a leader"
                );
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
            if self.job_registry.is_shutdown(self.job_name()).await {
                break;
            }
            let Some(instance) = self.job_registry.job_instance(self.job_name()).await else {
                break;
            };
            if self.server_service.is_available_server(instance.ip()).await? {
                self.elect_leader().await?;
            }
        }
        self.is_leader().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::JobInstance;
    use crate::reg::{CoordinatorRegistry, InMemoryRegistry};

    async fn leader_service(
        registry: &InMemoryRegistry,
        ip: &str,
    ) -> (LeaderService, Arc<JobRegistry>, Arc<dyn CoordinatorRegistry>) {
        let session: Arc<dyn CoordinatorRegistry> = Arc::new(registry.connect().await);
        let job_registry = Arc::new(JobRegistry::new());
        job_registry
            .register_instance("billing", JobInstance::new(ip.parse().unwrap(), 1))
            .await;
        let storage = JobNodeStorage::new(session.clone(), "billing");
        let servers = ServerService::new(storage.clone(), job_registry.clone());
        (
            LeaderService::new(storage, job_registry.clone(), servers)
                .with_wait(Duration::from_millis(5), Duration::from_millis(200)),
            job_registry,
            session,
        )
    }

    #[tokio::test]
    async fn first_elector_wins_and_second_loses_quietly() {
        let registry = InMemoryRegistry::new();
        let (a, _, _) = leader_service(&registry, "10.0.0.1").await;
        let (b, _, _) = leader_service(&registry, "10.0.0.2").await;

        assert!(a.elect_leader().await.unwrap());
        assert!(!b.elect_leader().await.unwrap());

        assert!(a.is_leader().await.unwrap());
        assert!(!b.is_leader().await.unwrap());
        assert_eq!(
            b.leader_instance_id().await.unwrap().as_deref(),
            Some("10.0.0.1@-@1")
        );
    }

    #[tokio::test]
    async fn remove_leader_is_idempotent() {
        let registry = InMemoryRegistry::new();
        let (a, _, _) = leader_service(&registry, "10.0.0.1").await;

        a.remove_leader().await.unwrap();
        a.elect_leader().await.unwrap();
        a.remove_leader().await.unwrap();
        a.remove_leader().await.unwrap();
        assert!(!a.has_leader().await.unwrap());
    }

    #[tokio::test]
    async fn shut_down_job_never_elects() {
        let registry = InMemoryRegistry::new();
        let (a, job_registry, _) = leader_service(&registry, "10.0.0.1").await;
        job_registry.shutdown("billing").await;

        assert!(!a.elect_leader().await.unwrap());
        assert!(!a.has_leader().await.unwrap());
    }

    #[tokio::test]
    async fn await_leadership_elects_available_local_server() {
        let registry = InMemoryRegistry::new();
        let (a, _, session) = leader_service(&registry, "10.0.0.1").await;
        session.persist("/billing/servers/10.0.0.1", "").await.unwrap();
        session
            .persist_ephemeral("/billing/instances/10.0.0.1@-@1", "")
            .await
            .unwrap();

        assert!(a.await_leadership().await.unwrap());
    }

    #[tokio::test]
    async fn await_leadership_returns_when_no_server_is_available() {
        let registry = InMemoryRegistry::new();
        let (a, _, _) = leader_service(&registry, "10.0.0.1").await;
        assert!(!a.await_leadership().await.unwrap());
    }
}
