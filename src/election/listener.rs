use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::election::LeaderService;
use crate::error::Result;
use crate::listener::{spawn_listener, DataListener};
use crate::reg::{ChangeKind, DataEvent};
use crate::schedule::JobRegistry;
use crate::server::{ServerService, DISABLED};
use crate::storage::JobNodeStorage;

/// Starts leader elections and abdications from registry events.
#[derive(Clone)]
pub struct ElectionListenerManager {
    storage: JobNodeStorage,
    job_registry: Arc<JobRegistry>,
    leader_service: LeaderService,
    server_service: ServerService,
}

impl ElectionListenerManager {
    pub fn new(
        storage: JobNodeStorage,
        job_registry: Arc<JobRegistry>,
        leader_service: LeaderService,
        server_service: ServerService,
    ) -> Self {
        Self {
            storage,
            job_registry,
            leader_service,
            server_service,
        }
    }

    /// Spawn the election and abdication listeners; both stop when the job
    /// shuts down.
    pub async fn start(&self) -> Vec<JoinHandle<()>> {
        let job_name = self.storage.paths().job_name();
        let cancel = self.job_registry.shutdown_token(job_name).await;
        let root = self.storage.paths().root();
        let election: Arc<dyn DataListener> = Arc::new(LeaderElectionListener {
            manager: self.clone(),
        });
        let abdication: Arc<dyn DataListener> = Arc::new(LeaderAbdicationListener {
            manager: self.clone(),
        });
        vec![
            spawn_listener(
                self.storage.registry().watch(),
                root.clone(),
                election,
                cancel.clone(),
            ),
            spawn_listener(self.storage.registry().watch(), root, abdication, cancel),
        ]
    }

    fn job_name(&self) -> &str {
        self.storage.paths().job_name()
    }

    async fn local_ip(&self) -> Option<String> {
        self.job_registry
            .job_instance(self.job_name())
            .await
            .map(|instance| instance.ip().to_string())
    }

    async fn is_local_server_path(&self, path: &str) -> bool {
        match self.local_ip().await {
            Some(ip) => path == self.storage.paths().server_path(&ip),
            None => false,
        }
    }

    async fn is_local_instance_path(&self, path: &str) -> bool {
        match self.job_registry.job_instance(self.job_name()).await {
            Some(instance) => path == self.storage.paths().instance_path(instance.id()),
            None => false,
        }
    }

    fn is_leader_crashed(&self, event: &DataEvent) -> bool {
        event.path == self.storage.paths().leader_instance_path()
            && event.kind == ChangeKind::Removed
    }

    /// The local server turned (or still is) enabled, or the local instance
    /// came online on an enabled server, while nobody leads.
    async fn is_active_election(&self, event: &DataEvent) -> Result<bool> {
        let local_server_enabled = self.is_local_server_path(&event.path).await
            && event.kind != ChangeKind::Removed
            && event.data != DISABLED;
        let local_instance_online = event.kind != ChangeKind::Removed
            && self.is_local_instance_path(&event.path).await
            && match self.local_ip().await {
                Some(ip) => self.server_service.is_enable_server(&ip).await?,
                None => false,
            };
        if !local_server_enabled && !local_instance_online {
            return Ok(false);
        }
        Ok(!self.leader_service.has_leader().await?)
    }

    /// The leader record vanished and this host can take over.
    async fn is_passive_election(&self, event: &DataEvent) -> Result<bool> {
        if !self.is_leader_crashed(event) {
            return Ok(false);
        }
        match self.local_ip().await {
            Some(ip) => self.server_service.is_available_server(&ip).await,
            None => Ok(false),
        }
    }

    async fn on_election_event(&self, event: &DataEvent) -> Result<()> {
        if self.job_registry.is_shutdown(self.job_name()).await {
            return Ok(());
        }
        if self.is_active_election(event).await? || self.is_passive_election(event).await? {
            self.leader_service.elect_leader().await?;
        }
        Ok(())
    }

    async fn on_abdication_event(&self, event: &DataEvent) -> Result<()> {
        let local_server_disabled = self.is_local_server_path(&event.path).await
            && event.kind != ChangeKind::Removed
            && event.data == DISABLED;
        if local_server_disabled && self.leader_service.is_leader().await? {
            tracing::info!(job_name = %self.job_name(), "Local server disabled, abdicating leadership");
            self.leader_service.remove_leader().await?;
        }
        Ok(())
    }
}

struct LeaderElectionListener {
    manager: ElectionListenerManager,
}

#[async_trait]
impl DataListener for LeaderElectionListener {
    fn name(&self) -> &'static str {
        "leader-election"
    }

    async fn data_changed(&self, event: &DataEvent) -> Result<()> {
        self.manager.on_election_event(event).await
    }
}

struct LeaderAbdicationListener {
    manager: ElectionListenerManager,
}

#[async_trait]
impl DataListener for LeaderAbdicationListener {
    fn name(&self) -> &'static str {
        "leader-abdication"
    }

    async fn data_changed(&self, event: &DataEvent) -> Result<()> {
        self.manager.on_abdication_event(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::JobInstance;
    use crate::reg::{CoordinatorRegistry, InMemoryRegistry};
    use std::time::Duration;

    struct Host {
        manager: ElectionListenerManager,
        leader: LeaderService,
        session: Arc<dyn CoordinatorRegistry>,
    }

    async fn host(registry: &InMemoryRegistry, ip: &str) -> Host {
        let session: Arc<dyn CoordinatorRegistry> = Arc::new(registry.connect().await);
        let job_registry = Arc::new(JobRegistry::new());
        job_registry
            .register_instance("billing", JobInstance::new(ip.parse().unwrap(), 1))
            .await;
        let storage = JobNodeStorage::new(session.clone(), "billing");
        let servers = ServerService::new(storage.clone(), job_registry.clone());
        let leader = LeaderService::new(storage.clone(), job_registry.clone(), servers.clone())
            .with_wait(Duration::from_millis(5), Duration::from_millis(100));
        Host {
            manager: ElectionListenerManager::new(storage, job_registry, leader.clone(), servers),
            leader,
            session,
        }
    }

    fn event(path: &str, kind: ChangeKind, data: &str) -> DataEvent {
        DataEvent::new(path, kind, data)
    }

    #[tokio::test]
    async fn enabling_local_server_without_leader_elects() {
        let registry = InMemoryRegistry::new();
        let a = host(&registry, "10.0.0.1").await;

        a.manager
            .on_election_event(&event("/billing/servers/10.0.0.1", ChangeKind::Created, ""))
            .await
            .unwrap();
        assert!(a.leader.is_leader().await.unwrap());
    }

    #[tokio::test]
    async fn enabling_other_server_does_not_elect() {
        let registry = InMemoryRegistry::new();
        let a = host(&registry, "10.0.0.1").await;

        a.manager
            .on_election_event(&event("/billing/servers/10.0.0.2", ChangeKind::Created, ""))
            .await
            .unwrap();
        assert!(!a.leader.has_leader().await.unwrap());
    }

    #[tokio::test]
    async fn disabled_server_event_does_not_elect() {
        let registry = InMemoryRegistry::new();
        let a = host(&registry, "10.0.0.1").await;

        a.manager
            .on_election_event(&event(
                "/billing/servers/10.0.0.1",
                ChangeKind::Updated,
                DISABLED,
            ))
            .await
            .unwrap();
        assert!(!a.leader.has_leader().await.unwrap());
    }

    #[tokio::test]
    async fn local_instance_online_elects_when_server_enabled() {
        let registry = InMemoryRegistry::new();
        let a = host(&registry, "10.0.0.1").await;

        a.manager
            .on_election_event(&event(
                "/billing/instances/10.0.0.1@-@1",
                ChangeKind::Created,
                "",
            ))
            .await
            .unwrap();
        assert!(a.leader.is_leader().await.unwrap());
    }

    #[tokio::test]
    async fn leader_removed_elects_only_available_hosts() {
        let registry = InMemoryRegistry::new();
        let a = host(&registry, "10.0.0.1").await;
        let removed = event(
            "/billing/leader/election/instance",
            ChangeKind::Removed,
            "10.0.0.9@-@1",
        );

        // Not available yet: no presence node.
        a.manager.on_election_event(&removed).await.unwrap();
        assert!(!a.leader.has_leader().await.unwrap());

        a.session.persist("/billing/servers/10.0.0.1", "").await.unwrap();
        a.session
            .persist_ephemeral("/billing/instances/10.0.0.1@-@1", "")
            .await
            .unwrap();
        a.manager.on_election_event(&removed).await.unwrap();
        assert!(a.leader.is_leader().await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_events_keep_the_first_leader() {
        let registry = InMemoryRegistry::new();
        let a = host(&registry, "10.0.0.1").await;
        let b = host(&registry, "10.0.0.2").await;

        a.manager
            .on_election_event(&event("/billing/servers/10.0.0.1", ChangeKind::Created, ""))
            .await
            .unwrap();
        b.manager
            .on_election_event(&event("/billing/servers/10.0.0.2", ChangeKind::Created, ""))
            .await
            .unwrap();
        a.manager
            .on_election_event(&event("/billing/servers/10.0.0.1", ChangeKind::Updated, ""))
            .await
            .unwrap();

        assert!(a.leader.is_leader().await.unwrap());
        assert!(!b.leader.is_leader().await.unwrap());
    }

    #[tokio::test]
    async fn disabling_local_server_abdicates() {
        let registry = InMemoryRegistry::new();
        let a = host(&registry, "10.0.0.1").await;
        a.leader.elect_leader().await.unwrap();

        a.manager
            .on_abdication_event(&event(
                "/billing/servers/10.0.0.1",
                ChangeKind::Updated,
                DISABLED,
            ))
            .await
            .unwrap();
        assert!(!a.leader.has_leader().await.unwrap());
    }

    #[tokio::test]
    async fn non_leader_disable_keeps_leader() {
        let registry = InMemoryRegistry::new();
        let a = host(&registry, "10.0.0.1").await;
        let b = host(&registry, "10.0.0.2").await;
        a.leader.elect_leader().await.unwrap();

        b.manager
            .on_abdication_event(&event(
                "/billing/servers/10.0.0.2",
                ChangeKind::Updated,
                DISABLED,
            ))
            .await
            .unwrap();
        assert!(a.leader.is_leader().await.unwrap());
    }
}
