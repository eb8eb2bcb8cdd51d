use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::CoordinatorConfig;
use crate::election::{ElectionListenerManager, LeaderService};
use crate::error::Result;
use crate::instance::{InstanceService, ShutdownListenerManager};
use crate::job::{ConfigurationService, JobConfiguration};
use crate::schedule::JobRegistry;
use crate::server::ServerService;
use crate::storage::JobNodeStorage;

/// Start-up and shutdown sequences of one job in this process.
#[derive(Clone)]
pub struct SchedulerFacade {
    storage: JobNodeStorage,
    job_registry: Arc<JobRegistry>,
    config_service: ConfigurationService,
    leader_service: LeaderService,
    server_service: ServerService,
    instance_service: InstanceService,
}

impl SchedulerFacade {
    pub fn new(
        storage: JobNodeStorage,
        job_registry: Arc<JobRegistry>,
        config: &CoordinatorConfig,
    ) -> Self {
        let server_service = ServerService::new(storage.clone(), job_registry.clone());
        let leader_service =
            LeaderService::new(storage.clone(), job_registry.clone(), server_service.clone())
                .with_wait(config.leader_poll_interval(), config.leader_wait_timeout());
        let instance_service = InstanceService::new(
            storage.clone(),
            job_registry.clone(),
            server_service.clone(),
        );
        Self {
            config_service: ConfigurationService::new(storage.clone()),
            storage,
            job_registry,
            leader_service,
            server_service,
            instance_service,
        }
    }

    pub fn config_service(&self) -> &ConfigurationService {
        &self.config_service
    }

    pub fn leader_service(&self) -> &LeaderService {
        &self.leader_service
    }

    pub fn server_service(&self) -> &ServerService {
        &self.server_service
    }

    pub fn instance_service(&self) -> &InstanceService {
        &self.instance_service
    }

    fn job_name(&self) -> &str {
        self.storage.paths().job_name()
    }

    /// Persist `config` (first writer wins unless it asks to overwrite) and
    /// return the configuration now in effect.
    pub async fn update_job_configuration(
        &self,
        config: &JobConfiguration,
    ) -> Result<JobConfiguration> {
        self.config_service.persist(config).await?;
        self.config_service.load(true).await
    }

    /// Start the listeners, take part in the first election and announce this
    /// host and instance. Returns the listener tasks.
    pub async fn register_start_up_info(&self, enabled: bool) -> Result<Vec<JoinHandle<()>>> {
        let mut handles = ElectionListenerManager::new(
            self.storage.clone(),
            self.job_registry.clone(),
            self.leader_service.clone(),
            self.server_service.clone(),
        )
        .start()
        .await;
        handles.push(
            ShutdownListenerManager::new(
                self.storage.clone(),
                self.job_registry.clone(),
                self.instance_service.clone(),
                self.clone(),
            )
            .start()
            .await,
        );
        self.leader_service.elect_leader().await?;
        self.server_service.persist_online(enabled).await?;
        self.instance_service.persist_online().await?;
        tracing::info!(job_name = %self.job_name(), enabled, "Start-up info registered");
        Ok(handles)
    }

    /// Mark the job shut down, give up leadership and drop its cache.
    ///
    /// The shutdown flag is set before the leader record goes, so the local
    /// election listener cannot win the record back.
    pub async fn shutdown_instance(&self) -> Result<()> {
        let was_leader = self.leader_service.is_leader().await?;
        self.job_registry.shutdown(self.job_name()).await;
        if was_leader {
            self.leader_service.remove_leader().await?;
        }
        self.storage
            .registry()
            .evict_cache_data(&self.storage.paths().root())
            .await;
        Ok(())
    }
}
