use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::CoordinatorConfig;
use crate::error::Result;
use crate::instance::JobInstance;
use crate::job::JobConfiguration;
use crate::reg::CoordinatorRegistry;
use crate::schedule::{JobRegistry, LocalScheduleController, SchedulerFacade};
use crate::sharding::{ExecutionContextService, ExecutionService, ShardingContext, ShardingContexts};
use crate::storage::JobNodeStorage;

/// One job running in this process, wired to the registry.
pub struct JobNode {
    pub config: CoordinatorConfig,
    job_config: JobConfiguration,
    instance: JobInstance,
    storage: JobNodeStorage,
    job_registry: Arc<JobRegistry>,
    controller: Arc<LocalScheduleController>,
    facade: SchedulerFacade,
    context_service: ExecutionContextService,
    execution_service: ExecutionService,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub job_name: String,
    pub instance_id: String,
    pub is_leader: bool,
    pub server_enabled: bool,
    pub online: bool,
    pub paused: bool,
    pub shutdown: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerView {
    pub ip: String,
    pub enabled: bool,
    pub available: bool,
}

/// Registry view of the whole fleet for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FleetStatus {
    pub job_name: String,
    pub leader_instance_id: Option<String>,
    pub servers: Vec<ServerView>,
    pub available_instances: Vec<String>,
}

impl JobNode {
    pub fn new(
        config: CoordinatorConfig,
        job_config: JobConfiguration,
        registry: Arc<dyn CoordinatorRegistry>,
        job_registry: Arc<JobRegistry>,
    ) -> Self {
        let storage = JobNodeStorage::new(registry, job_config.job_name.clone());
        let facade = SchedulerFacade::new(storage.clone(), job_registry.clone(), &config);
        let context_service = ExecutionContextService::new(
            storage.clone(),
            facade.config_service().clone(),
            job_registry.clone(),
        );
        Self {
            instance: JobInstance::new(config.host_ip, config.pid),
            execution_service: ExecutionService::new(storage.clone()),
            config,
            job_config,
            storage,
            job_registry,
            controller: Arc::new(LocalScheduleController::new()),
            facade,
            context_service,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_config.job_name
    }

    pub fn instance(&self) -> &JobInstance {
        &self.instance
    }

    pub fn controller(&self) -> &Arc<LocalScheduleController> {
        &self.controller
    }

    pub fn facade(&self) -> &SchedulerFacade {
        &self.facade
    }

    /// Bring the job online.
    ///
    /// 1. Registers the local instance and controller in the process registry
    /// 2. Caches the job subtree
    /// 3. Persists the configuration (an existing one wins unless `overwrite`)
    /// 4. Rejects start-up when the clock skew exceeds the configured limit
    /// 5. Starts listeners, joins the election, announces server and instance
    ///
    /// Returns the configuration in effect.
    ///
    /// # Errors
    ///
    /// Fails on a job class conflict, excessive clock skew, or registry faults.
    pub async fn start(&self) -> Result<JobConfiguration> {
        self.job_registry
            .register_instance(self.job_name(), self.instance.clone())
            .await;
        self.job_registry
            .register_controller(self.job_name(), self.controller.clone())
            .await?;
        self.storage
            .registry()
            .add_cache_data(&self.storage.paths().root())
            .await?;

        let effective = self.facade.update_job_configuration(&self.job_config).await?;
        self.facade
            .config_service()
            .check_max_time_diff_seconds_tolerable()
            .await?;

        let handles = self
            .facade
            .register_start_up_info(!effective.disabled)
            .await?;
        self.listeners.lock().await.extend(handles);
        tracing::info!(
            job_name = %self.job_name(),
            instance_id = %self.instance,
            sharding_total_count = effective.sharding_total_count,
            "Job node started"
        );
        Ok(effective)
    }

    pub async fn sharding_contexts(&self, items: &[u32]) -> Result<ShardingContexts> {
        self.context_service.sharding_contexts(items).await
    }

    /// Run one firing over `items`: build the context, mark items running,
    /// run `job` for each item in turn, clear the markers.
    pub async fn fire<F, Fut>(&self, items: &[u32], job: F) -> Result<ShardingContexts>
    where
        F: Fn(ShardingContext) -> Fut,
        Fut: Future<Output = ()>,
    {
        let contexts = self.sharding_contexts(items).await?;
        if contexts.is_empty() || self.job_registry.is_shutdown(self.job_name()).await {
            return Ok(contexts);
        }
        self.execution_service.register_job_begin(&contexts).await?;
        for item in contexts.items() {
            if let Some(context) = contexts.sharding_context(item) {
                job(context).await;
            }
        }
        self.execution_service
            .register_job_completed(&contexts)
            .await?;
        Ok(contexts)
    }

    pub async fn is_leader(&self) -> Result<bool> {
        self.facade.leader_service().is_leader().await
    }

    /// Leave the fleet: vacate leadership, stop listeners, withdraw the
    /// instance node.
    pub async fn shutdown(&self) -> Result<()> {
        self.facade.shutdown_instance().await?;
        self.facade.instance_service().remove_instance().await?;
        self.join_listeners().await;
        Ok(())
    }

    /// Wait for the listener tasks to finish. They stop once the job is shut
    /// down in the process registry.
    pub async fn join_listeners(&self) {
        let handles: Vec<JoinHandle<()>> = self.listeners.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(job_name = %self.job_name(), error = %e, "Listener task failed");
            }
        }
    }

    pub async fn status(&self) -> Result<NodeStatus> {
        Ok(NodeStatus {
            job_name: self.job_name().to_string(),
            instance_id: self.instance.id().to_string(),
            is_leader: self.is_leader().await?,
            server_enabled: self
                .facade
                .server_service()
                .is_enable_server(self.instance.ip())
                .await?,
            online: self
                .facade
                .instance_service()
                .is_local_job_instance_existed()
                .await?,
            paused: self.job_registry.is_paused(self.job_name()).await,
            shutdown: self.job_registry.is_shutdown(self.job_name()).await,
        })
    }

    pub async fn fleet_status(&self) -> Result<FleetStatus> {
        let servers = self.facade.server_service();
        let mut views = Vec::new();
        for ip in servers.servers().await? {
            views.push(ServerView {
                enabled: servers.is_enable_server(&ip).await?,
                available: servers.is_available_server(&ip).await?,
                ip,
            });
        }
        Ok(FleetStatus {
            job_name: self.job_name().to_string(),
            leader_instance_id: self.facade.leader_service().leader_instance_id().await?,
            servers: views,
            available_instances: self
                .facade
                .instance_service()
                .available_job_instances()
                .await?
                .iter()
                .map(|instance| instance.id().to_string())
                .collect(),
        })
    }
}
