use std::sync::Arc;

use crate::error::Result;
use crate::instance::{instance_ip, JobInstance};
use crate::schedule::JobRegistry;
use crate::server::ServerService;
use crate::storage::node::{instance_node, INSTANCES_ROOT};
use crate::storage::JobNodeStorage;

#[derive(Clone)]
pub struct InstanceService {
    storage: JobNodeStorage,
    job_registry: Arc<JobRegistry>,
    server_service: ServerService,
}

impl InstanceService {
    pub fn new(
        storage: JobNodeStorage,
        job_registry: Arc<JobRegistry>,
        server_service: ServerService,
    ) -> Self {
        Self {
            storage,
            job_registry,
            server_service,
        }
    }

    fn job_name(&self) -> &str {
        self.storage.paths().job_name()
    }

    async fn local_instance(&self) -> Result<JobInstance> {
        self.job_registry.require_job_instance(self.job_name()).await
    }

    /// Announce the local instance with an ephemeral node.
    pub async fn persist_online(&self) -> Result<()> {
        let instance = self.local_instance().await?;
        self.storage
            .fill_ephemeral_job_node(&instance_node(instance.id()), "")
            .await?;
        tracing::info!(job_name = %self.job_name(), instance_id = %instance, "Instance online");
        Ok(())
    }

    pub async fn remove_instance(&self) -> Result<()> {
        let instance = self.local_instance().await?;
        self.storage
            .remove_job_node_if_existed(&instance_node(instance.id()))
            .await?;
        tracing::info!(job_name = %self.job_name(), instance_id = %instance, "Instance removed");
        Ok(())
    }

    /// Direct check, never served from cache.
    pub async fn is_local_job_instance_existed(&self) -> Result<bool> {
        let instance = self.local_instance().await?;
        self.storage
            .is_job_node_existed(&instance_node(instance.id()))
            .await
    }

    /// Online instances whose host is enabled, ordered by id.
    pub async fn available_job_instances(&self) -> Result<Vec<JobInstance>> {
        let mut result = Vec::new();
        for id in self.storage.get_job_node_children_keys(INSTANCES_ROOT).await? {
            if self.server_service.is_enable_server(instance_ip(&id)).await? {
                result.push(JobInstance::from_id(id));
            }
        }
        Ok(result)
    }
}
