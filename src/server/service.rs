use std::sync::Arc;

use crate::error::Result;
use crate::instance::is_instance_of_host;
use crate::schedule::JobRegistry;
use crate::server::ServerStatus;
use crate::storage::node::{server_node, INSTANCES_ROOT, SERVERS_ROOT};
use crate::storage::JobNodeStorage;

#[derive(Clone)]
pub struct ServerService {
    storage: JobNodeStorage,
    job_registry: Arc<JobRegistry>,
}

impl ServerService {
    pub fn new(storage: JobNodeStorage, job_registry: Arc<JobRegistry>) -> Self {
        Self {
            storage,
            job_registry,
        }
    }

    fn job_name(&self) -> &str {
        self.storage.paths().job_name()
    }

    /// Write the local host's status. Skipped once the job is shut down.
    pub async fn persist_online(&self, enabled: bool) -> Result<()> {
        if self.job_registry.is_shutdown(self.job_name()).await {
            return Ok(());
        }
        let instance = self.job_registry.require_job_instance(self.job_name()).await?;
        self.write_status(instance.ip(), ServerStatus::from_enabled(enabled))
            .await
    }

    pub async fn enable_server(&self, ip: &str) -> Result<()> {
        self.write_status(ip, ServerStatus::Enabled).await
    }

    pub async fn disable_server(&self, ip: &str) -> Result<()> {
        self.write_status(ip, ServerStatus::Disabled).await
    }

    async fn write_status(&self, ip: &str, status: ServerStatus) -> Result<()> {
        self.storage
            .fill_job_node(&server_node(ip), status.node_value())
            .await?;
        tracing::info!(job_name = %self.job_name(), ip, status = %status, "Server status persisted");
        Ok(())
    }

    pub async fn has_available_servers(&self) -> Result<bool> {
        for ip in self.storage.get_job_node_children_keys(SERVERS_ROOT).await? {
            if self.is_available_server(&ip).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn is_available_server(&self, ip: &str) -> Result<bool> {
        Ok(self.is_enable_server(ip).await? && self.has_online_instances(ip).await?)
    }

    pub async fn is_enable_server(&self, ip: &str) -> Result<bool> {
        let value = self.storage.get_job_node_data(&server_node(ip)).await?;
        Ok(ServerStatus::from_node_value(value.as_deref()) == ServerStatus::Enabled)
    }

    async fn has_online_instances(&self, ip: &str) -> Result<bool> {
        Ok(self
            .storage
            .get_job_node_children_keys(INSTANCES_ROOT)
            .await?
            .iter()
            .any(|instance_id| is_instance_of_host(instance_id, ip)))
    }

    /// Every host with a server node, in ascending order.
    pub async fn servers(&self) -> Result<Vec<String>> {
        self.storage.get_job_node_children_keys(SERVERS_ROOT).await
    }
}
