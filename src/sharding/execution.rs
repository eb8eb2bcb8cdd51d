use std::sync::Arc;

use crate::error::Result;
use crate::instance::{DELIMITER, UNREGISTERED_INSTANCE_ID};
use crate::job::{ConfigurationService, JobConfiguration};
use crate::schedule::JobRegistry;
use crate::sharding::context::ShardingContexts;
use crate::storage::node::running_node;
use crate::storage::JobNodeStorage;

const READY_STATUS: &str = "READY";

/// Builds the sharding context of each firing.
#[derive(Clone)]
pub struct ExecutionContextService {
    storage: JobNodeStorage,
    config_service: ConfigurationService,
    job_registry: Arc<JobRegistry>,
}

impl ExecutionContextService {
    pub fn new(
        storage: JobNodeStorage,
        config_service: ConfigurationService,
        job_registry: Arc<JobRegistry>,
    ) -> Self {
        Self {
            storage,
            config_service,
            job_registry,
        }
    }

    /// Context for `sharding_items`, the items this instance was handed for
    /// the firing. With monitor execution on, items still marked running
    /// anywhere in the fleet are dropped.
    pub async fn sharding_contexts(&self, sharding_items: &[u32]) -> Result<ShardingContexts> {
        let config = self.config_service.load(false).await?;
        let items = self
            .remove_running_if_monitor_execution(config.monitor_execution, sharding_items)
            .await?;
        let task_id = self.build_task_id(&config, &items).await;
        let sharding_item_parameters = if items.is_empty() {
            Default::default()
        } else {
            config.sharding_parameters()?.restrict_to(&items)
        };
        Ok(ShardingContexts {
            task_id,
            job_name: config.job_name,
            sharding_total_count: config.sharding_total_count,
            job_parameter: config.job_parameter,
            sharding_item_parameters,
            monitor_execution: config.monitor_execution,
        })
    }

    async fn remove_running_if_monitor_execution(
        &self,
        monitor_execution: bool,
        sharding_items: &[u32],
    ) -> Result<Vec<u32>> {
        if !monitor_execution {
            return Ok(sharding_items.to_vec());
        }
        let mut result = Vec::with_capacity(sharding_items.len());
        for &item in sharding_items {
            if self.is_running(item).await? {
                tracing::debug!(job_name = %self.storage.paths().job_name(), item, "Item still running, skipped");
            } else {
                result.push(item);
            }
        }
        Ok(result)
    }

    async fn is_running(&self, item: u32) -> Result<bool> {
        self.storage.is_job_node_existed(&running_node(item)).await
    }

    async fn build_task_id(&self, config: &JobConfiguration, items: &[u32]) -> String {
        let instance_id = self
            .job_registry
            .job_instance(self.storage.paths().job_name())
            .await
            .map(|instance| instance.id().to_string())
            .unwrap_or_else(|| UNREGISTERED_INSTANCE_ID.to_string());
        let items = items
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        [
            config.job_name.as_str(),
            items.as_str(),
            READY_STATUS,
            instance_id.as_str(),
        ]
        .join(DELIMITER)
    }
}

/// Maintains the `sharding/{item}/running` markers around a firing.
#[derive(Clone)]
pub struct ExecutionService {
    storage: JobNodeStorage,
}

impl ExecutionService {
    pub fn new(storage: JobNodeStorage) -> Self {
        Self { storage }
    }

    /// Mark every assigned item running. No-op without monitor execution.
    pub async fn register_job_begin(&self, contexts: &ShardingContexts) -> Result<()> {
        if !contexts.monitor_execution {
            return Ok(());
        }
        for item in contexts.items() {
            self.storage
                .fill_ephemeral_job_node(&running_node(item), "")
                .await?;
        }
        tracing::debug!(task_id = %contexts.task_id, items = ?contexts.items(), "Job begin registered");
        Ok(())
    }

    pub async fn register_job_completed(&self, contexts: &ShardingContexts) -> Result<()> {
        if !contexts.monitor_execution {
            return Ok(());
        }
        for item in contexts.items() {
            self.storage
                .remove_job_node_if_existed(&running_node(item))
                .await?;
        }
        tracing::debug!(task_id = %contexts.task_id, items = ?contexts.items(), "Job completion registered");
        Ok(())
    }

    pub async fn has_running_items(&self, items: &[u32]) -> Result<bool> {
        for &item in items {
            if self.storage.is_job_node_existed(&running_node(item)).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
