use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::instance::InstanceService;
use crate::listener::{spawn_listener, DataListener};
use crate::reg::{ChangeKind, DataEvent};
use crate::schedule::{JobRegistry, SchedulerFacade};
use crate::storage::JobNodeStorage;

/// Shuts the local scheduler down when its presence node is removed for good.
///
/// A removal followed by a reconnect that already restored the node is a
/// session blip, not an eviction; the node is re-checked before acting.
#[derive(Clone)]
pub struct ShutdownListenerManager {
    storage: JobNodeStorage,
    job_registry: Arc<JobRegistry>,
    instance_service: InstanceService,
    facade: SchedulerFacade,
}

impl ShutdownListenerManager {
    pub fn new(
        storage: JobNodeStorage,
        job_registry: Arc<JobRegistry>,
        instance_service: InstanceService,
        facade: SchedulerFacade,
    ) -> Self {
        Self {
            storage,
            job_registry,
            instance_service,
            facade,
        }
    }

    pub async fn start(&self) -> JoinHandle<()> {
        let cancel = self
            .job_registry
            .shutdown_token(self.storage.paths().job_name())
            .await;
        let listener: Arc<dyn DataListener> = Arc::new(InstanceShutdownStatusListener {
            manager: self.clone(),
        });
        spawn_listener(
            self.storage.registry().watch(),
            self.storage.paths().root(),
            listener,
            cancel,
        )
    }

    fn job_name(&self) -> &str {
        self.storage.paths().job_name()
    }

    async fn is_remove_local_instance(&self, event: &DataEvent) -> bool {
        if event.kind != ChangeKind::Removed {
            return false;
        }
        match self.job_registry.job_instance(self.job_name()).await {
            Some(instance) => event.path == self.storage.paths().instance_path(instance.id()),
            None => false,
        }
    }

    /// Returns whether the instance was shut down.
    pub async fn on_data_changed(&self, event: &DataEvent) -> Result<bool> {
        if self.job_registry.is_shutdown(self.job_name()).await
            || self.job_registry.is_paused(self.job_name()).await
            || !self.is_remove_local_instance(event).await
        {
            return Ok(false);
        }
        if self.instance_service.is_local_job_instance_existed().await? {
            tracing::info!(job_name = %self.job_name(), "Instance node restored after reconnect, keeping scheduler");
            return Ok(false);
        }
        tracing::warn!(job_name = %self.job_name(), "Instance node removed, shutting down local scheduler");
        self.facade.shutdown_instance().await?;
        Ok(true)
    }
}

struct InstanceShutdownStatusListener {
    manager: ShutdownListenerManager,
}

#[async_trait]
impl DataListener for InstanceShutdownStatusListener {
    fn name(&self) -> &'static str {
        "instance-shutdown"
    }

    async fn data_changed(&self, event: &DataEvent) -> Result<()> {
        self.manager.on_data_changed(event).await.map(|_| ())
    }
}
