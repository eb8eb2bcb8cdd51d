use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{LiteError, Result};
use crate::instance::JobInstance;
use crate::schedule::ScheduleController;

struct JobEntry {
    instance: JobInstance,
    controller: Option<Arc<dyn ScheduleController>>,
    shutdown: bool,
    /// Cancelled on shutdown; listener loops of the job watch it.
    shutdown_token: CancellationToken,
}

/// Per-process state of every job this process runs, keyed by job name.
///
/// Created once at process start-up and handed to each component; only this
/// process ever writes it. A job that was never registered counts as shut
/// down, so listeners of unknown jobs stay inert.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `instance` to `job_name`, replacing any previous registration.
    pub async fn register_instance(&self, job_name: &str, instance: JobInstance) {
        let mut jobs = self.jobs.write().await;
        tracing::debug!(job_name, instance_id = %instance, "Job instance registered");
        jobs.insert(
            job_name.to_string(),
            JobEntry {
                instance,
                controller: None,
                shutdown: false,
                shutdown_token: CancellationToken::new(),
            },
        );
    }

    pub async fn register_controller(
        &self,
        job_name: &str,
        controller: Arc<dyn ScheduleController>,
    ) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(job_name)
            .ok_or_else(|| LiteError::JobNotRegistered(job_name.to_string()))?;
        entry.controller = Some(controller);
        Ok(())
    }

    pub async fn job_instance(&self, job_name: &str) -> Option<JobInstance> {
        self.jobs
            .read()
            .await
            .get(job_name)
            .map(|entry| entry.instance.clone())
    }

    pub async fn require_job_instance(&self, job_name: &str) -> Result<JobInstance> {
        self.job_instance(job_name)
            .await
            .ok_or_else(|| LiteError::JobNotRegistered(job_name.to_string()))
    }

    pub async fn is_shutdown(&self, job_name: &str) -> bool {
        self.jobs
            .read()
            .await
            .get(job_name)
            .map_or(true, |entry| entry.shutdown)
    }

    /// Whether the job's schedule is paused. No controller means not paused.
    pub async fn is_paused(&self, job_name: &str) -> bool {
        self.jobs
            .read()
            .await
            .get(job_name)
            .and_then(|entry| entry.controller.as_ref())
            .is_some_and(|controller| controller.is_paused())
    }

    /// Token cancelled when the job shuts down. Unknown jobs get an
    /// already-cancelled token.
    pub async fn shutdown_token(&self, job_name: &str) -> CancellationToken {
        match self.jobs.read().await.get(job_name) {
            Some(entry) => entry.shutdown_token.clone(),
            None => {
                let token = CancellationToken::new();
                token.cancel();
                token
            }
        }
    }

    /// Mark the job shut down, stop its scheduler and cancel its listeners.
    /// Returns `false` if it was already shut down or never registered.
    pub async fn shutdown(&self, job_name: &str) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(job_name) else {
            return false;
        };
        if entry.shutdown {
            return false;
        }
        entry.shutdown = true;
        if let Some(controller) = &entry.controller {
            controller.shutdown();
        }
        entry.shutdown_token.cancel();
        tracing::info!(job_name, instance_id = %entry.instance, "Job shut down");
        true
    }

    pub async fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}
