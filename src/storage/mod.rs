//! Typed access to the nodes of a single job.
//!
//! [`JobNodeStorage`] takes node names relative to the job root (see
//! [`node`] for the layout) and forwards to the registry. It adds no state of
//! its own, so any number of services can hold one for the same job.

pub mod node;

use std::sync::Arc;

use crate::error::Result;
use crate::reg::CoordinatorRegistry;

pub use node::JobNodePath;

#[derive(Clone)]
pub struct JobNodeStorage {
    registry: Arc<dyn CoordinatorRegistry>,
    paths: JobNodePath,
}

impl JobNodeStorage {
    pub fn new(registry: Arc<dyn CoordinatorRegistry>, job_name: impl Into<String>) -> Self {
        Self {
            registry,
            paths: JobNodePath::new(job_name),
        }
    }

    pub fn paths(&self) -> &JobNodePath {
        &self.paths
    }

    pub fn registry(&self) -> &Arc<dyn CoordinatorRegistry> {
        &self.registry
    }

    pub async fn is_job_node_existed(&self, node: &str) -> Result<bool> {
        self.registry.is_existed(&self.paths.full_path(node)).await
    }

    /// Cached read.
    pub async fn get_job_node_data(&self, node: &str) -> Result<Option<String>> {
        self.registry.get(&self.paths.full_path(node)).await
    }

    pub async fn get_job_node_data_directly(&self, node: &str) -> Result<Option<String>> {
        self.registry.get_directly(&self.paths.full_path(node)).await
    }

    pub async fn get_job_node_children_keys(&self, node: &str) -> Result<Vec<String>> {
        self.registry
            .get_children_keys(&self.paths.full_path(node))
            .await
    }

    /// Persistent set-or-create.
    pub async fn fill_job_node(&self, node: &str, value: &str) -> Result<()> {
        self.registry
            .persist(&self.paths.full_path(node), value)
            .await
    }

    pub async fn fill_ephemeral_job_node(&self, node: &str, value: &str) -> Result<()> {
        self.registry
            .persist_ephemeral(&self.paths.full_path(node), value)
            .await
    }

    /// Overwrite a persistent node whether or not it exists.
    pub async fn replace_job_node(&self, node: &str, value: &str) -> Result<()> {
        self.fill_job_node(node, value).await
    }

    /// Atomic ephemeral create. `false` means another session got there first.
    pub async fn create_ephemeral_if_absent(&self, node: &str, value: &str) -> Result<bool> {
        self.registry
            .create_if_absent(&self.paths.full_path(node), value)
            .await
    }

    pub async fn remove_job_node_if_existed(&self, node: &str) -> Result<()> {
        self.registry.remove(&self.paths.full_path(node)).await
    }

    pub async fn registry_center_time(&self) -> Result<i64> {
        self.registry.registry_time().await
    }
}
