//! Node layout under a job's namespace.
//!
//! ```text
//! /{job}/config
//! /{job}/servers/{ip}
//! /{job}/instances/{ip}@-@{pid}
//! /{job}/leader/election/instance
//! /{job}/sharding/{item}/running
//! ```

pub const CONFIG_NODE: &str = "config";
pub const SERVERS_ROOT: &str = "servers";
pub const INSTANCES_ROOT: &str = "instances";
pub const LEADER_INSTANCE_NODE: &str = "leader/election/instance";
pub const SHARDING_ROOT: &str = "sharding";

/// Resolves relative node names to absolute registry paths for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNodePath {
    job_name: String,
}

impl JobNodePath {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn root(&self) -> String {
        format!("/{}", self.job_name)
    }

    pub fn full_path(&self, node: &str) -> String {
        format!("/{}/{}", self.job_name, node)
    }

    pub fn config_path(&self) -> String {
        self.full_path(CONFIG_NODE)
    }

    pub fn server_path(&self, ip: &str) -> String {
        self.full_path(&server_node(ip))
    }

    pub fn instance_path(&self, instance_id: &str) -> String {
        self.full_path(&instance_node(instance_id))
    }

    pub fn leader_instance_path(&self) -> String {
        self.full_path(LEADER_INSTANCE_NODE)
    }

    pub fn running_path(&self, item: u32) -> String {
        self.full_path(&running_node(item))
    }
}

pub fn server_node(ip: &str) -> String {
    format!("{}/{}", SERVERS_ROOT, ip)
}

pub fn instance_node(instance_id: &str) -> String {
    format!("{}/{}", INSTANCES_ROOT, instance_id)
}

pub fn running_node(item: u32) -> String {
    format!("{}/{}/running", SHARDING_ROOT, item)
}
