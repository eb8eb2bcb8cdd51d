//! Running job instances and their presence in the registry.
//!
//! - [`JobInstance`]: identity of one process running a job (`ip@-@pid`)
//! - [`InstanceService`]: ephemeral presence under `instances/`
//! - [`shutdown::ShutdownListenerManager`]: stops the local scheduler when the
//!   presence node is removed for good

pub mod service;
pub mod shutdown;

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

pub use service::InstanceService;
pub use shutdown::ShutdownListenerManager;

pub const DELIMITER: &str = "@-@";

/// Placeholder id used in task ids before the local instance is registered.
pub const UNREGISTERED_INSTANCE_ID: &str = "127.0.0.1@-@1";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobInstance {
    job_instance_id: String,
}

impl JobInstance {
    pub fn new(ip: IpAddr, pid: u32) -> Self {
        Self {
            job_instance_id: format!("{}{}{}", ip, DELIMITER, pid),
        }
    }

    pub fn from_id(job_instance_id: impl Into<String>) -> Self {
        Self {
            job_instance_id: job_instance_id.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.job_instance_id
    }

    pub fn ip(&self) -> &str {
        instance_ip(&self.job_instance_id)
    }
}

impl fmt::Display for JobInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.job_instance_id)
    }
}

/// Host part of an instance id.
pub fn instance_ip(job_instance_id: &str) -> &str {
    job_instance_id
        .split_once(DELIMITER)
        .map(|(ip, _)| ip)
        .unwrap_or(job_instance_id)
}

/// Whether `job_instance_id` belongs to host `ip`. Matches on `ip@-@`, so
/// `10.0.0.1` does not claim `10.0.0.10@-@7`.
pub fn is_instance_of_host(job_instance_id: &str, ip: &str) -> bool {
    job_instance_id
        .strip_prefix(ip)
        .is_some_and(|rest| rest.starts_with(DELIMITER))
}
