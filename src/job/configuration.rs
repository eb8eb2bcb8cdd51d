use serde::{Deserialize, Serialize};

use crate::error::{LiteError, Result};
use crate::job::parameters::ShardingItemParameters;

/// Disables the clock-skew check.
pub const SKEW_CHECK_DISABLED: i64 = -1;

/// Declarative job configuration, stored as JSON in the job's `config` node.
///
/// `job_class` binds the job name to one implementation fleet-wide; a
/// persisted configuration cannot be replaced by one naming a different class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfiguration {
    pub job_name: String,
    pub job_class: String,
    pub cron: String,
    pub sharding_total_count: u32,
    pub sharding_item_parameters: String,
    pub job_parameter: String,
    pub description: String,
    pub monitor_execution: bool,
    pub max_time_diff_seconds: i64,
    /// Start with the local server disabled.
    pub disabled: bool,
    /// Replace an existing configuration on persist. Never affects the class
    /// conflict check.
    pub overwrite: bool,
}

impl Default for JobConfiguration {
    fn default() -> Self {
        Self {
            job_name: String::new(),
            job_class: String::new(),
            cron: String::new(),
            sharding_total_count: 1,
            sharding_item_parameters: String::new(),
            job_parameter: String::new(),
            description: String::new(),
            monitor_execution: true,
            max_time_diff_seconds: SKEW_CHECK_DISABLED,
            disabled: false,
            overwrite: false,
        }
    }
}

impl JobConfiguration {
    pub fn new(
        job_name: impl Into<String>,
        job_class: impl Into<String>,
        sharding_total_count: u32,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            job_class: job_class.into(),
            sharding_total_count,
            ..Default::default()
        }
    }

    pub fn with_cron(mut self, cron: impl Into<String>) -> Self {
        self.cron = cron.into();
        self
    }

    pub fn with_sharding_item_parameters(mut self, parameters: impl Into<String>) -> Self {
        self.sharding_item_parameters = parameters.into();
        self
    }

    pub fn with_job_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.job_parameter = parameter.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_monitor_execution(mut self, monitor_execution: bool) -> Self {
        self.monitor_execution = monitor_execution;
        self
    }

    pub fn with_max_time_diff_seconds(mut self, seconds: i64) -> Self {
        self.max_time_diff_seconds = seconds;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn sharding_parameters(&self) -> Result<ShardingItemParameters> {
        ShardingItemParameters::parse(&self.sharding_item_parameters)
    }

    pub fn validate(&self) -> Result<()> {
        if self.job_name.trim().is_empty() {
            return Err(LiteError::InvalidConfiguration(
                "job name can not be empty".to_string(),
            ));
        }
        if self.job_name.contains('/') {
            return Err(LiteError::InvalidConfiguration(format!(
                "job name '{}' can not contain '/'",
                self.job_name
            )));
        }
        if self.job_class.trim().is_empty() {
            return Err(LiteError::InvalidConfiguration(format!(
                "job class of '{}' can not be empty",
                self.job_name
            )));
        }
        if self.sharding_total_count == 0 {
            return Err(LiteError::InvalidConfiguration(format!(
                "sharding total count of '{}' must be positive",
                self.job_name
            )));
        }
        if self.max_time_diff_seconds < SKEW_CHECK_DISABLED {
            return Err(LiteError::InvalidConfiguration(format!(
                "max time diff seconds of '{}' must be -1 or non-negative, got {}",
                self.job_name, self.max_time_diff_seconds
            )));
        }
        self.sharding_parameters().map(|_| ())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
