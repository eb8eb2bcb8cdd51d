use chrono::Utc;

use crate::error::{LiteError, Result};
use crate::job::configuration::{JobConfiguration, SKEW_CHECK_DISABLED};
use crate::storage::node::CONFIG_NODE;
use crate::storage::JobNodeStorage;

/// Loads and persists a job's configuration and checks the local clock
/// against the registry clock.
#[derive(Clone)]
pub struct ConfigurationService {
    storage: JobNodeStorage,
}

impl ConfigurationService {
    pub fn new(storage: JobNodeStorage) -> Self {
        Self { storage }
    }

    /// Read the configuration. With `from_cache`, the cached copy wins when
    /// present; any miss falls through to a direct read.
    pub async fn load(&self, from_cache: bool) -> Result<JobConfiguration> {
        let cached = if from_cache {
            self.storage.get_job_node_data(CONFIG_NODE).await?
        } else {
            None
        };
        let raw = match cached {
            Some(raw) => Some(raw),
            None => self.storage.get_job_node_data_directly(CONFIG_NODE).await?,
        };
        match raw {
            Some(raw) => JobConfiguration::from_json(&raw),
            None => Err(LiteError::ConfigurationNotFound(
                self.storage.paths().job_name().to_string(),
            )),
        }
    }

    /// Persist `config` unless one is already registered and `config.overwrite`
    /// is off. A registered configuration naming a different job class is
    /// always a [`LiteError::ConfigurationConflict`], checked before validation.
    pub async fn persist(&self, config: &JobConfiguration) -> Result<()> {
        self.check_conflict_job(config).await?;
        config.validate()?;
        if !self.storage.is_job_node_existed(CONFIG_NODE).await? || config.overwrite {
            self.storage
                .replace_job_node(CONFIG_NODE, &config.to_json()?)
                .await?;
            tracing::info!(
                job_name = %config.job_name,
                job_class = %config.job_class,
                overwrite = config.overwrite,
                "Job configuration persisted"
            );
        } else {
            tracing::debug!(job_name = %config.job_name, "Job configuration already registered, keeping it");
        }
        Ok(())
    }

    async fn check_conflict_job(&self, config: &JobConfiguration) -> Result<()> {
        if let Some(registered) = self.find().await? {
            if registered.job_class != config.job_class {
                return Err(LiteError::ConfigurationConflict {
                    job_name: config.job_name.clone(),
                    registered_class: registered.job_class,
                    attempted_class: config.job_class.clone(),
                });
            }
        }
        Ok(())
    }

    /// The registered configuration, if readable. An unreadable `config` node
    /// is deleted so a fresh write can take its place.
    async fn find(&self) -> Result<Option<JobConfiguration>> {
        if !self.storage.is_job_node_existed(CONFIG_NODE).await? {
            return Ok(None);
        }
        let raw = self.storage.get_job_node_data_directly(CONFIG_NODE).await?;
        match raw.as_deref().map(JobConfiguration::from_json) {
            Some(Ok(config)) => Ok(Some(config)),
            Some(Err(e)) => {
                tracing::warn!(
                    job_name = %self.storage.paths().job_name(),
                    error = %e,
                    "Registered job configuration is unreadable, removing it"
                );
                self.storage.remove_job_node_if_existed(CONFIG_NODE).await?;
                Ok(None)
            }
            // Removed between the existence check and the read.
            None => Ok(None),
        }
    }

    /// Fail with [`LiteError::Environment`] when the local clock and the
    /// registry clock differ by more than `max_time_diff_seconds`.
    pub async fn check_max_time_diff_seconds_tolerable(&self) -> Result<()> {
        let max_secs = self.load(true).await?.max_time_diff_seconds;
        if max_secs == SKEW_CHECK_DISABLED {
            return Ok(());
        }
        let registry_ms = self.storage.registry_center_time().await?;
        let skew_ms = Utc::now().timestamp_millis().abs_diff(registry_ms);
        check_skew(skew_ms, max_secs)
    }
}

fn check_skew(skew_ms: u64, max_secs: i64) -> Result<()> {
    if max_secs == SKEW_CHECK_DISABLED {
        return Ok(());
    }
    let allowed_ms = u64::try_from(max_secs).unwrap_or(0).saturating_mul(1000);
    if skew_ms > allowed_ms {
        return Err(LiteError::Environment { skew_ms, max_secs });
    }
    Ok(())
}
