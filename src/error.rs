use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiteError {
    #[error(
        "Job conflict with registry center. The job '{job_name}' in registry center's class is '{registered_class}', your job class is '{attempted_class}'"
    )]
    ConfigurationConflict {
        job_name: String,
        registered_class: String,
        attempted_class: String,
    },

    #[error(
        "Time different between job server and registry center exceed '{}' seconds, max time different is '{max_secs}' seconds",
        .skew_ms / 1000
    )]
    Environment { skew_ms: u64, max_secs: i64 },

    #[error("Job configuration not found: {0}")]
    ConfigurationNotFound(String),

    #[error("Invalid job configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Job not registered in this process: {0}")]
    JobNotRegistered(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LiteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_both_classes() {
        let err = LiteError::ConfigurationConflict {
            job_name: "billing".to_string(),
            registered_class: "com.acme.Billing".to_string(),
            attempted_class: "com.acme.Other".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'billing'"));
        assert!(msg.contains("'com.acme.Billing'"));
        assert!(msg.contains("'com.acme.Other'"));
    }

    #[test]
    fn environment_message_reports_seconds() {
        let err = LiteError::Environment {
            skew_ms: 12_500,
            max_secs: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("exceed '12' seconds"));
        assert!(msg.contains("'5' seconds"));
    }
}
