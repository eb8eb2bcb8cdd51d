pub mod configuration;
pub mod parameters;
pub mod service;

pub use configuration::JobConfiguration;
pub use parameters::ShardingItemParameters;
pub use service::ConfigurationService;
