pub mod config;
pub mod election;
pub mod error;
pub mod instance;
pub mod job;
pub mod listener;
pub mod node;
pub mod reg;
pub mod schedule;
pub mod server;
pub mod sharding;
pub mod storage;
