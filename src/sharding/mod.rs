//! Per-firing shard ownership.
//!
//! - [`ExecutionContextService`]: turns the candidate items of a firing into
//!   a [`ShardingContexts`], dropping items another firing still runs when
//!   monitor execution is on
//! - [`ExecutionService`]: running markers around a firing
//! - [`strategy`]: how candidate items are spread over instances

pub mod context;
pub mod execution;
pub mod strategy;

pub use context::{ShardingContext, ShardingContexts};
pub use execution::{ExecutionContextService, ExecutionService};
