use std::collections::BTreeMap;

use serde::Serialize;

/// What the local instance may execute in one firing.
///
/// Built fresh for every firing and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardingContexts {
    pub task_id: String,
    pub job_name: String,
    pub sharding_total_count: u32,
    pub job_parameter: String,
    /// Assigned item -> its parameter (empty when none is configured).
    pub sharding_item_parameters: BTreeMap<u32, String>,
    pub monitor_execution: bool,
}

impl ShardingContexts {
    pub fn items(&self) -> Vec<u32> {
        self.sharding_item_parameters.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sharding_item_parameters.is_empty()
    }

    /// Context handed to job logic for a single assigned item.
    pub fn sharding_context(&self, item: u32) -> Option<ShardingContext> {
        self.sharding_item_parameters
            .get(&item)
            .map(|parameter| ShardingContext {
                job_name: self.job_name.clone(),
                task_id: self.task_id.clone(),
                sharding_total_count: self.sharding_total_count,
                job_parameter: self.job_parameter.clone(),
                sharding_item: item,
                sharding_parameter: parameter.clone(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardingContext {
    pub job_name: String,
    pub task_id: String,
    pub sharding_total_count: u32,
    pub job_parameter: String,
    pub sharding_item: u32,
    pub sharding_parameter: String,
}
