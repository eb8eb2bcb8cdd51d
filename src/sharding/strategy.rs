use std::collections::BTreeMap;

use crate::instance::JobInstance;

/// Split items `0..total` into contiguous equal runs, one per instance in the
/// given order; the remainder goes one item each to the first instances.
///
/// With 3 instances and 8 items: `[0,1,6] [2,3,7] [4,5]`.
pub fn average_allocation(
    instances: &[JobInstance],
    sharding_total_count: u32,
) -> BTreeMap<String, Vec<u32>> {
    let mut result = BTreeMap::new();
    if instances.is_empty() {
        return result;
    }
    let count = instances.len() as u32;
    let per_instance = sharding_total_count / count;
    let mut assignments: Vec<Vec<u32>> = (0..count)
        .map(|i| (i * per_instance..(i + 1) * per_instance).collect())
        .collect();
    for (offset, items) in (0..sharding_total_count % count).zip(assignments.iter_mut()) {
        items.push(per_instance * count + offset);
    }
    for (instance, items) in instances.iter().zip(assignments) {
        result.insert(instance.id().to_string(), items);
    }
    result
}
