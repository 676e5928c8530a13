//! Node selection for scaling actions

use crate::models::{Node, ServiceProjection};
use std::collections::HashSet;

/// Up to `count` active nodes not already running the service, in the
/// order of `active_nodes`
pub fn candidates_for_scale_out(
    projection: &ServiceProjection,
    active_nodes: &[Node],
    count: usize,
) -> Vec<String> {
    let mut taken: HashSet<&str> = projection
        .instances
        .iter()
        .map(|i| i.node.id.as_str())
        .collect();

    let mut nodes = Vec::with_capacity(count);
    for node in active_nodes {
        if nodes.len() == count {
            break;
        }
        if taken.insert(node.id.as_str()) {
            nodes.push(node.id.clone());
        }
    }
    nodes
}

/// Up to `count` nodes running the service, least loaded first.
///
/// Instances are ordered by CPU usage, then memory usage, then their
/// position in the projection. A node hosting several instances is
/// selected once.
pub fn least_loaded_for_scale_in(projection: &ServiceProjection, count: usize) -> Vec<String> {
    let mut instances: Vec<_> = projection.instances.iter().collect();
    instances.sort_by(|a, b| {
        a.usage
            .cpu_percent
            .total_cmp(&b.usage.cpu_percent)
            .then_with(|| a.usage.memory_percent.total_cmp(&b.usage.memory_percent))
    });

    let mut seen = HashSet::new();
    instances
        .into_iter()
        .filter(|i| seen.insert(i.node.id.as_str()))
        .take(count)
        .map(|i| i.node.id.clone())
        .collect()
}
