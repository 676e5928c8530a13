//! Service state projection
//!
//! Turns the cluster snapshot into a service-centric view: which instances
//! of a service are running, on which nodes, using how much CPU and memory.

use crate::models::{ServiceInstance, ServiceProjection};
use crate::sampler::UsageSampler;
use crate::snapshot::ClusterSnapshot;
use futures::future::join_all;
use tracing::debug;

/// Builds [`ServiceProjection`]s from a snapshot
#[derive(Clone)]
pub struct ServiceProjector {
    sampler: UsageSampler,
}

impl ServiceProjector {
    pub fn new(sampler: UsageSampler) -> Self {
        Self { sampler }
    }

    /// Project the named service.
    ///
    /// Instances whose statistics cannot be sampled, or whose node is no
    /// longer active, are left out of the projection for this cycle.
    pub async fn project(&self, service_name: &str, snapshot: &ClusterSnapshot) -> ServiceProjection {
        let service = match snapshot.service_by_name(service_name) {
            Some(s) => s.clone(),
            None => {
                debug!(service = %service_name, "Service not found in snapshot");
                return ServiceProjection::not_found();
            }
        };

        let tasks = snapshot.tasks_for_service(&service.id);
        let samples = join_all(tasks.iter().map(|t| self.sampler.sample(&t.container_id))).await;

        let mut instances = Vec::with_capacity(tasks.len());
        for (task, usage) in tasks.into_iter().zip(samples) {
            let Some(usage) = usage else {
                continue;
            };
            let Some(node) = snapshot.node(&task.node_id) else {
                debug!(
                    service = %service_name,
                    task_id = %task.id,
                    node_id = %task.node_id,
                    "Task runs on a node that is not active, skipping"
                );
                continue;
            };
            instances.push(ServiceInstance {
                node: node.clone(),
                usage,
            });
        }

        ServiceProjection {
            service: Some(service),
            instances,
        }
    }
}
