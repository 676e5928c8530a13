//! Resource usage sampling
//!
//! Fetches one statistics record per container and reduces it to a
//! [`ContainerUsage`]. A sample that cannot be taken is reported as
//! unavailable, never as zero usage.

use crate::models::ContainerUsage;
use crate::observability::ScalerMetrics;
use crate::provider::ClusterProvider;
use std::sync::Arc;
use tracing::debug;

/// On-demand container usage sampler
#[derive(Clone)]
pub struct UsageSampler {
    provider: Arc<dyn ClusterProvider>,
    metrics: ScalerMetrics,
}

impl UsageSampler {
    pub fn new(provider: Arc<dyn ClusterProvider>) -> Self {
        Self {
            provider,
            metrics: ScalerMetrics::new(),
        }
    }

    /// Sample a container, returning `None` when statistics are unavailable
    pub async fn sample(&self, container_id: &str) -> Option<ContainerUsage> {
        match self.provider.container_stats(container_id).await {
            Ok(stats) => Some(stats.usage()),
            Err(e) => {
                self.metrics.inc_stats_unavailable();
                debug!(
                    container_id = %container_id,
                    error = %e,
                    "Container statistics unavailable"
                );
                None
            }
        }
    }
}
