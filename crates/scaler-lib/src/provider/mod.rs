//! Cluster state provider
//!
//! The orchestrator is an external collaborator. Everything the autoscaler
//! needs from it goes through [`ClusterProvider`]: listing services, nodes
//! and running tasks, sampling container statistics, and toggling node labels.

mod docker;
mod stats;

pub use docker::{DockerProvider, DockerProviderConfig};
pub use stats::{CpuStats, CpuUsage, MemoryStats, RawContainerStats};

use crate::error::ProviderError;
use crate::models::{Node, RunningTask, Service};
use async_trait::async_trait;

/// Read and label-mutation access to the orchestrator
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    /// List all services known to the orchestrator
    async fn list_services(&self) -> Result<Vec<Service>, ProviderError>;

    /// List nodes that are ready and have active availability
    async fn list_active_ready_nodes(&self) -> Result<Vec<Node>, ProviderError>;

    /// List tasks currently in the running state
    async fn list_running_tasks(&self) -> Result<Vec<RunningTask>, ProviderError>;

    /// Fetch a single non-streaming statistics record for a container
    async fn container_stats(&self, container_id: &str) -> Result<RawContainerStats, ProviderError>;

    /// Set a label on a node. Idempotent.
    async fn add_node_label(&self, node_id: &str, key: &str, value: &str)
        -> Result<(), ProviderError>;

    /// Remove a label from a node. Removing an absent label succeeds.
    async fn remove_node_label(&self, node_id: &str, key: &str) -> Result<(), ProviderError>;
}
