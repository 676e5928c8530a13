//! Core data models for the autoscaler

use serde::{Deserialize, Serialize};

/// Role of a swarm node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Manager,
    Worker,
}

/// A ready and active swarm node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub address: String,
    pub hostname: String,
    pub role: NodeRole,
    pub leader: bool,
}

/// An orchestrator-level service definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
}

/// One live instance of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningTask {
    pub id: String,
    pub node_id: String,
    pub service_id: String,
    pub container_id: String,
}

/// Normalized resource usage of one container, in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// A running instance of a service together with its node and usage
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInstance {
    pub node: Node,
    pub usage: ContainerUsage,
}

/// Service-centric view of the cluster for a single scaling decision
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceProjection {
    /// `None` when no service with the requested name exists
    pub service: Option<Service>,
    pub instances: Vec<ServiceInstance>,
}

impl ServiceProjection {
    /// Projection for a service name that is not present in the snapshot
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn running_count(&self) -> usize {
        self.instances.len()
    }

    /// Whether any instance runs on the given node
    pub fn runs_on(&self, node_id: &str) -> bool {
        self.instances.iter().any(|i| i.node.id == node_id)
    }
}
