//! Autoscaling library for Docker Swarm services
//!
//! This crate provides the core functionality for:
//! - Querying the orchestrator for nodes, services, tasks and container stats
//! - Keeping an atomically published snapshot of cluster state
//! - Projecting per-service usage and deciding when to scale out or in
//! - Signalling placement through node labels
//! - Supervised reconciliation, health checks and observability

pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod policy;
pub mod projector;
pub mod provider;
pub mod reconcile;
pub mod sampler;
pub mod scaler;
pub mod selector;
pub mod snapshot;

#[cfg(test)]
mod test_support;

pub use engine::{Decision, DecisionEngine, DecisionReason, Direction, Evaluation};
pub use error::{PolicyError, ProviderError, ReconcileError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ScalerMetrics, StructuredLogger};
pub use policy::{
    parse_policies, FilePolicyProvider, PolicyProvider, ServicePolicy, StaticPolicyProvider,
};
pub use provider::{ClusterProvider, DockerProvider, DockerProviderConfig};
pub use reconcile::{run_reconciliation_forever, ReconcilerSettings, Supervisor};
pub use scaler::{DecisionLog, ServiceStatus};
pub use snapshot::{ClusterSnapshot, SnapshotStore};
