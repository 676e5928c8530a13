//! Cluster snapshot store
//!
//! Holds the latest known nodes, services and running tasks. A refresh
//! builds a complete new [`ClusterSnapshot`] and publishes it with a single
//! atomic swap, so readers always see one consistent snapshot.

use crate::error::ProviderError;
use crate::models::{Node, RunningTask, Service};
use crate::provider::ClusterProvider;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Point-in-time view of the cluster
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    nodes: HashMap<String, Node>,
    /// Node ids in the order the provider reported them
    node_order: Vec<String>,
    services: HashMap<String, Service>,
    tasks: HashMap<String, RunningTask>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl ClusterSnapshot {
    /// Build a snapshot from provider listings
    pub fn new(nodes: Vec<Node>, services: Vec<Service>, tasks: Vec<RunningTask>) -> Self {
        let mut snapshot = Self::default();
        snapshot.replace_nodes(nodes);
        snapshot.services = services.into_iter().map(|s| (s.id.clone(), s)).collect();
        snapshot.tasks = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        snapshot
    }

    fn replace_nodes(&mut self, nodes: Vec<Node>) {
        self.node_order = nodes.iter().map(|n| n.id.clone()).collect();
        self.nodes = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    /// Active nodes in provider order
    pub fn active_nodes(&self) -> Vec<Node> {
        self.node_order
            .iter()
            .filter_map(|id| self.nodes.get(id).cloned())
            .collect()
    }

    /// First service with the given name
    pub fn service_by_name(&self, name: &str) -> Option<&Service> {
        self.services.values().find(|s| s.name == name)
    }

    /// Running tasks of a service, ordered by task id
    pub fn tasks_for_service(&self, service_id: &str) -> Vec<&RunningTask> {
        let mut tasks: Vec<&RunningTask> = self
            .tasks
            .values()
            .filter(|t| t.service_id == service_id)
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// When the last refresh that touched this snapshot finished
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }
}

/// Portions of a refresh that could not be fetched
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub nodes: Option<ProviderError>,
    pub services: Option<ProviderError>,
    pub tasks: Option<ProviderError>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.nodes.is_none() && self.services.is_none() && self.tasks.is_none()
    }

    /// Whether every portion failed
    pub fn is_total_failure(&self) -> bool {
        self.nodes.is_some() && self.services.is_some() && self.tasks.is_some()
    }

    pub fn failure_count(&self) -> usize {
        [&self.nodes, &self.services, &self.tasks]
            .iter()
            .filter(|e| e.is_some())
            .count()
    }
}

/// Atomically published cluster snapshot
pub struct SnapshotStore {
    current: ArcSwap<ClusterSnapshot>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    /// Create a store holding an empty snapshot
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(ClusterSnapshot::default()),
        }
    }

    /// Latest published snapshot
    pub fn current(&self) -> Arc<ClusterSnapshot> {
        self.current.load_full()
    }

    /// Replace the published snapshot
    pub fn publish(&self, snapshot: ClusterSnapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Fetch nodes, services and tasks and publish a new snapshot.
    ///
    /// A portion whose fetch fails keeps its previous contents; every
    /// portion that succeeds is replaced by exactly what the provider
    /// reported, so entities the orchestrator no longer lists are evicted.
    pub async fn refresh(&self, provider: &dyn ClusterProvider) -> RefreshReport {
        let (nodes, services, tasks) = tokio::join!(
            provider.list_active_ready_nodes(),
            provider.list_services(),
            provider.list_running_tasks(),
        );

        let mut next = ClusterSnapshot::clone(&self.current());
        let mut report = RefreshReport::default();

        match nodes {
            Ok(nodes) => next.replace_nodes(nodes),
            Err(e) => {
                warn!(error = %e, "Failed to refresh nodes, keeping previous node list");
                report.nodes = Some(e);
            }
        }

        match services {
            Ok(services) => {
                next.services = services.into_iter().map(|s| (s.id.clone(), s)).collect();
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh services, keeping previous service list");
                report.services = Some(e);
            }
        }

        match tasks {
            Ok(tasks) => {
                next.tasks = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh tasks, keeping previous task list");
                report.tasks = Some(e);
            }
        }

        if !report.is_total_failure() {
            next.refreshed_at = Some(Utc::now());
            debug!(
                nodes = next.node_count(),
                services = next.service_count(),
                tasks = next.task_count(),
                "Cluster snapshot refreshed"
            );
            self.publish(next);
        }

        report
    }
}
