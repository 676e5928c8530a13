//! Shared fixtures for scaler-lib integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use scaler_lib::policy::ScaleConditions;
use scaler_lib::provider::{ClusterProvider, CpuStats, CpuUsage, MemoryStats, RawContainerStats};
use scaler_lib::{Node, NodeRole, ProviderError, RunningTask, Service, ServicePolicy};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct State {
    tasks: Vec<RunningTask>,
    labels: BTreeMap<String, BTreeMap<String, String>>,
    usage: HashMap<String, (f64, f64)>,
}

/// A tiny swarm: adding a label named after a service schedules a task of
/// that service on the node, removing it stops the task.
pub struct FakeCluster {
    nodes: Vec<Node>,
    services: Vec<Service>,
    state: Mutex<State>,
    next_task: AtomicUsize,
    stats_panics: AtomicUsize,
}

impl FakeCluster {
    pub fn new(node_ids: &[&str], service_names: &[&str]) -> Self {
        Self {
            nodes: node_ids.iter().map(|id| node(id)).collect(),
            services: service_names
                .iter()
                .map(|name| Service {
                    id: format!("svc-{}", name),
                    name: name.to_string(),
                })
                .collect(),
            state: Mutex::new(State::default()),
            next_task: AtomicUsize::new(0),
            stats_panics: AtomicUsize::new(0),
        }
    }

    /// Start an instance of `service` on `node_id` with the given usage
    pub fn run(&self, service: &str, node_id: &str, cpu: f64, memory: f64) {
        let n = self.next_task.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let container_id = format!("c{}", n);
        state.tasks.push(RunningTask {
            id: format!("t{}", n),
            node_id: node_id.to_string(),
            service_id: format!("svc-{}", service),
            container_id: container_id.clone(),
        });
        state.usage.insert(container_id, (cpu, memory));
    }

    /// Set the usage of every instance of `service`
    pub fn set_service_usage(&self, service: &str, cpu: f64, memory: f64) {
        let service_id = format!("svc-{}", service);
        let mut state = self.state.lock().unwrap();
        let containers: Vec<String> = state
            .tasks
            .iter()
            .filter(|t| t.service_id == service_id)
            .map(|t| t.container_id.clone())
            .collect();
        for container in containers {
            state.usage.insert(container, (cpu, memory));
        }
    }

    /// Panic on the next `count` statistics requests
    pub fn panic_on_stats(&self, count: usize) {
        self.stats_panics.store(count, Ordering::SeqCst);
    }

    pub fn pending_stats_panics(&self) -> usize {
        self.stats_panics.load(Ordering::SeqCst)
    }

    /// Nodes running `service`, sorted
    pub fn nodes_running(&self, service: &str) -> Vec<String> {
        let service_id = format!("svc-{}", service);
        let mut nodes: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .tasks
            .iter()
            .filter(|t| t.service_id == service_id)
            .map(|t| t.node_id.clone())
            .collect();
        nodes.sort();
        nodes
    }

    pub fn label(&self, node_id: &str, key: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .labels
            .get(node_id)
            .and_then(|labels| labels.get(key).cloned())
    }
}

#[async_trait]
impl ClusterProvider for FakeCluster {
    async fn list_services(&self) -> Result<Vec<Service>, ProviderError> {
        Ok(self.services.clone())
    }

    async fn list_active_ready_nodes(&self) -> Result<Vec<Node>, ProviderError> {
        Ok(self.nodes.clone())
    }

    async fn list_running_tasks(&self) -> Result<Vec<RunningTask>, ProviderError> {
        Ok(self.state.lock().unwrap().tasks.clone())
    }

    async fn container_stats(&self, container_id: &str) -> Result<RawContainerStats, ProviderError> {
        let remaining = self.stats_panics.load(Ordering::SeqCst);
        if remaining > 0 {
            self.stats_panics.store(remaining - 1, Ordering::SeqCst);
            panic!("injected statistics fault");
        }

        let usage = self.state.lock().unwrap().usage.get(container_id).copied();
        match usage {
            Some((cpu, memory)) => Ok(stats_with_usage(cpu, memory)),
            None => Err(ProviderError::Status {
                status: 404,
                body: format!("No such container: {}", container_id),
            }),
        }
    }

    async fn add_node_label(
        &self,
        node_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ProviderError> {
        self.state
            .lock()
            .unwrap()
            .labels
            .entry(node_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());

        let schedules = self.services.iter().any(|s| s.name == key)
            && !self.nodes_running(key).iter().any(|n| n == node_id);
        if schedules {
            self.run(key, node_id, 5.0, 5.0);
        }
        Ok(())
    }

    async fn remove_node_label(&self, node_id: &str, key: &str) -> Result<(), ProviderError> {
        let service_id = format!("svc-{}", key);
        let mut state = self.state.lock().unwrap();
        if let Some(labels) = state.labels.get_mut(node_id) {
            labels.remove(key);
        }
        state
            .tasks
            .retain(|t| !(t.service_id == service_id && t.node_id == node_id));
        Ok(())
    }
}

pub fn node(id: &str) -> Node {
    Node {
        id: id.to_string(),
        address: format!("10.0.1.{}", id.len()),
        hostname: id.to_string(),
        role: NodeRole::Worker,
        leader: false,
    }
}

/// Policy whose node label is the service name
pub fn policy(name: &str, min: usize, max: usize, out_period: Duration, in_period: Duration) -> ServicePolicy {
    ServicePolicy {
        name: name.to_string(),
        min_replicas: min,
        max_replicas: max,
        scale_out: ScaleConditions {
            cpu_threshold: 70.0,
            memory_threshold: 80.0,
            cooldown: out_period,
        },
        scale_in: ScaleConditions {
            cpu_threshold: 20.0,
            memory_threshold: 30.0,
            cooldown: in_period,
        },
        node_label: name.to_string(),
    }
}

/// Stats record that reduces to exactly the given percentages
pub fn stats_with_usage(cpu: f64, memory: f64) -> RawContainerStats {
    RawContainerStats {
        cpu_stats: CpuStats {
            cpu_usage: CpuUsage {
                total_usage: (cpu * 10.0).round() as u64,
                percpu_usage: None,
            },
            system_cpu_usage: Some(1000),
            online_cpus: Some(1),
        },
        precpu_stats: CpuStats {
            cpu_usage: CpuUsage::default(),
            system_cpu_usage: Some(0),
            online_cpus: Some(1),
        },
        memory_stats: MemoryStats {
            usage: Some((memory * 10.0).round() as u64),
            limit: Some(1000),
            stats: None,
        },
    }
}

/// Poll `check` until it holds or `timeout` passes
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
