//! In-memory provider and fixtures for unit tests

use crate::error::ProviderError;
use crate::models::{Node, NodeRole, RunningTask, Service};
use crate::provider::{ClusterProvider, CpuStats, CpuUsage, MemoryStats, RawContainerStats};
use crate::engine::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += chrono::Duration::from_std(by).unwrap();
    }

    pub fn rewind(&self, by: Duration) {
        *self.now.lock().unwrap() -= chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A label mutation observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelCall {
    Add {
        node: String,
        key: String,
        value: String,
    },
    Remove {
        node: String,
        key: String,
    },
}

#[derive(Default)]
pub struct MockProvider {
    nodes: Mutex<Vec<Node>>,
    services: Mutex<Vec<Service>>,
    tasks: Mutex<Vec<RunningTask>>,
    stats: Mutex<HashMap<String, RawContainerStats>>,
    labels: Mutex<Vec<LabelCall>>,
    fail_nodes: AtomicBool,
    fail_services: AtomicBool,
    fail_tasks: AtomicBool,
    fail_labels: AtomicBool,
    stats_calls: AtomicUsize,
}

fn unavailable() -> ProviderError {
    ProviderError::Status {
        status: 503,
        body: "unavailable".to_string(),
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(self, nodes: Vec<Node>) -> Self {
        self.set_nodes(nodes);
        self
    }

    pub fn with_services(self, services: Vec<Service>) -> Self {
        *self.services.lock().unwrap() = services;
        self
    }

    pub fn with_tasks(self, tasks: Vec<RunningTask>) -> Self {
        self.set_tasks(tasks);
        self
    }

    pub fn with_usage(self, container_id: &str, cpu: f64, memory: f64) -> Self {
        self.set_usage(container_id, cpu, memory);
        self
    }

    pub fn set_nodes(&self, nodes: Vec<Node>) {
        *self.nodes.lock().unwrap() = nodes;
    }

    pub fn set_tasks(&self, tasks: Vec<RunningTask>) {
        *self.tasks.lock().unwrap() = tasks;
    }

    pub fn set_usage(&self, container_id: &str, cpu: f64, memory: f64) {
        self.stats
            .lock()
            .unwrap()
            .insert(container_id.to_string(), stats_with_usage(cpu, memory));
    }

    pub fn fail_nodes(&self, fail: bool) {
        self.fail_nodes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_services(&self, fail: bool) {
        self.fail_services.store(fail, Ordering::SeqCst);
    }

    pub fn fail_tasks(&self, fail: bool) {
        self.fail_tasks.store(fail, Ordering::SeqCst);
    }

    pub fn fail_labels(&self, fail: bool) {
        self.fail_labels.store(fail, Ordering::SeqCst);
    }

    pub fn label_calls(&self) -> Vec<LabelCall> {
        self.labels.lock().unwrap().clone()
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterProvider for MockProvider {
    async fn list_services(&self) -> Result<Vec<Service>, ProviderError> {
        if self.fail_services.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.services.lock().unwrap().clone())
    }

    async fn list_active_ready_nodes(&self) -> Result<Vec<Node>, ProviderError> {
        if self.fail_nodes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn list_running_tasks(&self) -> Result<Vec<RunningTask>, ProviderError> {
        if self.fail_tasks.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn container_stats(&self, container_id: &str) -> Result<RawContainerStats, ProviderError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        self.stats
            .lock()
            .unwrap()
            .get(container_id)
            .cloned()
            .ok_or_else(|| ProviderError::Status {
                status: 404,
                body: format!("No such container: {}", container_id),
            })
    }

    async fn add_node_label(
        &self,
        node_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ProviderError> {
        self.labels.lock().unwrap().push(LabelCall::Add {
            node: node_id.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        if self.fail_labels.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    async fn remove_node_label(&self, node_id: &str, key: &str) -> Result<(), ProviderError> {
        self.labels.lock().unwrap().push(LabelCall::Remove {
            node: node_id.to_string(),
            key: key.to_string(),
        });
        if self.fail_labels.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

pub fn node(id: &str) -> Node {
    Node {
        id: id.to_string(),
        address: format!("10.0.0.{}", id.len()),
        hostname: format!("host-{}", id),
        role: NodeRole::Worker,
        leader: false,
    }
}

pub fn service(id: &str, name: &str) -> Service {
    Service {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn task(id: &str, node_id: &str, service_id: &str, container_id: &str) -> RunningTask {
    RunningTask {
        id: id.to_string(),
        node_id: node_id.to_string(),
        service_id: service_id.to_string(),
        container_id: container_id.to_string(),
    }
}

/// Stats record that reduces to exactly the given percentages (one CPU,
/// a system delta of 1000 and a memory limit of 1000)
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
