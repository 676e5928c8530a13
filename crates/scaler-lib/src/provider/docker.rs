//! Docker Engine API client for swarm mode
//!
//! Talks plain HTTP to a Docker daemon running as a swarm manager, either
//! exposed on TCP or through a socket proxy.

use super::{ClusterProvider, RawContainerStats};
use crate::error::ProviderError;
use crate::models::{Node, NodeRole, RunningTask, Service};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Configuration for the Docker provider
#[derive(Debug, Clone)]
pub struct DockerProviderConfig {
    /// Engine API base URL (e.g., "http://127.0.0.1:2375" or "http://manager:2375/v1.43")
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for DockerProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:2375".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// [`ClusterProvider`] backed by the Docker Engine HTTP API
pub struct DockerProvider {
    client: Client,
    base_url: Url,
}

impl DockerProvider {
    /// Create a new Docker provider
    pub fn new(config: DockerProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        // Url::join drops the last path segment unless the base ends with '/'
        let mut base = config.base_url;
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = self.base_url.join(path)?;
        debug!(url = %url, "GET");

        let response = self.client.get(url).query(query).send().await?;
        let body = check_status(response).await?.bytes().await?;

        Ok(serde_json::from_slice(&body)?)
    }

    /// Read-modify-write of a node spec's labels
    async fn update_node_labels<F>(&self, node_id: &str, mutate: F) -> Result<(), ProviderError>
    where
        F: FnOnce(&mut serde_json::Map<String, serde_json::Value>) -> bool,
    {
        let node: serde_json::Value = self.get_json(&format!("nodes/{}", node_id), &[]).await?;

        let version = node["Version"]["Index"].as_u64().unwrap_or(0);
        let mut spec = node["Spec"].clone();
        if !spec.is_object() {
            spec = serde_json::json!({});
        }
        if !spec["Labels"].is_object() {
            spec["Labels"] = serde_json::json!({});
        }

        let changed = match spec["Labels"].as_object_mut() {
            Some(labels) => mutate(labels),
            None => false,
        };
        if !changed {
            return Ok(());
        }

        let url = self.base_url.join(&format!("nodes/{}/update", node_id))?;
        let response = self
            .client
            .post(url)
            .query(&[("version", version.to_string())])
            .json(&spec)
            .send()
            .await?;
        check_status(response).await?;

        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status { status, body })
}

#[async_trait]
impl ClusterProvider for DockerProvider {
    async fn list_services(&self) -> Result<Vec<Service>, ProviderError> {
        let services: Vec<DockerService> = self.get_json("services", &[]).await?;

        Ok(services
            .into_iter()
            .map(|s| Service {
                id: s.id,
                name: s.spec.name,
            })
            .collect())
    }

    async fn list_active_ready_nodes(&self) -> Result<Vec<Node>, ProviderError> {
        let nodes: Vec<DockerNode> = self.get_json("nodes", &[]).await?;

        Ok(nodes
            .into_iter()
            .filter(|n| n.status.state == "ready" && n.spec.availability == "active")
            .map(|n| Node {
                role: if n.spec.role == "manager" {
                    NodeRole::Manager
                } else {
                    NodeRole::Worker
                },
                leader: n.manager_status.map(|m| m.leader).unwrap_or(false),
                address: n.status.addr,
                hostname: n.description.hostname,
                id: n.id,
            })
            .collect())
    }

    async fn list_running_tasks(&self) -> Result<Vec<RunningTask>, ProviderError> {
        let filters = r#"{"desired-state":["running"]}"#;
        let tasks: Vec<DockerTask> = self.get_json("tasks", &[("filters", filters)]).await?;

        Ok(tasks
            .into_iter()
            .filter(|t| t.status.state == "running")
            .filter_map(|t| {
                let container_id = t.status.container_status?.container_id;
                if container_id.is_empty() {
                    return None;
                }
                Some(RunningTask {
                    id: t.id,
                    node_id: t.node_id,
                    service_id: t.service_id,
                    container_id,
                })
            })
            .collect())
    }

    async fn container_stats(&self, container_id: &str) -> Result<RawContainerStats, ProviderError> {
        self.get_json(
            &format!("containers/{}/stats", container_id),
            &[("stream", "false")],
        )
        .await
    }

    async fn add_node_label(
        &self,
        node_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ProviderError> {
        self.update_node_labels(node_id, |labels| {
            let value = serde_json::Value::String(value.to_string());
            if labels.get(key) == Some(&value) {
                return false;
            }
            labels.insert(key.to_string(), value);
            true
        })
        .await
    }

    async fn remove_node_label(&self, node_id: &str, key: &str) -> Result<(), ProviderError> {
        self.update_node_labels(node_id, |labels| labels.remove(key).is_some())
            .await
    }
}

// Engine API wire types. Only the fields the autoscaler reads are decoded.

#[derive(Debug, Deserialize)]
struct DockerService {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Spec")]
    spec: DockerServiceSpec,
}

#[derive(Debug, Deserialize)]
struct DockerServiceSpec {
    #[serde(rename = "Name", default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct DockerNode {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Spec", default)]
    spec: DockerNodeSpec,
    #[serde(rename = "Description", default)]
    description: DockerNodeDescription,
    #[serde(rename = "Status", default)]
    status: DockerNodeStatus,
    #[serde(rename = "ManagerStatus")]
    manager_status: Option<DockerManagerStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DockerNodeSpec {
    role: String,
    availability: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DockerNodeDescription {
    hostname: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DockerNodeStatus {
    state: String,
    addr: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DockerManagerStatus {
    #[serde(default)]
    leader: bool,
}

#[derive(Debug, Deserialize)]
struct DockerTask {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "NodeID", default)]
    node_id: String,
    #[serde(rename = "ServiceID", default)]
    service_id: String,
    #[serde(rename = "Status", default)]
    status: DockerTaskStatus,
}

#[derive(Debug, Default, Deserialize)]
struct DockerTaskStatus {
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "ContainerStatus")]
    container_status: Option<DockerContainerStatus>,
}

#[derive(Debug, Deserialize)]
struct DockerContainerStatus {
    #[serde(rename = "ContainerID", default)]
    container_id: String,
}
