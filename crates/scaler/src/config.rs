//! Scaler configuration

use anyhow::{Context, Result};
use scaler_lib::{DockerProviderConfig, ReconcilerSettings};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Scaler configuration, read from `SCALER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ScalerConfig {
    /// Name of the node the daemon runs on, used in logs
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Docker Engine API of a swarm manager
    #[serde(default = "default_docker_url")]
    pub docker_url: String,

    /// JSON file holding the scaling policies
    #[serde(default = "default_policy_path")]
    pub policy_path: PathBuf,

    /// API server port for health/metrics/status
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_interval")]
    pub config_interval_secs: u64,

    #[serde(default = "default_interval")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_interval")]
    pub scale_interval_secs: u64,

    /// Wait before restarting the reconciliation loop after a fault
    #[serde(default = "default_interval")]
    pub restart_backoff_secs: u64,

    /// Timeout for every Docker API request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_docker_url() -> String {
    "http://127.0.0.1:2375".to_string()
}

fn default_policy_path() -> PathBuf {
    PathBuf::from("/etc/swarm-scaler/services.json")
}

fn default_api_port() -> u16 {
    8080
}

fn default_interval() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

impl ScalerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_builder(
            config::Config::builder().add_source(config::Environment::with_prefix("SCALER")),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid scaler configuration")
    }

    pub fn docker_config(&self) -> DockerProviderConfig {
        DockerProviderConfig {
            base_url: self.docker_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            config_interval: Duration::from_secs(self.config_interval_secs),
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            scale_interval: Duration::from_secs(self.scale_interval_secs),
            restart_backoff: Duration::from_secs(self.restart_backoff_secs),
        }
    }
}
