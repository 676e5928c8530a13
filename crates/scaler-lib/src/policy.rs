//! Per-service scaling policies
//!
//! Policies are read from a JSON document of the form:
//!
//! ```json
//! {
//!   "services": [
//!     {
//!       "name": "web",
//!       "min_replicas": 3,
//!       "max_replicas": 5,
//!       "scale_out": { "cpu": 20, "memory": 50, "period": "1m" },
//!       "scale_in": { "cpu": 10, "memory": 25, "period": "1m" },
//!       "node_label": "web"
//!     }
//!   ]
//! }
//! ```

use crate::error::PolicyError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;

/// Resource thresholds and cooldown for one scaling direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleConditions {
    /// CPU percent threshold
    #[serde(rename = "cpu", default)]
    pub cpu_threshold: f64,
    /// Memory percent threshold
    #[serde(rename = "memory", default)]
    pub memory_threshold: f64,
    /// How long a condition must persist before acting
    #[serde(rename = "period", with = "humantime_serde", default)]
    pub cooldown: Duration,
}

/// Scaling policy for a single service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePolicy {
    pub name: String,
    pub min_replicas: usize,
    pub max_replicas: usize,
    pub scale_out: ScaleConditions,
    pub scale_in: ScaleConditions,
    /// Node label toggled to signal placement intent
    pub node_label: String,
}

impl ServicePolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::EmptyName);
        }
        if self.node_label.trim().is_empty() {
            return Err(PolicyError::EmptyNodeLabel {
                service: self.name.clone(),
            });
        }
        if self.min_replicas > self.max_replicas {
            return Err(PolicyError::InvalidBounds {
                service: self.name.clone(),
                min: self.min_replicas,
                max: self.max_replicas,
            });
        }
        Ok(())
    }
}

/// On-disk policy document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub services: Vec<ServicePolicy>,
}

/// Result of parsing a policy document
#[derive(Debug, Default)]
pub struct ParsedPolicies {
    pub valid: Vec<ServicePolicy>,
    pub rejected: Vec<(ServicePolicy, PolicyError)>,
}

/// Parse a JSON policy document, separating valid and rejected entries
pub fn parse_policies(content: &str) -> Result<ParsedPolicies> {
    let document: PolicyDocument =
        serde_json::from_str(content).context("Failed to parse policy document")?;

    let mut parsed = ParsedPolicies::default();
    for policy in document.services {
        match policy.validate() {
            Ok(()) => parsed.valid.push(policy),
            Err(e) => parsed.rejected.push((policy, e)),
        }
    }
    Ok(parsed)
}

/// Source of the current policy list
#[async_trait]
pub trait PolicyProvider: Send + Sync {
    /// Load the current set of valid policies
    async fn load(&self) -> Result<Vec<ServicePolicy>>;
}

/// Reads policies from a JSON file on every load
pub struct FilePolicyProvider {
    path: PathBuf,
}

impl FilePolicyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl PolicyProvider for FilePolicyProvider {
    async fn load(&self) -> Result<Vec<ServicePolicy>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let parsed = parse_policies(&content)?;
        for (policy, e) in &parsed.rejected {
            error!(service = %policy.name, error = %e, "Rejecting invalid scaling policy");
        }

        Ok(parsed.valid)
    }
}

/// Serves a fixed policy list
pub struct StaticPolicyProvider {
    policies: Vec<ServicePolicy>,
}

impl StaticPolicyProvider {
    pub fn new(policies: Vec<ServicePolicy>) -> Self {
        Self { policies }
    }
}

#[async_trait]
impl PolicyProvider for StaticPolicyProvider {
    async fn load(&self) -> Result<Vec<ServicePolicy>> {
        Ok(self.policies.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DOCUMENT: &str = r#"{
        "services": [
            {
                "name": "portainer",
                "min_replicas": 3,
                "max_replicas": 5,
                "scale_out": {"cpu": 20, "memory": 50, "period": "1m"},
                "scale_in": {"cpu": 10, "memory": 25, "period": "30s"},
                "node_label": "portainer"
            },
            {
                "name": "broken",
                "min_replicas": 4,
                "max_replicas": 2,
                "scale_out": {"cpu": 20, "memory": 50, "period": "0s"},
                "scale_in": {"cpu": 10, "memory": 25, "period": "0s"},
                "node_label": "broken"
            }
        ]
    }"#;

    #[test]
    fn test_parse_policy_document() {
        let parsed = parse_policies(DOCUMENT).unwrap();

        assert_eq!(parsed.valid.len(), 1);
        let policy = &parsed.valid[0];
        assert_eq!(policy.name, "portainer");
        assert_eq!(policy.scale_out.cpu_threshold, 20.0);
        assert_eq!(policy.scale_out.memory_threshold, 50.0);
        assert_eq!(policy.scale_out.cooldown, Duration::from_secs(60));
        assert_eq!(policy.scale_in.cooldown, Duration::from_secs(30));
        assert_eq!(policy.node_label, "portainer");
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let parsed = parse_policies(DOCUMENT).unwrap();

        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(
            parsed.rejected[0].1,
            PolicyError::InvalidBounds {
                service: "broken".to_string(),
                min: 4,
                max: 2
            }
        );
    }

    #[test]
    fn test_missing_period_means_no_cooldown() {
        let json = r#"{"services": [{"name": "web", "min_replicas": 1, "max_replicas": 2,
            "scale_out": {"cpu": 80, "memory": 80}, "scale_in": {"cpu": 10, "memory": 10},
            "node_label": "web"}]}"#;

        let parsed = parse_policies(json).unwrap();
        assert_eq!(parsed.valid[0].scale_out.cooldown, Duration::ZERO);
    }

    #[test]
    fn test_empty_label_rejected() {
        let json = r#"{"services": [{"name": "web", "min_replicas": 1, "max_replicas": 2,
            "scale_out": {"cpu": 80, "memory": 80}, "scale_in": {"cpu": 10, "memory": 10},
            "node_label": " "}]}"#;

        let parsed = parse_policies(json).unwrap();
        assert!(parsed.valid.is_empty());
        assert!(matches!(
            parsed.rejected[0].1,
            PolicyError::EmptyNodeLabel { .. }
        ));
    }

    #[test]
    fn test_malformed_document_is_error() {
        assert!(parse_policies("{\"services\": [{\"name\": 5}]}").is_err());
        assert!(parse_policies("not json").is_err());
    }

    #[tokio::test]
    async fn test_file_provider_reloads_on_every_call() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(DOCUMENT.as_bytes()).unwrap();
        let provider = FilePolicyProvider::new(file.path());

        assert_eq!(provider.load().await.unwrap().len(), 1);

        std::fs::write(file.path(), r#"{"services": []}"#).unwrap();
        assert!(provider.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_provider_missing_file() {
        let provider = FilePolicyProvider::new("/nonexistent/services.json");
        assert!(provider.load().await.is_err());
    }
}
