//! API client for the scaler's HTTP surface

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use scaler_lib::ServiceStatus;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for a running swarm-scaler
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.fetch(path, false).await
    }

    /// GET a probe endpoint, which reports failure as 503 with a JSON body
    pub async fn get_probe<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.fetch(path, true).await
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str, accept_unavailable: bool) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let readable = status.is_success()
            || (accept_unavailable && status == StatusCode::SERVICE_UNAVAILABLE);
        if !readable {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub generated_at: DateTime<Utc>,
    pub services: Vec<ServiceStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use scaler_lib::{ComponentStatus, HealthResponse};

    #[tokio::test]
    async fn test_get_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/status")
            .with_status(200)
            .with_body(
                r#"{"generated_at": "2026-01-01T00:00:00Z", "services": [
                    {"service": "web", "decision": {"action": "scale_in", "nodes": ["n3"]},
                     "reason": "excess_capacity", "running": 3, "healthy": 3,
                     "updated_at": "2026-01-01T00:00:00Z"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let status: StatusResponse = client.get("status").await.unwrap();

        assert_eq!(status.services.len(), 1);
        assert_eq!(status.services[0].service, "web");
        assert_eq!(status.services[0].decision.nodes(), ["n3".to_string()]);
        assert!(status.services[0].staged_in.is_none());
    }

    #[tokio::test]
    async fn test_get_fails_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/status")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.get::<StatusResponse>("status").await.unwrap_err();

        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_probe_reads_unavailable_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_body(
                r#"{"status": "unhealthy", "components": {"scaler": {"status": "unhealthy",
                    "message": "loop crashed", "checked_at": "2026-01-01T00:00:00Z"}}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health: HealthResponse = client.get_probe("healthz").await.unwrap();

        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert_eq!(
            health.components["scaler"].message.as_deref(),
            Some("loop crashed")
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
