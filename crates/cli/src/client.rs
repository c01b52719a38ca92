//! API client for a live runner's status endpoints

use anyhow::{Context, Result};
use bench_lib::models::ExperimentPhase;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// HTTP client for the runner API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub scenario: String,
    pub phase: ExperimentPhase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_status() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/status")
            .with_status(200)
            .with_body(r#"{"scenario":"steady_10m","phase":"running"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let status: StatusResponse = client.get("status").await.unwrap();

        assert_eq!(status.scenario, "steady_10m");
        assert_eq!(status.phase, ExperimentPhase::Running);
    }

    #[tokio::test]
    async fn test_get_propagates_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/status")
            .with_status(503)
            .with_body("not ready")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result: Result<StatusResponse> = client.get("status").await;
        assert!(result.is_err());
    }
}
