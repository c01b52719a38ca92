//! Range-query client for a Prometheus-compatible metrics backend
//!
//! The pipeline only depends on the [`RangeQuerier`] contract, never on
//! a concrete query language; the expressions themselves are supplied
//! by the caller as priority-ordered candidate lists.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// Query window handed to the backend verbatim.
#[derive(Debug, Clone)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
    pub step: String,
}

/// One labeled series of a range-query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledSeries {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    #[serde(default)]
    pub values: Vec<(f64, String)>,
}

impl LabeledSeries {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metric.get(key).map(String::as_str)
    }
}

/// Abstract range-query contract
#[async_trait]
pub trait RangeQuerier: Send + Sync {
    /// Evaluate one expression over the window.
    async fn query_range(&self, expr: &str, range: &TimeRange) -> Result<Vec<LabeledSeries>>;
}

/// HTTP client for the Prometheus `query_range` API.
pub struct PromClient {
    client: reqwest::Client,
    base_url: Url,
}

impl PromClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = Url::parse(base_url).context("Invalid metrics backend URL")?;
        Ok(Self { client, base_url })
    }

    pub fn with_defaults(base_url: &str) -> Result<Self> {
        Self::new(base_url, Duration::from_secs(20))
    }
}

#[async_trait]
impl RangeQuerier for PromClient {
    async fn query_range(&self, expr: &str, range: &TimeRange) -> Result<Vec<LabeledSeries>> {
        let url = self
            .base_url
            .join("api/v1/query_range")
            .context("Invalid query path")?;

        let response = self
            .client
            .get(url)
            .query(&[
                ("query", expr),
                ("start", range.start.as_str()),
                ("end", range.end.as_str()),
                ("step", range.step.as_str()),
            ])
            .send()
            .await
            .context("Failed to send range query")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("metrics backend error ({}): {}", status, body);
        }

        let envelope: RangeResponse = response
            .json()
            .await
            .context("Failed to parse range query response")?;

        if envelope.status != "success" {
            bail!(
                "range query failed: {}",
                envelope.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        Ok(envelope.data.result)
    }
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
    data: RangeData,
}

#[derive(Debug, Deserialize)]
struct RangeData {
    #[serde(default)]
    result: Vec<LabeledSeries>,
}
