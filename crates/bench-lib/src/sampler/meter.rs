//! Power meter clients
//!
//! The sampler only depends on the [`PowerMeter`] trait; the concrete
//! client speaks the Shelly plug's HTTP status endpoint. First-gen
//! firmware reports under `meters`, the energy-meter models under
//! `emeter`; both are tried before giving up on a payload.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A single successful poll of the meter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterReading {
    pub power_w: f64,
    pub voltage_v: Option<f64>,
    pub energy_total_wh: Option<f64>,
}

#[derive(Debug, Error)]
pub enum MeterError {
    #[error("meter request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("meter returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("meter status payload has no power reading")]
    NoPowerField,
}

/// Trait for power meter implementations
#[async_trait]
pub trait PowerMeter: Send + Sync {
    /// Poll the meter once.
    async fn read(&self) -> Result<MeterReading, MeterError>;
}

/// HTTP client for a Shelly plug's `/status` endpoint.
pub struct ShellyMeter {
    client: reqwest::Client,
    status_url: Url,
}

impl ShellyMeter {
    /// Create a client for the meter at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base: Url = base_url.parse()?;
        let status_url = base.join("status")?;
        Ok(Self { client, status_url })
    }

    pub fn with_defaults(base_url: &str) -> anyhow::Result<Self> {
        Self::new(base_url, Duration::from_secs(3))
    }
}

#[async_trait]
impl PowerMeter for ShellyMeter {
    async fn read(&self) -> Result<MeterReading, MeterError> {
        let response = self.client.get(self.status_url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(MeterError::Status(response.status()));
        }
        let status: ShellyStatus = response.json().await?;
        status.into_reading()
    }
}

#[derive(Debug, Deserialize)]
struct ShellyStatus {
    #[serde(default)]
    meters: Vec<MeterBlock>,
    emeter: Option<EmeterBlock>,
}

#[derive(Debug, Deserialize)]
struct MeterBlock {
    power: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EmeterBlock {
    power: Option<f64>,
    voltage: Option<f64>,
    /// Lifetime import counter, already in watt-hours.
    total: Option<f64>,
}

impl ShellyStatus {
    fn into_reading(self) -> Result<MeterReading, MeterError> {
        if let Some(power_w) = self.meters.first().and_then(|m| m.power) {
            return Ok(MeterReading {
                power_w,
                voltage_v: None,
                energy_total_wh: None,
            });
        }
        if let Some(emeter) = self.emeter {
            if let Some(power_w) = emeter.power {
                return Ok(MeterReading {
                    power_w,
                    voltage_v: emeter.voltage,
                    energy_total_wh: emeter.total,
                });
            }
        }
        Err(MeterError::NoPowerField)
    }
}
