//! Core data models for the attribution engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One reading of the external power meter.
///
/// `ts` is an ISO-8601 timestamp; it is normalized to UTC second
/// resolution before the sample enters the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSample {
    pub ts: String,
    pub power_w: f64,
    #[serde(rename = "voltage_V", default, skip_serializing_if = "Option::is_none")]
    pub voltage_v: Option<f64>,
    #[serde(rename = "energy_total_Wh", default, skip_serializing_if = "Option::is_none")]
    pub energy_total_wh: Option<f64>,
}

/// One line of the append-only power log.
///
/// A failed meter poll is written in-band as an error record; readers
/// skip error records instead of aborting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PowerRecord {
    Sample(PowerSample),
    Error { ts: String, error: String },
}

/// One scraped CPU reading for a single service.
///
/// `cpu_percent_host` may be absent in the raw file; the timeline
/// builder derives it from the configured host core count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuSample {
    pub ts: String,
    pub cpu_cores_used: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_percent_host: Option<f64>,
}

/// CPU usage of one service at one normalized instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceCpu {
    pub cpu_cores_used: f64,
    pub cpu_percent_host: f64,
}

/// A fully populated instant: one power reading plus at least one
/// service reading, matched within the skew tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedInstant {
    pub ts: String,
    pub power: PowerSample,
    pub services: BTreeMap<String, ServiceCpu>,
}

/// An aligned instant after proportional apportionment.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributedInstant {
    pub ts: String,
    pub power_w: f64,
    pub services: BTreeMap<String, AttributedCpu>,
}

/// Per-service share of the instant's power reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributedCpu {
    pub cpu_cores_used: f64,
    pub cpu_percent_host: f64,
    pub estimated_power_w: f64,
}

/// One row of a per-service output series.
///
/// The estimated-power field keeps the wire name used by the recorded
/// artifacts so downstream tooling can consume either producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedReading {
    pub ts: String,
    pub cpu_cores_used: f64,
    pub cpu_percent_host: f64,
    #[serde(rename = "estimated_power_from_shelly_watt")]
    pub estimated_power_w: f64,
}

/// Chronological attribution series, keyed by service name.
pub type ServiceSeries = BTreeMap<String, Vec<AttributedReading>>;

/// Phase of a single experiment run.
///
/// Transitions move strictly forward; `Stopped` and `Failed` are
/// terminal. The sequencer is the only writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentPhase {
    Idle,
    WarmingUp,
    Running,
    CoolingDown,
    Stopped,
    Failed,
}

impl ExperimentPhase {
    /// Returns true for states the sequencer never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExperimentPhase::Stopped | ExperimentPhase::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentPhase::Idle => "idle",
            ExperimentPhase::WarmingUp => "warming_up",
            ExperimentPhase::Running => "running",
            ExperimentPhase::CoolingDown => "cooling_down",
            ExperimentPhase::Stopped => "stopped",
            ExperimentPhase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExperimentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_record_sample_roundtrip() {
        let line = r#"{"ts":"2026-01-04T16:11:32+00:00","power_w":42.5,"voltage_V":231.9}"#;
        let record: PowerRecord = serde_json::from_str(line).unwrap();
        match record {
            PowerRecord::Sample(s) => {
                assert_eq!(s.power_w, 42.5);
                assert_eq!(s.voltage_v, Some(231.9));
                assert_eq!(s.energy_total_wh, None);
            }
            PowerRecord::Error { .. } => panic!("expected a sample"),
        }
    }

    #[test]
    fn test_power_record_error_variant() {
        let line = r#"{"ts":"2026-01-04T16:11:33+00:00","error":"connection refused"}"#;
        let record: PowerRecord = serde_json::from_str(line).unwrap();
        match record {
            PowerRecord::Error { error, .. } => assert_eq!(error, "connection refused"),
            PowerRecord::Sample(_) => panic!("expected an error record"),
        }
    }

    #[test]
    fn test_cpu_sample_percent_optional() {
        let raw = r#"{"ts":"2026-01-04T16:11:32+00:00","cpu_cores_used":0.25}"#;
        let sample: CpuSample = serde_json::from_str(raw).unwrap();
        assert_eq!(sample.cpu_cores_used, 0.25);
        assert!(sample.cpu_percent_host.is_none());
    }

    #[test]
    fn test_attributed_reading_wire_name() {
        let reading = AttributedReading {
            ts: "2026-01-04T16:11:32+00:00".to_string(),
            cpu_cores_used: 0.5,
            cpu_percent_host: 12.5,
            estimated_power_w: 7.25,
        };
        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains("estimated_power_from_shelly_watt"));
    }

    #[test]
    fn test_phase_terminal_states() {
        assert!(ExperimentPhase::Stopped.is_terminal());
        assert!(ExperimentPhase::Failed.is_terminal());
        assert!(!ExperimentPhase::Running.is_terminal());
        assert_eq!(ExperimentPhase::CoolingDown.to_string(), "cooling_down");
    }
}
