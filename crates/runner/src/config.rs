//! Runner configuration

use anyhow::{Context, Result};
use serde::Deserialize;

/// Runner configuration, from the `BENCH_*` environment.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Base URL of the power meter.
    #[serde(default = "default_meter_url")]
    pub meter_url: String,

    /// Base URL of the metrics backend.
    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,

    /// Power sampling frequency in Hz.
    #[serde(default = "default_sampling_hz")]
    pub sampling_hz: f64,

    /// Warm-up margin before the workload starts, in seconds.
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,

    /// Cool-down margin after the workload ends, in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Maximum skew between a CPU instant and its power match.
    #[serde(default = "default_max_skew_seconds")]
    pub max_skew_seconds: f64,

    /// Total-CPU floor below which an instant counts as idle.
    #[serde(default = "default_cpu_epsilon_cores")]
    pub cpu_epsilon_cores: f64,

    /// Physical cores of the host running the services.
    #[serde(default = "default_host_cpu_cores")]
    pub host_cpu_cores: u32,

    /// Range-query step handed to the metrics backend.
    #[serde(default = "default_step")]
    pub step: String,

    /// Rate window used inside candidate expressions.
    #[serde(default = "default_rate_window")]
    pub rate_window: String,

    /// Root directory for run artifacts.
    #[serde(default = "default_out_root")]
    pub out_root: String,

    /// Port of the health/status API.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Path of the scenario file to run.
    #[serde(default = "default_scenario_path")]
    pub scenario_path: String,
}

fn default_meter_url() -> String {
    "http://shelly.local".to_string()
}

fn default_prometheus_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_sampling_hz() -> f64 {
    1.0
}

fn default_warmup_secs() -> u64 {
    3
}

fn default_cooldown_secs() -> u64 {
    3
}

fn default_max_skew_seconds() -> f64 {
    5.0
}

fn default_cpu_epsilon_cores() -> f64 {
    0.01
}

fn default_host_cpu_cores() -> u32 {
    4
}

fn default_step() -> String {
    "5s".to_string()
}

fn default_rate_window() -> String {
    "1m".to_string()
}

fn default_out_root() -> String {
    "artifacts".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_scenario_path() -> String {
    "scenario.toml".to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            meter_url: default_meter_url(),
            prometheus_url: default_prometheus_url(),
            sampling_hz: default_sampling_hz(),
            warmup_secs: default_warmup_secs(),
            cooldown_secs: default_cooldown_secs(),
            max_skew_seconds: default_max_skew_seconds(),
            cpu_epsilon_cores: default_cpu_epsilon_cores(),
            host_cpu_cores: default_host_cpu_cores(),
            step: default_step(),
            rate_window: default_rate_window(),
            out_root: default_out_root(),
            api_port: default_api_port(),
            scenario_path: default_scenario_path(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("BENCH").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }
}

/// One load-test scenario, read from a file.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub locustfile: String,
    pub host: String,
    #[serde(default = "default_users")]
    pub users: u32,
    #[serde(default = "default_spawn_rate")]
    pub spawn_rate: u32,
    #[serde(default = "default_run_time")]
    pub run_time: String,
}

fn default_users() -> u32 {
    10
}

fn default_spawn_rate() -> u32 {
    2
}

fn default_run_time() -> String {
    "1m".to_string()
}

impl Scenario {
    /// Load a scenario file (TOML/YAML/JSON by extension).
    pub fn load(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .with_context(|| format!("Failed to read scenario {path}"))?;

        config
            .try_deserialize()
            .with_context(|| format!("Invalid scenario {path}"))
    }
}
