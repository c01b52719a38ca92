//! Observability infrastructure for the experiment runner
//!
//! Provides:
//! - Prometheus counters for sampling and pipeline diagnostics
//! - Structured logging of run-level events

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge, GaugeVec,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for meter poll latency (seconds).
const POLL_LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RunMetricsInner> = OnceLock::new();

struct RunMetricsInner {
    meter_poll_latency_seconds: Histogram,
    power_samples_total: IntCounter,
    sampler_errors_total: IntCounter,
    dropped_power_samples_total: IntCounter,
    dropped_cpu_samples_total: IntCounter,
    instants_aligned_total: IntCounter,
    instants_unaligned_total: IntCounter,
    services_observed: IntGauge,
    phase_info: GaugeVec,
}

impl RunMetricsInner {
    fn new() -> Self {
        Self {
            meter_poll_latency_seconds: register_histogram!(
                "greenbench_meter_poll_latency_seconds",
                "Time spent polling the external power meter",
                POLL_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register meter_poll_latency_seconds"),

            power_samples_total: register_int_counter!(
                "greenbench_power_samples_total",
                "Power samples appended to the run log"
            )
            .expect("Failed to register power_samples_total"),

            sampler_errors_total: register_int_counter!(
                "greenbench_sampler_errors_total",
                "Meter polls that failed and were recorded in-band"
            )
            .expect("Failed to register sampler_errors_total"),

            dropped_power_samples_total: register_int_counter!(
                "greenbench_dropped_power_samples_total",
                "Power samples dropped for malformed timestamps"
            )
            .expect("Failed to register dropped_power_samples_total"),

            dropped_cpu_samples_total: register_int_counter!(
                "greenbench_dropped_cpu_samples_total",
                "CPU samples dropped for malformed timestamps"
            )
            .expect("Failed to register dropped_cpu_samples_total"),

            instants_aligned_total: register_int_counter!(
                "greenbench_instants_aligned_total",
                "Service-bearing instants that found a power match"
            )
            .expect("Failed to register instants_aligned_total"),

            instants_unaligned_total: register_int_counter!(
                "greenbench_instants_unaligned_total",
                "Service-bearing instants dropped for exceeding the skew bound"
            )
            .expect("Failed to register instants_unaligned_total"),

            services_observed: register_int_gauge!(
                "greenbench_services_observed",
                "Services present in the scraped CPU streams"
            )
            .expect("Failed to register services_observed"),

            phase_info: register_gauge_vec!(
                "greenbench_phase_info",
                "Current experiment phase",
                &["phase"]
            )
            .expect("Failed to register phase_info"),
        }
    }
}

/// Run metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct RunMetrics {
    _private: (),
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    /// Create a metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RunMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RunMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_poll_latency(&self, duration_secs: f64) {
        self.inner().meter_poll_latency_seconds.observe(duration_secs);
    }

    pub fn add_power_samples(&self, count: u64) {
        self.inner().power_samples_total.inc_by(count);
    }

    pub fn add_sampler_errors(&self, count: u64) {
        self.inner().sampler_errors_total.inc_by(count);
    }

    pub fn add_dropped_samples(&self, power: u64, cpu: u64) {
        self.inner().dropped_power_samples_total.inc_by(power);
        self.inner().dropped_cpu_samples_total.inc_by(cpu);
    }

    pub fn add_alignment(&self, aligned: u64, unaligned: u64) {
        self.inner().instants_aligned_total.inc_by(aligned);
        self.inner().instants_unaligned_total.inc_by(unaligned);
    }

    pub fn set_services_observed(&self, count: i64) {
        self.inner().services_observed.set(count);
    }

    /// Mark the current phase (resets the previous one).
    pub fn set_phase(&self, phase: &str) {
        self.inner().phase_info.reset();
        self.inner().phase_info.with_label_values(&[phase]).set(1.0);
    }
}

/// Structured logger for run-level events
///
/// Keeps the event vocabulary in one place so run logs stay greppable.
#[derive(Clone)]
pub struct RunLogger {
    scenario: String,
}

impl RunLogger {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
        }
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "run_started",
            scenario = %self.scenario,
            runner_version = %version,
            "Experiment run started"
        );
    }

    pub fn log_workload_failed(&self, error: &str) {
        warn!(
            event = "workload_failed",
            scenario = %self.scenario,
            error = %error,
            "Workload failed; telemetry collection continued"
        );
    }

    pub fn log_attribution(&self, aligned: u64, service_instants: u64, coverage: f64) {
        info!(
            event = "attribution_complete",
            scenario = %self.scenario,
            aligned_instants = aligned,
            service_instants = service_instants,
            coverage = coverage,
            "Attribution pipeline complete"
        );
    }

    pub fn log_run_complete(&self, total_wh: f64, services: usize, run_dir: &str) {
        info!(
            event = "run_complete",
            scenario = %self.scenario,
            total_energy_wh = total_wh,
            services = services,
            run_dir = %run_dir,
            "Experiment run complete"
        );
    }

    pub fn log_empty_scrape(&self) {
        warn!(
            event = "cpu_scrape_empty",
            scenario = %self.scenario,
            "CPU scrape returned no series; attribution will be skipped"
        );
    }
}
