//! Time-indexed power attribution pipeline
//!
//! Raw samples flow through four single-pass stages, each producing a
//! new structure consumed once by the next:
//! timeline merge -> nearest-neighbor alignment -> proportional
//! apportionment -> per-service export. Everything here is synchronous
//! and side-effect-free; only the caller touches files or counters.

mod align;
mod attribute;
mod export;
mod timeline;

pub use align::{align, AlignStats};
pub use attribute::attribute;
pub use export::export;
pub use timeline::{Timeline, TimelineBuilder, TimelineSlot};

use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::models::{CpuSample, PowerSample, ServiceSeries};

/// Tuning knobs of the attribution pipeline.
#[derive(Debug, Clone)]
pub struct AttributionConfig {
    /// Maximum time distance between a CPU instant and its power match.
    pub max_skew_seconds: f64,
    /// Total-CPU floor below which an instant is treated as idle.
    pub cpu_epsilon_cores: f64,
    /// Physical cores of the host, for cores -> percent conversion.
    pub host_cpu_cores: u32,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            max_skew_seconds: 5.0,
            cpu_epsilon_cores: 0.01,
            host_cpu_cores: 4,
        }
    }
}

/// Counters describing one pipeline run, for diagnostics and the run
/// summary. Drops are tolerated data-quality events, never failures.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineStats {
    pub power_samples: u64,
    pub cpu_samples: u64,
    pub dropped_power: u64,
    pub dropped_cpu: u64,
    pub service_instants: u64,
    pub aligned_instants: u64,
}

impl PipelineStats {
    /// Fraction of service-bearing instants that found a power match.
    pub fn coverage(&self) -> f64 {
        if self.service_instants == 0 {
            return 0.0;
        }
        self.aligned_instants as f64 / self.service_instants as f64
    }
}

/// Outcome of a full attribution run.
#[derive(Debug, Clone)]
pub struct AttributionOutcome {
    pub series: ServiceSeries,
    pub stats: PipelineStats,
}

/// Facade running the whole pipeline over in-memory streams.
#[derive(Debug, Clone, Default)]
pub struct AttributionEngine {
    config: AttributionConfig,
}

impl AttributionEngine {
    pub fn new(config: AttributionConfig) -> Self {
        Self { config }
    }

    /// Run timeline merge, alignment, apportionment, and export.
    ///
    /// Per-sample problems are absorbed and counted. Only inputs that
    /// make the pipeline itself meaningless (an entirely empty stream)
    /// surface as a hard error.
    pub fn run(
        &self,
        power_samples: &[PowerSample],
        cpu_by_service: &BTreeMap<String, Vec<CpuSample>>,
    ) -> Result<AttributionOutcome> {
        if power_samples.is_empty() {
            bail!("no power samples to attribute");
        }
        if cpu_by_service.values().all(|samples| samples.is_empty()) {
            bail!("no CPU samples to attribute");
        }

        let timeline =
            TimelineBuilder::new(self.config.host_cpu_cores).build(power_samples, cpu_by_service);
        let (aligned, align_stats) = align(&timeline, self.config.max_skew_seconds);
        let attributed = attribute(aligned, self.config.cpu_epsilon_cores);
        let series = export(&attributed);

        let stats = PipelineStats {
            power_samples: power_samples.len() as u64,
            cpu_samples: cpu_by_service.values().map(|s| s.len() as u64).sum(),
            dropped_power: timeline.dropped_power,
            dropped_cpu: timeline.dropped_cpu,
            service_instants: align_stats.service_instants,
            aligned_instants: align_stats.aligned_instants,
        };

        tracing::info!(
            power_samples = stats.power_samples,
            cpu_samples = stats.cpu_samples,
            dropped_power = stats.dropped_power,
            dropped_cpu = stats.dropped_cpu,
            aligned = stats.aligned_instants,
            coverage = stats.coverage(),
            "Attribution pipeline complete"
        );

        Ok(AttributionOutcome { series, stats })
    }
}
