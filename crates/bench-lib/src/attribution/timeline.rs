//! Time-indexed merge of the power and CPU streams
//!
//! Time is the primary key; services are attributes of time. The two
//! streams are sampled independently, so neither may be assumed sorted;
//! keying on normalized timestamps removes the ordering dependency.

use std::collections::BTreeMap;

use crate::models::{CpuSample, PowerSample, ServiceCpu};
use crate::timestamp;

/// One slot of the sparse timeline. Either side may be absent.
#[derive(Debug, Clone, Default)]
pub struct TimelineSlot {
    pub power: Option<PowerSample>,
    pub services: BTreeMap<String, ServiceCpu>,
}

/// Sparse mapping from normalized timestamp to what was observed there.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub slots: BTreeMap<String, TimelineSlot>,
    /// Power samples dropped for an unparseable timestamp.
    pub dropped_power: u64,
    /// CPU samples dropped for an unparseable timestamp.
    pub dropped_cpu: u64,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Builds a [`Timeline`] from the two raw streams.
#[derive(Debug, Clone)]
pub struct TimelineBuilder {
    host_cpu_cores: u32,
}

impl TimelineBuilder {
    pub fn new(host_cpu_cores: u32) -> Self {
        Self { host_cpu_cores }
    }

    /// Merge both streams into one time-indexed structure.
    ///
    /// Duplicate power timestamps resolve last-write-wins in ingestion
    /// order. Samples with unparseable timestamps are dropped and
    /// counted, not propagated as errors.
    pub fn build(
        &self,
        power_samples: &[PowerSample],
        cpu_by_service: &BTreeMap<String, Vec<CpuSample>>,
    ) -> Timeline {
        let mut timeline = Timeline::default();

        for sample in power_samples {
            let ts = match timestamp::normalize(&sample.ts) {
                Ok(ts) => ts,
                Err(_) => {
                    timeline.dropped_power += 1;
                    continue;
                }
            };
            let mut normalized = sample.clone();
            normalized.ts = ts.clone();
            timeline.slots.entry(ts).or_default().power = Some(normalized);
        }

        for (service, samples) in cpu_by_service {
            for sample in samples {
                let ts = match timestamp::normalize(&sample.ts) {
                    Ok(ts) => ts,
                    Err(_) => {
                        timeline.dropped_cpu += 1;
                        continue;
                    }
                };
                let usage = ServiceCpu {
                    cpu_cores_used: sample.cpu_cores_used,
                    cpu_percent_host: sample
                        .cpu_percent_host
                        .unwrap_or_else(|| self.percent_of_host(sample.cpu_cores_used)),
                };
                timeline
                    .slots
                    .entry(ts)
                    .or_default()
                    .services
                    .insert(service.clone(), usage);
            }
        }

        timeline
    }

    fn percent_of_host(&self, cpu_cores_used: f64) -> f64 {
        if self.host_cpu_cores == 0 {
            return 0.0;
        }
        cpu_cores_used / self.host_cpu_cores as f64 * 100.0
    }
}
