//! Nearest-neighbor alignment of CPU instants to power readings

use crate::models::AlignedInstant;
use crate::timestamp;

use super::timeline::Timeline;

/// Alignment coverage for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlignStats {
    /// Instants that carried at least one service reading.
    pub service_instants: u64,
    /// Instants that found a power reading within the skew bound.
    pub aligned_instants: u64,
}

impl AlignStats {
    /// Fraction of service-bearing instants that aligned, in [0, 1].
    pub fn coverage(&self) -> f64 {
        if self.service_instants == 0 {
            return 0.0;
        }
        self.aligned_instants as f64 / self.service_instants as f64
    }
}

/// For every service-bearing instant, find the closest power reading.
///
/// Instants with no power reading within `max_skew_seconds` are
/// dropped; there is no interpolation. When two power readings are
/// exactly equidistant the earlier timestamp wins: candidates are
/// scanned in ascending timestamp order with a strict `<` on distance.
///
/// The scan is O(S * P); both streams are sampled at most at a few Hz
/// over minutes, so the quadratic bound stays in the low millions even
/// in pathological runs.
pub fn align(timeline: &Timeline, max_skew_seconds: f64) -> (Vec<AlignedInstant>, AlignStats) {
    let power_points: Vec<(f64, &crate::models::PowerSample)> = timeline
        .slots
        .values()
        .filter_map(|slot| slot.power.as_ref())
        .filter_map(|sample| timestamp::to_epoch(&sample.ts).ok().map(|e| (e, sample)))
        .collect();

    let mut aligned = Vec::new();
    let mut stats = AlignStats::default();

    for (ts, slot) in &timeline.slots {
        if slot.services.is_empty() {
            continue;
        }
        stats.service_instants += 1;

        // Keys are produced by normalize(), so this only fails if the
        // timeline was constructed by hand with a bad key.
        let Ok(target) = timestamp::to_epoch(ts) else {
            continue;
        };

        let mut best: Option<(f64, &crate::models::PowerSample)> = None;
        for (epoch, sample) in &power_points {
            let delta = (epoch - target).abs();
            if best.map_or(true, |(best_delta, _)| delta < best_delta) {
                best = Some((delta, sample));
            }
        }

        match best {
            Some((delta, sample)) if delta <= max_skew_seconds => {
                stats.aligned_instants += 1;
                aligned.push(AlignedInstant {
                    ts: ts.clone(),
                    power: sample.clone(),
                    services: slot.services.clone(),
                });
            }
            _ => {}
        }
    }

    (aligned, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::timeline::TimelineBuilder;
    use crate::models::{CpuSample, PowerSample};
    use std::collections::BTreeMap;

    fn power(ts: &str, watts: f64) -> PowerSample {
        PowerSample {
            ts: ts.to_string(),
            power_w: watts,
            voltage_v: None,
            energy_total_wh: None,
        }
    }

    fn cpu(ts: &str, cores: f64) -> CpuSample {
        CpuSample {
            ts: ts.to_string(),
            cpu_cores_used: cores,
            cpu_percent_host: None,
        }
    }

    fn timeline_of(power_samples: Vec<PowerSample>, cpu_ts: &[&str]) -> Timeline {
        let mut cpu_by_service = BTreeMap::new();
        cpu_by_service.insert(
            "api".to_string(),
            cpu_ts.iter().map(|ts| cpu(ts, 1.0)).collect::<Vec<_>>(),
        );
        TimelineBuilder::new(4).build(&power_samples, &cpu_by_service)
    }

    #[test]
    fn test_align_picks_nearest_power_reading() {
        let timeline = timeline_of(
            vec![
                power("2026-01-04T16:11:30+00:00", 10.0),
                power("2026-01-04T16:11:35+00:00", 20.0),
            ],
            &["2026-01-04T16:11:34+00:00"],
        );

        let (aligned, stats) = align(&timeline, 5.0);

        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].power.power_w, 20.0);
        assert_eq!(stats.coverage(), 1.0);
    }

    #[test]
    fn test_align_drops_instants_beyond_max_skew() {
        let timeline = timeline_of(
            vec![power("2026-01-04T16:11:00+00:00", 10.0)],
            &["2026-01-04T16:11:30+00:00"],
        );

        let (aligned, stats) = align(&timeline, 5.0);

        assert!(aligned.is_empty());
        assert_eq!(stats.service_instants, 1);
        assert_eq!(stats.aligned_instants, 0);
        assert_eq!(stats.coverage(), 0.0);
    }

    #[test]
    fn test_align_never_exceeds_skew_bound() {
        // Exactly at the bound is still a match.
        let timeline = timeline_of(
            vec![power("2026-01-04T16:11:30+00:00", 10.0)],
            &["2026-01-04T16:11:35+00:00"],
        );

        let (aligned, _) = align(&timeline, 5.0);
        assert_eq!(aligned.len(), 1);

        let (aligned, _) = align(&timeline, 4.999);
        assert!(aligned.is_empty());
    }

    #[test]
    fn test_align_tie_break_prefers_earlier_timestamp() {
        // t=0 and t=2 are both 1s away from the CPU instant at t=1.
        let timeline = timeline_of(
            vec![
                power("2026-01-04T16:11:00+00:00", 10.0),
                power("2026-01-04T16:11:02+00:00", 20.0),
            ],
            &["2026-01-04T16:11:01+00:00"],
        );

        let (aligned, _) = align(&timeline, 2.0);

        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].power.power_w, 10.0);
    }

    #[test]
    fn test_align_instants_without_services_are_ignored() {
        // Power-only instants contribute candidates, not output rows.
        let timeline = timeline_of(
            vec![
                power("2026-01-04T16:11:00+00:00", 10.0),
                power("2026-01-04T16:11:01+00:00", 11.0),
            ],
            &["2026-01-04T16:11:01+00:00"],
        );

        let (aligned, stats) = align(&timeline, 5.0);

        assert_eq!(aligned.len(), 1);
        assert_eq!(stats.service_instants, 1);
        assert!(!aligned[0].services.is_empty());
    }
}
