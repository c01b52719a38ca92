//! Proportional power apportionment
//!
//! Splits each aligned instant's power reading across the services
//! present at that instant, proportional to CPU share. This is a
//! heuristic, not a causal power model: it assumes software-attributable
//! draw scales with CPU share, which undercounts fixed/idle power and
//! I/O-bound services.

use crate::models::{AlignedInstant, AttributedCpu, AttributedInstant};

/// Apportion power across services for every aligned instant.
///
/// When the instant's total CPU is below `cpu_epsilon_cores` the split
/// would amplify division noise, so every service gets zero instead.
pub fn attribute(aligned: Vec<AlignedInstant>, cpu_epsilon_cores: f64) -> Vec<AttributedInstant> {
    aligned
        .into_iter()
        .map(|instant| attribute_instant(instant, cpu_epsilon_cores))
        .collect()
}

fn attribute_instant(instant: AlignedInstant, cpu_epsilon_cores: f64) -> AttributedInstant {
    let cpu_total: f64 = instant
        .services
        .values()
        .map(|usage| usage.cpu_cores_used)
        .sum();
    let power_w = instant.power.power_w;

    let services = instant
        .services
        .into_iter()
        .map(|(service, usage)| {
            let estimated_power_w = if cpu_total < cpu_epsilon_cores {
                0.0
            } else {
                usage.cpu_cores_used / cpu_total * power_w
            };
            (
                service,
                AttributedCpu {
                    cpu_cores_used: usage.cpu_cores_used,
                    cpu_percent_host: usage.cpu_percent_host,
                    estimated_power_w,
                },
            )
        })
        .collect();

    AttributedInstant {
        ts: instant.ts,
        power_w,
        services,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PowerSample, ServiceCpu};
    use std::collections::BTreeMap;

    const EPSILON: f64 = 0.01;

    fn aligned(power_w: f64, cores: &[(&str, f64)]) -> AlignedInstant {
        let mut services = BTreeMap::new();
        for (name, used) in cores {
            services.insert(
                name.to_string(),
                ServiceCpu {
                    cpu_cores_used: *used,
                    cpu_percent_host: used * 25.0,
                },
            );
        }
        AlignedInstant {
            ts: "2026-01-04T16:11:32+00:00".to_string(),
            power: PowerSample {
                ts: "2026-01-04T16:11:32+00:00".to_string(),
                power_w,
                voltage_v: None,
                energy_total_wh: None,
            },
            services,
        }
    }

    #[test]
    fn test_attribution_conserves_power() {
        let out = attribute(vec![aligned(48.0, &[("a", 0.3), ("b", 0.9), ("c", 0.15)])], EPSILON);

        let total: f64 = out[0].services.values().map(|s| s.estimated_power_w).sum();
        assert!((total - 48.0).abs() < 48.0 * 1e-9);
    }

    #[test]
    fn test_attribution_splits_proportionally() {
        let out = attribute(vec![aligned(10.0, &[("a", 1.0), ("b", 1.0)])], EPSILON);

        assert_eq!(out[0].services["a"].estimated_power_w, 5.0);
        assert_eq!(out[0].services["b"].estimated_power_w, 5.0);
    }

    #[test]
    fn test_attribution_uneven_split() {
        let out = attribute(vec![aligned(40.0, &[("a", 3.0), ("b", 1.0)])], EPSILON);

        assert!((out[0].services["a"].estimated_power_w - 30.0).abs() < 1e-9);
        assert!((out[0].services["b"].estimated_power_w - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_near_idle_instant_attributes_zero() {
        // A single service at 0.0 cores: the matched power value is
        // irrelevant, everyone gets zero.
        let out = attribute(vec![aligned(35.0, &[("a", 0.0)])], EPSILON);

        assert_eq!(out[0].services["a"].estimated_power_w, 0.0);
    }

    #[test]
    fn test_epsilon_boundary() {
        // Exactly at epsilon the split proceeds.
        let out = attribute(vec![aligned(10.0, &[("a", EPSILON)])], EPSILON);
        assert_eq!(out[0].services["a"].estimated_power_w, 10.0);

        let out = attribute(vec![aligned(10.0, &[("a", EPSILON / 2.0)])], EPSILON);
        assert_eq!(out[0].services["a"].estimated_power_w, 0.0);
    }

    #[test]
    fn test_cpu_fields_carried_through() {
        let out = attribute(vec![aligned(10.0, &[("a", 0.4)])], EPSILON);

        assert_eq!(out[0].services["a"].cpu_cores_used, 0.4);
        assert_eq!(out[0].services["a"].cpu_percent_host, 10.0);
        assert_eq!(out[0].power_w, 10.0);
    }
}
