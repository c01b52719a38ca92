//! Energy integration over power series
//!
//! Trapezoidal integration of watt samples into watt-hours. Samples are
//! re-sorted by epoch first: the power log is time-ordered at the
//! source, but normalization and file round-trips void that guarantee.

use std::collections::BTreeMap;

use crate::models::{PowerSample, ServiceSeries};
use crate::timestamp;

/// Integrate a whole-system power series into total watt-hours.
///
/// Fewer than two usable samples integrate to 0.0. Samples with
/// unparseable timestamps are skipped.
pub fn integrate_wh(samples: &[PowerSample]) -> f64 {
    let mut points: Vec<(f64, f64)> = samples
        .iter()
        .filter_map(|s| timestamp::to_epoch(&s.ts).ok().map(|e| (e, s.power_w)))
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    trapezoid_wh(&points)
}

/// Per-service energy from attributed series, in watt-hours.
pub fn energy_by_service(series: &ServiceSeries) -> BTreeMap<String, f64> {
    series
        .iter()
        .map(|(service, rows)| {
            let mut points: Vec<(f64, f64)> = rows
                .iter()
                .filter_map(|r| {
                    timestamp::to_epoch(&r.ts)
                        .ok()
                        .map(|e| (e, r.estimated_power_w))
                })
                .collect();
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            (service.clone(), trapezoid_wh(&points))
        })
        .collect()
}

fn trapezoid_wh(points: &[(f64, f64)]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .windows(2)
        .map(|pair| {
            let (t0, w0) = pair[0];
            let (t1, w1) = pair[1];
            let dt_hours = (t1 - t0) / 3600.0;
            (w0 + w1) / 2.0 * dt_hours
        })
        .sum()
}
