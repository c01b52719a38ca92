//! Pivot of instant-keyed attribution into per-service series

use crate::models::{AttributedInstant, AttributedReading, ServiceSeries};

/// Pivot attributed instants into chronological per-service series.
///
/// Pure reshaping: no resampling, no gap-filling. A service absent at
/// some instants (container restart, late start) simply has fewer rows
/// than the aligned-instant count.
pub fn export(attributed: &[AttributedInstant]) -> ServiceSeries {
    let mut series = ServiceSeries::new();

    for instant in attributed {
        for (service, usage) in &instant.services {
            series
                .entry(service.clone())
                .or_default()
                .push(AttributedReading {
                    ts: instant.ts.clone(),
                    cpu_cores_used: usage.cpu_cores_used,
                    cpu_percent_host: usage.cpu_percent_host,
                    estimated_power_w: usage.estimated_power_w,
                });
        }
    }

    // Instants arrive in timeline order, i.e. ascending timestamp, so
    // each service's rows are already chronological; sort defensively
    // in case the caller assembled instants by hand.
    for rows in series.values_mut() {
        rows.sort_by(|a, b| a.ts.cmp(&b.ts));
    }

    series
}
