//! Per-service CPU scraping via the metrics backend
//!
//! Container CPU comes from cAdvisor-style counters; which label
//! carries the service identity depends on how the containers were
//! deployed, so both the expression and the label are resolved through
//! candidate lists.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::models::CpuSample;
use crate::timestamp;

use super::client::{LabeledSeries, RangeQuerier, TimeRange};
use super::resolver::resolve;

/// Labels tried, in order, to name the service behind a series.
const SERVICE_LABELS: &[&str] = &[
    "container_label_com_docker_compose_service",
    "service_name",
    "name",
    "job",
    "id",
];

/// Candidate expressions for per-service CPU usage (cores).
pub fn cpu_candidates(rate_window: &str) -> Vec<String> {
    vec![
        format!(
            "sum by (container_label_com_docker_compose_service) \
             (rate(container_cpu_usage_seconds_total[{rate_window}]))"
        ),
        format!("sum by (name) (rate(container_cpu_usage_seconds_total[{rate_window}]))"),
        format!("sum by (id) (rate(container_cpu_usage_seconds_total[{rate_window}]))"),
    ]
}

/// Candidate expressions for per-service request rate.
pub fn request_rate_candidates(rate_window: &str) -> Vec<String> {
    vec![
        format!(
            "sum by (service_name) (rate(otel_http_server_duration_count[{rate_window}]))"
        ),
        format!(
            "sum by (service_name) \
             (rate(otel_http_server_duration_milliseconds_count[{rate_window}]))"
        ),
        format!("sum by (job) (rate(http_server_requests_total[{rate_window}]))"),
    ]
}

/// Candidate expressions for per-service p95 latency.
pub fn p95_latency_candidates(rate_window: &str) -> Vec<String> {
    vec![
        format!(
            "histogram_quantile(0.95, sum by (le, service_name) \
             (rate(otel_http_server_duration_bucket[{rate_window}])))"
        ),
        format!(
            "histogram_quantile(0.95, sum by (le, exported_job) \
             (rate(otel_http_server_duration_milliseconds_bucket[{rate_window}])))"
        ),
    ]
}

/// Scrape per-service CPU over the window into raw sample lists.
///
/// Value points that do not parse as finite floats are skipped.
pub async fn scrape_cpu_by_service(
    querier: &dyn RangeQuerier,
    range: &TimeRange,
    rate_window: &str,
    host_cpu_cores: u32,
) -> Result<BTreeMap<String, Vec<CpuSample>>> {
    let series = resolve(querier, &cpu_candidates(rate_window), range).await;
    Ok(series_to_cpu_samples(&series, host_cpu_cores))
}

/// Convert labeled series into per-service CPU sample lists.
pub fn series_to_cpu_samples(
    series: &[LabeledSeries],
    host_cpu_cores: u32,
) -> BTreeMap<String, Vec<CpuSample>> {
    let mut by_service: BTreeMap<String, Vec<CpuSample>> = BTreeMap::new();

    for s in series {
        let service = service_name(s);
        let samples = by_service.entry(service).or_default();
        for (epoch, value) in &s.values {
            let Ok(cores) = value.parse::<f64>() else {
                continue;
            };
            if !cores.is_finite() {
                continue;
            }
            let Some(ts) = timestamp::from_epoch_secs(*epoch as i64) else {
                continue;
            };
            let percent = if host_cpu_cores > 0 {
                Some(cores / host_cpu_cores as f64 * 100.0)
            } else {
                None
            };
            samples.push(CpuSample {
                ts,
                cpu_cores_used: cores,
                cpu_percent_host: percent,
            });
        }
    }

    by_service.retain(|service, samples| {
        if samples.is_empty() {
            debug!(service = %service, "Service series had no usable points");
            false
        } else {
            true
        }
    });

    by_service
}

/// Mean CPU share of each service over the window, normalized so the
/// shares sum to 1.0. All-idle windows yield all-zero shares.
pub fn cpu_fraction_over_period(
    cpu_by_service: &BTreeMap<String, Vec<CpuSample>>,
) -> BTreeMap<String, f64> {
    let means: BTreeMap<String, f64> = cpu_by_service
        .iter()
        .filter(|(_, samples)| !samples.is_empty())
        .map(|(service, samples)| {
            let mean =
                samples.iter().map(|s| s.cpu_cores_used).sum::<f64>() / samples.len() as f64;
            (service.clone(), mean)
        })
        .collect();

    let total: f64 = means.values().sum();
    if total <= 0.0 {
        return means.keys().map(|k| (k.clone(), 0.0)).collect();
    }
    means.into_iter().map(|(k, v)| (k, v / total)).collect()
}

/// Raw series bundle exported alongside the attribution output.
#[derive(Debug, Clone, Serialize)]
pub struct CoreSeries {
    pub requests_per_service: Vec<LabeledSeries>,
    pub p95_latency_per_service: Vec<LabeledSeries>,
    pub cpu_by_service: Vec<LabeledSeries>,
}

/// Export the request/latency/CPU series for the experiment window.
pub async fn export_core_series(
    querier: &dyn RangeQuerier,
    range: &TimeRange,
    rate_window: &str,
) -> CoreSeries {
    CoreSeries {
        requests_per_service: resolve(querier, &request_rate_candidates(rate_window), range).await,
        p95_latency_per_service: resolve(querier, &p95_latency_candidates(rate_window), range)
            .await,
        cpu_by_service: resolve(querier, &cpu_candidates(rate_window), range).await,
    }
}

/// Read a per-service CPU timeseries file, tolerating bad records.
///
/// Entries that do not carry the required fields are skipped and
/// counted, mirroring how the power log reader treats its lines. Only
/// an unreadable or structurally invalid file is a hard error.
pub fn read_cpu_series(path: &std::path::Path) -> Result<(BTreeMap<String, Vec<CpuSample>>, u64)> {
    use anyhow::Context;

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read CPU series file {:?}", path))?;
    let raw: BTreeMap<String, Vec<serde_json::Value>> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse CPU series file {:?}", path))?;

    let mut by_service = BTreeMap::new();
    let mut dropped = 0u64;
    for (service, entries) in raw {
        let mut samples = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<CpuSample>(entry) {
                Ok(sample) => samples.push(sample),
                Err(_) => dropped += 1,
            }
        }
        by_service.insert(service, samples);
    }
    Ok((by_service, dropped))
}

fn service_name(series: &LabeledSeries) -> String {
    for label in SERVICE_LABELS {
        if let Some(value) = series.label(label) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(labels: &[(&str, &str)], values: &[(f64, &str)]) -> LabeledSeries {
        LabeledSeries {
            metric: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            values: values.iter().map(|(e, v)| (*e, v.to_string())).collect(),
        }
    }

    #[test]
    fn test_series_to_cpu_samples_basic() {
        let input = vec![series(
            &[("container_label_com_docker_compose_service", "booking")],
            &[(1767542400.0, "0.5"), (1767542405.0, "0.75")],
        )];

        let by_service = series_to_cpu_samples(&input, 4);

        let samples = &by_service["booking"];
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].cpu_cores_used, 0.5);
        assert_eq!(samples[0].cpu_percent_host, Some(12.5));
        assert!(samples[0].ts.ends_with("+00:00"));
    }

    #[test]
    fn test_service_label_fallback_order() {
        let input = vec![
            series(&[("name", "search")], &[(0.0, "0.1")]),
            series(&[("id", "/docker/abc123")], &[(0.0, "0.2")]),
            series(&[], &[(0.0, "0.3")]),
        ];

        let by_service = series_to_cpu_samples(&input, 4);

        assert!(by_service.contains_key("search"));
        assert!(by_service.contains_key("/docker/abc123"));
        assert!(by_service.contains_key("unknown"));
    }

    #[test]
    fn test_unparseable_values_are_skipped() {
        let input = vec![series(
            &[("name", "api")],
            &[(0.0, "NaN"), (5.0, "oops"), (10.0, "0.4")],
        )];

        let by_service = series_to_cpu_samples(&input, 4);

        assert_eq!(by_service["api"].len(), 1);
        assert_eq!(by_service["api"][0].cpu_cores_used, 0.4);
    }

    #[test]
    fn test_series_with_no_usable_points_dropped() {
        let input = vec![series(&[("name", "api")], &[(0.0, "garbage")])];
        let by_service = series_to_cpu_samples(&input, 4);
        assert!(by_service.is_empty());
    }

    #[test]
    fn test_cpu_fraction_over_period() {
        let mut by_service = BTreeMap::new();
        by_service.insert(
            "a".to_string(),
            vec![
                CpuSample {
                    ts: "t".into(),
                    cpu_cores_used: 1.0,
                    cpu_percent_host: None,
                },
                CpuSample {
                    ts: "t".into(),
                    cpu_cores_used: 3.0,
                    cpu_percent_host: None,
                },
            ],
        );
        by_service.insert(
            "b".to_string(),
            vec![CpuSample {
                ts: "t".into(),
                cpu_cores_used: 2.0,
                cpu_percent_host: None,
            }],
        );

        let fractions = cpu_fraction_over_period(&by_service);

        assert!((fractions["a"] - 0.5).abs() < 1e-9);
        assert!((fractions["b"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_read_cpu_series_skips_bad_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpu_by_service.json");
        std::fs::write(
            &path,
            r#"{
                "api": [
                    {"ts":"2026-01-04T16:11:00+00:00","cpu_cores_used":0.5},
                    {"ts":"2026-01-04T16:11:05+00:00"},
                    {"cpu_cores_used":0.7}
                ],
                "booking": []
            }"#,
        )
        .unwrap();

        let (by_service, dropped) = read_cpu_series(&path).unwrap();

        assert_eq!(by_service["api"].len(), 1);
        assert_eq!(dropped, 2);
        assert!(by_service["booking"].is_empty());
    }

    #[test]
    fn test_read_cpu_series_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_cpu_series(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_cpu_fraction_all_idle_is_all_zero() {
        let mut by_service = BTreeMap::new();
        by_service.insert(
            "a".to_string(),
            vec![CpuSample {
                ts: "t".into(),
                cpu_cores_used: 0.0,
                cpu_percent_host: None,
            }],
        );

        let fractions = cpu_fraction_over_period(&by_service);
        assert_eq!(fractions["a"], 0.0);
    }
}
