//! Offline attribution from recorded run files

use std::path::PathBuf;

use anyhow::{Context, Result};

use bench_lib::{
    artifacts::{write_json_atomic, RunDir},
    attribution::{AttributionConfig, AttributionEngine},
    metrics::read_cpu_series,
    sampler::read_power_log,
};

use crate::output::{color_coverage, print_info, print_success, OutputFormat};

/// Re-run the attribution pipeline over a recorded run directory.
pub fn run_attribution(
    run_dir: &str,
    max_skew_seconds: Option<f64>,
    cpu_epsilon_cores: Option<f64>,
    host_cpu_cores: Option<u32>,
    output: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let run = RunDir::open(run_dir);

    let (power_samples, log_stats) = read_power_log(&run.power_log())
        .context("run directory has no readable power log")?;
    let (cpu_by_service, skipped_cpu_records) = read_cpu_series(&run.cpu_series())
        .context("run directory has no readable CPU series file")?;

    let defaults = AttributionConfig::default();
    let config = AttributionConfig {
        max_skew_seconds: max_skew_seconds.unwrap_or(defaults.max_skew_seconds),
        cpu_epsilon_cores: cpu_epsilon_cores.unwrap_or(defaults.cpu_epsilon_cores),
        host_cpu_cores: host_cpu_cores.unwrap_or(defaults.host_cpu_cores),
    };

    let outcome = AttributionEngine::new(config).run(&power_samples, &cpu_by_service)?;

    let out_path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| run.attribution());
    write_json_atomic(&out_path, &outcome.series)?;

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "output": out_path.display().to_string(),
                "services": outcome.series.len(),
                "power_samples": log_stats.samples,
                "sampler_error_records": log_stats.error_records,
                "service_instants": outcome.stats.service_instants,
                "aligned_instants": outcome.stats.aligned_instants,
                "coverage": outcome.stats.coverage(),
                "dropped_power_samples": outcome.stats.dropped_power,
                "dropped_cpu_samples": outcome.stats.dropped_cpu,
                "skipped_cpu_records": skipped_cpu_records,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            print_success(&format!(
                "Attribution written to {}",
                out_path.display()
            ));
            print_info(&format!(
                "{} services, {} power samples ({} error records skipped)",
                outcome.series.len(),
                log_stats.samples,
                log_stats.error_records
            ));
            print_info(&format!(
                "{}/{} instants aligned, coverage {}",
                outcome.stats.aligned_instants,
                outcome.stats.service_instants,
                color_coverage(outcome.stats.coverage())
            ));
            if outcome.stats.dropped_power + outcome.stats.dropped_cpu + skipped_cpu_records > 0 {
                print_info(&format!(
                    "dropped {} power / {} CPU samples with malformed timestamps, \
                     skipped {} incomplete CPU records",
                    outcome.stats.dropped_power, outcome.stats.dropped_cpu, skipped_cpu_records
                ));
            }
        }
    }

    Ok(())
}
