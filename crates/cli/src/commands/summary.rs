//! Per-service summary of a recorded run

use anyhow::{Context, Result};
use colored::Colorize;
use tabled::Tabled;

use bench_lib::{
    artifacts::{read_json, ExperimentSummary, RunDir},
    energy,
    models::ServiceSeries,
};

use crate::output::{
    color_coverage, format_percent, format_timestamp, format_watts, format_wh, print_warning,
    OutputFormat,
};

/// Row for the per-service table
#[derive(Tabled, serde::Serialize)]
struct ServiceRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Samples")]
    samples: usize,
    #[tabled(rename = "Avg Power")]
    avg_power: String,
    #[tabled(rename = "Max Power")]
    max_power: String,
    #[tabled(rename = "Energy")]
    energy: String,
    #[tabled(rename = "Share")]
    share: String,
}

/// Summarize the attributed series of a run directory.
pub fn show_summary(run_dir: &str, format: OutputFormat) -> Result<()> {
    let run = RunDir::open(run_dir);

    let series: ServiceSeries = read_json(&run.attribution())
        .context("run directory has no attribution output; run `gbench attribute` first")?;
    let summary: Option<ExperimentSummary> = read_json(&run.summary()).ok();

    if series.is_empty() {
        print_warning("Attribution output contains no services");
        return Ok(());
    }

    let energy_by_service = energy::energy_by_service(&series);
    let total_energy: f64 = energy_by_service.values().sum();

    let rows: Vec<ServiceRow> = series
        .iter()
        .map(|(service, readings)| {
            let avg = if readings.is_empty() {
                0.0
            } else {
                readings.iter().map(|r| r.estimated_power_w).sum::<f64>()
                    / readings.len() as f64
            };
            let max = readings
                .iter()
                .map(|r| r.estimated_power_w)
                .fold(0.0_f64, f64::max);
            let wh = energy_by_service.get(service).copied().unwrap_or(0.0);
            let share = if total_energy > 0.0 {
                wh / total_energy
            } else {
                0.0
            };
            ServiceRow {
                service: service.clone(),
                samples: readings.len(),
                avg_power: format_watts(avg),
                max_power: format_watts(max),
                energy: format_wh(wh),
                share: format_percent(share),
            }
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "summary": summary,
                "services": rows,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            if let Some(summary) = &summary {
                println!("{}", "Experiment Summary".bold());
                println!("{}", "=".repeat(60));
                println!("Scenario:   {}", summary.scenario.cyan());
                if let (Some(start), Some(end)) = (&summary.start_iso, &summary.end_iso) {
                    println!(
                        "Window:     {} .. {}",
                        format_timestamp(start),
                        format_timestamp(end)
                    );
                }
                println!("Total:      {}", format_wh(summary.total_energy_wh));
                println!(
                    "Coverage:   {}",
                    color_coverage(summary.alignment_coverage)
                );
                if let Some(error) = &summary.workload_error {
                    print_warning(&format!("workload failed: {error}"));
                }
                println!();
            }

            let table = tabled::Table::new(&rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal attributed energy: {}", format_wh(total_energy));
        }
    }

    Ok(())
}
