//! Greenbench runner - one-shot experiment orchestrator
//!
//! Runs a load-test scenario bracketed by power sampling, scrapes the
//! per-service CPU series for the workload window, attributes the
//! measured power across services, and writes all artifacts into a
//! timestamped run directory.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{Encoder, TextEncoder};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bench_lib::{
    artifacts::{write_json_atomic, ExperimentSummary, RunDir, RunManifest},
    attribution::{AttributionConfig, AttributionEngine, PipelineStats},
    energy,
    health::{components, HealthRegistry},
    metrics::{cpu_fraction_over_period, export_core_series, scrape_cpu_by_service, PromClient, TimeRange},
    models::{CpuSample, ServiceSeries},
    observability::{RunLogger, RunMetrics},
    sampler::{read_power_log, SamplerConfig, ShellyMeter},
    sequencer::{PhaseSequencer, RunSummary, SequencerConfig},
    workload::LocustDriver,
};

mod api;
mod config;

const RUNNER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting bench-runner");

    let config = config::RunnerConfig::load()?;
    let scenario = config::Scenario::load(&config.scenario_path)?;
    info!(scenario = %scenario.name, meter = %config.meter_url, "Runner configured");

    let run_dir = RunDir::create(config.out_root.as_ref(), &scenario.name)?;

    // Health registry and metrics
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SAMPLER).await;
    health_registry.register(components::METRICS_BACKEND).await;
    health_registry.register(components::WORKLOAD).await;
    health_registry.register(components::PIPELINE).await;

    let metrics = RunMetrics::new();
    metrics.set_phase("idle");

    let logger = RunLogger::new(&scenario.name);
    logger.log_startup(RUNNER_VERSION);

    // The sequencer owns the meter and the power log sink
    let meter = Arc::new(ShellyMeter::with_defaults(&config.meter_url)?);
    let sequencer = PhaseSequencer::new(
        &scenario.name,
        meter,
        run_dir.power_log(),
        SequencerConfig {
            warmup: Duration::from_secs(config.warmup_secs),
            cooldown: Duration::from_secs(config.cooldown_secs),
            sampler: SamplerConfig {
                hz: config.sampling_hz,
                join_timeout: Duration::from_secs(5),
            },
        },
    );

    // Status API observes the sequencer's phase channel
    let phase_rx = sequencer.subscribe();
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        scenario.name.clone(),
        phase_rx.clone(),
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Mirror phase transitions into the metrics gauge
    let phase_metrics = metrics.clone();
    let mut mirror_rx = phase_rx;
    let mirror_handle = tokio::spawn(async move {
        loop {
            let phase = *mirror_rx.borrow();
            phase_metrics.set_phase(phase.as_str());
            if phase.is_terminal() {
                break;
            }
            if mirror_rx.changed().await.is_err() {
                break;
            }
        }
    });

    health_registry.set_ready(true).await;

    let driver = LocustDriver {
        locustfile: scenario.locustfile.clone().into(),
        host: scenario.host.clone(),
        users: scenario.users,
        spawn_rate: scenario.spawn_rate,
        run_time: scenario.run_time.clone(),
        out_dir: run_dir.root().to_path_buf(),
        extra_args: vec![],
    };

    let summary = sequencer.run(&driver).await?;
    if let Some(error) = &summary.workload_error {
        logger.log_workload_failed(error);
        health_registry
            .set_degraded(components::WORKLOAD, error.clone())
            .await;
    }
    if let Some(stats) = summary.sampler {
        metrics.add_power_samples(stats.samples);
        metrics.add_sampler_errors(stats.errors);
        if stats.samples == 0 {
            health_registry
                .set_degraded(components::SAMPLER, "no samples collected")
                .await;
        }
    }

    let outcome = analyze(&config, &run_dir, &summary, &health_registry, &metrics, &logger).await?;

    write_manifest(&run_dir)?;
    write_metrics_snapshot(&run_dir)?;

    logger.log_run_complete(
        outcome.summary.total_energy_wh,
        outcome.summary.energy_by_service_wh.len(),
        &run_dir.root().display().to_string(),
    );

    mirror_handle.abort();
    api_handle.abort();

    Ok(())
}

struct RunOutcome {
    summary: ExperimentSummary,
}

/// Post-run analysis: scrape CPU, attribute power, write artifacts.
async fn analyze(
    config: &config::RunnerConfig,
    run_dir: &RunDir,
    summary: &RunSummary,
    health_registry: &HealthRegistry,
    metrics: &RunMetrics,
    logger: &RunLogger,
) -> Result<RunOutcome> {
    let start = summary
        .started_at
        .clone()
        .context("run summary is missing the start timestamp")?;
    let end = summary
        .ended_at
        .clone()
        .context("run summary is missing the end timestamp")?;

    let (power_samples, log_stats) = read_power_log(&run_dir.power_log())?;
    info!(
        samples = log_stats.samples,
        error_records = log_stats.error_records,
        malformed = log_stats.malformed_lines,
        "Power log read back"
    );

    let range = TimeRange {
        start,
        end,
        step: config.step.clone(),
    };

    let prom = PromClient::with_defaults(&config.prometheus_url)?;
    let cpu_by_service: BTreeMap<String, Vec<CpuSample>> =
        match scrape_cpu_by_service(&prom, &range, &config.rate_window, config.host_cpu_cores)
            .await
        {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "CPU scrape failed");
                health_registry
                    .set_degraded(components::METRICS_BACKEND, format!("{e:#}"))
                    .await;
                BTreeMap::new()
            }
        };
    metrics.set_services_observed(cpu_by_service.len() as i64);
    write_json_atomic(&run_dir.cpu_series(), &cpu_by_service)?;

    let core_series = export_core_series(&prom, &range, &config.rate_window).await;
    write_json_atomic(&run_dir.core_series(), &core_series)?;

    // Attribution needs both streams; an empty one degrades the run
    // instead of failing it, so the telemetry already on disk survives.
    let (series, stats) = if power_samples.is_empty()
        || cpu_by_service.values().all(|s| s.is_empty())
    {
        logger.log_empty_scrape();
        health_registry
            .set_degraded(components::PIPELINE, "nothing to attribute")
            .await;
        (ServiceSeries::new(), PipelineStats::default())
    } else {
        let engine = AttributionEngine::new(AttributionConfig {
            max_skew_seconds: config.max_skew_seconds,
            cpu_epsilon_cores: config.cpu_epsilon_cores,
            host_cpu_cores: config.host_cpu_cores,
        });
        let outcome = engine.run(&power_samples, &cpu_by_service)?;
        (outcome.series, outcome.stats)
    };

    metrics.add_dropped_samples(stats.dropped_power, stats.dropped_cpu);
    metrics.add_alignment(
        stats.aligned_instants,
        stats.service_instants - stats.aligned_instants,
    );
    logger.log_attribution(stats.aligned_instants, stats.service_instants, stats.coverage());

    write_json_atomic(&run_dir.attribution(), &series)?;

    let experiment_summary = ExperimentSummary {
        scenario: summary.scenario.clone(),
        start_iso: summary.started_at.clone(),
        end_iso: summary.ended_at.clone(),
        total_energy_wh: energy::integrate_wh(&power_samples),
        energy_by_service_wh: energy::energy_by_service(&series),
        cpu_fraction: cpu_fraction_over_period(&cpu_by_service),
        alignment_coverage: stats.coverage(),
        power_samples: log_stats.samples,
        sampler_errors: log_stats.error_records,
        dropped_power_samples: stats.dropped_power,
        dropped_cpu_samples: stats.dropped_cpu,
        workload_error: summary.workload_error.clone(),
    };
    write_json_atomic(&run_dir.summary(), &experiment_summary)?;

    Ok(RunOutcome {
        summary: experiment_summary,
    })
}

fn write_manifest(run_dir: &RunDir) -> Result<()> {
    let mut files = BTreeMap::new();
    files.insert(
        "power_jsonl".to_string(),
        run_dir.power_log().display().to_string(),
    );
    files.insert(
        "cpu_by_service".to_string(),
        run_dir.cpu_series().display().to_string(),
    );
    files.insert(
        "attribution".to_string(),
        run_dir.attribution().display().to_string(),
    );
    files.insert(
        "prom_core_series".to_string(),
        run_dir.core_series().display().to_string(),
    );
    files.insert(
        "summary".to_string(),
        run_dir.summary().display().to_string(),
    );
    files.insert(
        "metrics_snapshot".to_string(),
        run_dir.metrics_snapshot().display().to_string(),
    );
    let manifest = RunManifest {
        root: run_dir.root().display().to_string(),
        files,
    };
    write_json_atomic(&run_dir.manifest(), &manifest)
}

/// Dump the final counter values next to the other artifacts.
fn write_metrics_snapshot(run_dir: &RunDir) -> Result<()> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics snapshot")?;
    std::fs::write(run_dir.metrics_snapshot(), buffer)
        .context("Failed to write metrics snapshot")?;
    Ok(())
}
