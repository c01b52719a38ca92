//! Experiment phase sequencing
//!
//! Brackets the workload with sampler start/stop and fixed
//! warm-up/cool-down margins so transient startup and teardown energy
//! is captured. Phases move strictly forward; a sequencer instance is
//! single-use per run (`run` consumes it).
//!
//! A workload failure is deliberately NOT fatal: telemetry keeps being
//! collected through cool-down for its diagnostic value, and the error
//! is carried in the run summary instead of propagated.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::models::ExperimentPhase;
use crate::sampler::{PowerMeter, PowerSampler, SamplerConfig, SamplerStats};
use crate::workload::{WorkloadArtifacts, WorkloadDriver};

/// Timing margins around the workload.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Delay between sampler start and workload start. Guarantees the
    /// meter has produced at least one reading and has settled.
    pub warmup: Duration,
    /// Delay between workload end and sampler stop, capturing trailing
    /// energy.
    pub cooldown: Duration,
    pub sampler: SamplerConfig,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            warmup: Duration::from_secs(3),
            cooldown: Duration::from_secs(3),
            sampler: SamplerConfig::default(),
        }
    }
}

/// What one sequenced run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub scenario: String,
    /// Workload window start (normalized UTC), set on entering Running.
    pub started_at: Option<String>,
    /// Workload window end, set on entering CoolingDown.
    pub ended_at: Option<String>,
    /// Captured workload failure, if any. Never raised to the caller.
    pub workload_error: Option<String>,
    pub workload_artifacts: Option<WorkloadArtifacts>,
    pub sampler: Option<SamplerStats>,
    pub final_phase: ExperimentPhase,
}

/// Single-use orchestrator of one experiment run.
pub struct PhaseSequencer {
    scenario: String,
    meter: Arc<dyn PowerMeter>,
    power_log: PathBuf,
    config: SequencerConfig,
    phase_tx: watch::Sender<ExperimentPhase>,
}

impl PhaseSequencer {
    pub fn new(
        scenario: impl Into<String>,
        meter: Arc<dyn PowerMeter>,
        power_log: PathBuf,
        config: SequencerConfig,
    ) -> Self {
        let (phase_tx, _) = watch::channel(ExperimentPhase::Idle);
        Self {
            scenario: scenario.into(),
            meter,
            power_log,
            config,
            phase_tx,
        }
    }

    /// Observe phase transitions (for the status API).
    pub fn subscribe(&self) -> watch::Receiver<ExperimentPhase> {
        self.phase_tx.subscribe()
    }

    pub fn phase(&self) -> ExperimentPhase {
        *self.phase_tx.borrow()
    }

    /// Run the whole sequence to a terminal phase.
    ///
    /// Only failures of the bracketing machinery itself (the sampler
    /// cannot start) surface as errors and leave the sequencer in
    /// `Failed`; workload failures are captured in the summary.
    pub async fn run(self, driver: &dyn WorkloadDriver) -> Result<RunSummary> {
        let mut summary = RunSummary {
            scenario: self.scenario.clone(),
            started_at: None,
            ended_at: None,
            workload_error: None,
            workload_artifacts: None,
            sampler: None,
            final_phase: ExperimentPhase::Idle,
        };

        let mut sampler = match PowerSampler::start(
            Arc::clone(&self.meter),
            &self.power_log,
            self.config.sampler.clone(),
        )
        .await
        {
            Ok(sampler) => sampler,
            Err(e) => {
                self.transition(ExperimentPhase::Failed);
                summary.final_phase = ExperimentPhase::Failed;
                return Err(e.context("power sampler failed to start"));
            }
        };

        self.transition(ExperimentPhase::WarmingUp);
        tokio::time::sleep(self.config.warmup).await;

        self.transition(ExperimentPhase::Running);
        summary.started_at = Some(now_iso());
        match driver.run().await {
            Ok(artifacts) => summary.workload_artifacts = Some(artifacts),
            Err(e) => {
                // Captured, not propagated: keep collecting telemetry.
                warn!(error = %e, "Workload driver failed; continuing through cool-down");
                summary.workload_error = Some(format!("{e:#}"));
            }
        }

        self.transition(ExperimentPhase::CoolingDown);
        summary.ended_at = Some(now_iso());
        tokio::time::sleep(self.config.cooldown).await;

        summary.sampler = sampler.stop().await;
        self.transition(ExperimentPhase::Stopped);
        summary.final_phase = ExperimentPhase::Stopped;

        Ok(summary)
    }

    fn transition(&self, to: ExperimentPhase) {
        let from = *self.phase_tx.borrow();
        info!(scenario = %self.scenario, from = %from, to = %to, "Experiment phase transition");
        let _ = self.phase_tx.send(to);
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}
