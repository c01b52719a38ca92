//! Background power sampling task
//!
//! One dedicated task polls the meter at a fixed period and appends one
//! record per tick to the power log. The orchestrator owns the sampler
//! handle; the only shared state is the stop flag (written by the
//! orchestrator, read by the task) and the log sink (written by the
//! task alone).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::models::{PowerRecord, PowerSample};

use super::log::PowerLogWriter;
use super::meter::PowerMeter;

/// Configuration for the power sampler task
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Poll frequency in Hz.
    pub hz: f64,
    /// Upper bound on waiting for the task to finish during stop.
    pub join_timeout: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            hz: 1.0,
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Poll outcome counters reported when the task finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub samples: u64,
    pub errors: u64,
}

/// Handle to a running power sampler.
///
/// Owns the stop flag and the task handle; dropping the handle without
/// calling [`stop`](Self::stop) leaves the task running until the
/// runtime shuts down, so the sequencer always stops it explicitly.
pub struct PowerSampler {
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<SamplerStats>>,
    join_timeout: Duration,
}

impl PowerSampler {
    /// Open the log sink and spawn the polling task.
    ///
    /// Fails fast if the sink cannot be created; poll errors after that
    /// are recorded in-band and never abort the task.
    pub async fn start(
        meter: Arc<dyn PowerMeter>,
        out_path: &Path,
        config: SamplerConfig,
    ) -> Result<Self> {
        let writer = PowerLogWriter::open(out_path).await?;
        let period = if config.hz > 0.0 {
            Duration::from_secs_f64(1.0 / config.hz)
        } else {
            Duration::from_secs(1)
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        info!(hz = config.hz, path = %out_path.display(), "Starting power sampler");
        let handle = tokio::spawn(sample_loop(meter, writer, period, stop_rx));

        Ok(Self {
            stop_tx,
            handle: Some(handle),
            join_timeout: config.join_timeout,
        })
    }

    /// Whether the task has not been stopped yet.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Signal the task to stop and wait for it, bounded.
    ///
    /// Idempotent: calling stop when not running is a no-op returning
    /// `None`. The join timeout is advisory; on expiry the call returns
    /// without stats rather than blocking forever, and the task dies
    /// with the runtime.
    pub async fn stop(&mut self) -> Option<SamplerStats> {
        let handle = self.handle.take()?;
        let _ = self.stop_tx.send(true);

        match tokio::time::timeout(self.join_timeout, handle).await {
            Ok(Ok(stats)) => {
                info!(
                    samples = stats.samples,
                    errors = stats.errors,
                    "Power sampler stopped"
                );
                Some(stats)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Power sampler task panicked");
                None
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.join_timeout.as_secs_f64(),
                    "Power sampler did not stop within the join timeout"
                );
                None
            }
        }
    }
}

async fn sample_loop(
    meter: Arc<dyn PowerMeter>,
    mut writer: PowerLogWriter,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
) -> SamplerStats {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stats = SamplerStats::default();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false);
                let record = match meter.read().await {
                    Ok(reading) => {
                        stats.samples += 1;
                        PowerRecord::Sample(PowerSample {
                            ts,
                            power_w: reading.power_w,
                            voltage_v: reading.voltage_v,
                            energy_total_wh: reading.energy_total_wh,
                        })
                    }
                    Err(e) => {
                        stats.errors += 1;
                        debug!(error = %e, "Meter poll failed, writing error record");
                        PowerRecord::Error {
                            ts,
                            error: e.to_string(),
                        }
                    }
                };
                if let Err(e) = writer.append(&record).await {
                    warn!(error = %e, "Failed to append power record");
                }
            }
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::log::read_power_log;
    use crate::sampler::meter::{MeterError, MeterReading};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Mock meter that fails every third poll
    struct FlakyMeter {
        polls: AtomicU64,
    }

    impl FlakyMeter {
        fn new() -> Self {
            Self {
                polls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl PowerMeter for FlakyMeter {
        async fn read(&self) -> Result<MeterReading, MeterError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n % 3 == 2 {
                Err(MeterError::NoPowerField)
            } else {
                Ok(MeterReading {
                    power_w: 40.0 + n as f64,
                    voltage_v: None,
                    energy_total_wh: None,
                })
            }
        }
    }

    #[tokio::test]
    async fn test_sampler_writes_samples_and_error_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("power.jsonl");
        let meter = Arc::new(FlakyMeter::new());

        let mut sampler = PowerSampler::start(
            meter,
            &path,
            SamplerConfig {
                hz: 50.0,
                join_timeout: Duration::from_secs(5),
            },
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let stats = sampler.stop().await.unwrap();

        assert!(stats.samples >= 2, "expected several samples, got {stats:?}");
        assert!(stats.errors >= 1, "expected at least one error record");

        let (samples, log_stats) = read_power_log(&path).unwrap();
        assert_eq!(samples.len() as u64, stats.samples);
        assert_eq!(log_stats.error_records, stats.errors);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("power.jsonl");
        let meter = Arc::new(FlakyMeter::new());

        let mut sampler = PowerSampler::start(meter, &path, SamplerConfig::default())
            .await
            .unwrap();

        assert!(sampler.is_running());
        assert!(sampler.stop().await.is_some());
        assert!(!sampler.is_running());
        // Second stop is a no-op.
        assert!(sampler.stop().await.is_none());
    }

    #[tokio::test]
    async fn test_sampler_produces_a_reading_immediately() {
        // The first tick fires at t=0, so a short-lived sampler still
        // records at least one line (warm-up guarantee).
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("power.jsonl");
        let meter = Arc::new(FlakyMeter::new());

        let mut sampler = PowerSampler::start(
            meter,
            &path,
            SamplerConfig {
                hz: 1.0,
                join_timeout: Duration::from_secs(5),
            },
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stats = sampler.stop().await.unwrap();
        assert_eq!(stats.samples, 1);
    }
}
