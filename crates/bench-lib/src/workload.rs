//! Workload driver interface
//!
//! The load generator is an external collaborator; the sequencer only
//! depends on the [`WorkloadDriver`] contract. The stock implementation
//! shells out to a locust-style headless run and reports the artifact
//! files it produced.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

/// Files produced by a workload run, keyed by artifact name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadArtifacts {
    pub files: BTreeMap<String, PathBuf>,
}

/// Trait for workload driver implementations
#[async_trait]
pub trait WorkloadDriver: Send + Sync {
    /// Execute the workload to completion.
    ///
    /// May fail; the sequencer captures the failure instead of
    /// aborting telemetry collection.
    async fn run(&self) -> Result<WorkloadArtifacts>;
}

/// Parameters of a headless locust run.
#[derive(Debug, Clone)]
pub struct LocustDriver {
    pub locustfile: PathBuf,
    pub host: String,
    pub users: u32,
    pub spawn_rate: u32,
    pub run_time: String,
    pub out_dir: PathBuf,
    pub extra_args: Vec<String>,
}

impl LocustDriver {
    fn command_args(&self) -> Vec<String> {
        let csv_prefix = self.out_dir.join("locust");
        let report = self.out_dir.join("locust_report.html");
        let mut args = vec![
            "-f".to_string(),
            self.locustfile.display().to_string(),
            "--headless".to_string(),
            "--host".to_string(),
            self.host.clone(),
            "-u".to_string(),
            self.users.to_string(),
            "-r".to_string(),
            self.spawn_rate.to_string(),
            "--run-time".to_string(),
            self.run_time.clone(),
            "--csv".to_string(),
            csv_prefix.display().to_string(),
            "--csv-full-history".to_string(),
            "--html".to_string(),
            report.display().to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    fn artifacts(&self) -> WorkloadArtifacts {
        let mut files = BTreeMap::new();
        files.insert(
            "stats_csv".to_string(),
            self.out_dir.join("locust_stats.csv"),
        );
        files.insert(
            "stats_history_csv".to_string(),
            self.out_dir.join("locust_stats_history.csv"),
        );
        files.insert(
            "failures_csv".to_string(),
            self.out_dir.join("locust_failures.csv"),
        );
        files.insert(
            "report_html".to_string(),
            self.out_dir.join("locust_report.html"),
        );
        WorkloadArtifacts { files }
    }
}

#[async_trait]
impl WorkloadDriver for LocustDriver {
    async fn run(&self) -> Result<WorkloadArtifacts> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .with_context(|| format!("Failed to create workload dir {:?}", self.out_dir))?;

        let args = self.command_args();
        info!(host = %self.host, users = self.users, run_time = %self.run_time, "Launching load generator");
        debug!(args = ?args, "locust invocation");

        let output = Command::new("locust")
            .args(&args)
            .output()
            .await
            .context("Failed to launch locust")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "locust exited with {}: {}",
                output.status,
                stderr.chars().take(2000).collect::<String>()
            );
        }

        Ok(self.artifacts())
    }
}
