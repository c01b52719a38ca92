//! Run artifact directory layout and file persistence
//!
//! Every experiment writes into its own timestamped directory under the
//! configured artifact root. JSON files are written atomically (temp
//! file + rename) so a crashed run never leaves a torn summary behind.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A run's artifact directory.
#[derive(Debug, Clone)]
pub struct RunDir {
    root: PathBuf,
}

impl RunDir {
    /// Create `<out_root>/<yyyymmdd_hhmmss>_<scenario>/`.
    pub fn create(out_root: &Path, scenario: &str) -> Result<Self> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let root = out_root.join(format!("{stamp}_{scenario}"));
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create run directory {:?}", root))?;
        Ok(Self { root })
    }

    /// Wrap an existing run directory (offline analysis).
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn power_log(&self) -> PathBuf {
        self.root.join("power.jsonl")
    }

    pub fn cpu_series(&self) -> PathBuf {
        self.root.join("cpu_by_service.json")
    }

    pub fn attribution(&self) -> PathBuf {
        self.root.join("attribution.json")
    }

    pub fn core_series(&self) -> PathBuf {
        self.root.join("prom_core_series.json")
    }

    pub fn summary(&self) -> PathBuf {
        self.root.join("summary.json")
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    pub fn metrics_snapshot(&self) -> PathBuf {
        self.root.join("metrics.prom")
    }
}

/// Names every file of a run so downstream tooling never guesses paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub root: String,
    pub files: BTreeMap<String, String>,
}

/// The machine-readable result of one experiment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub scenario: String,
    pub start_iso: Option<String>,
    pub end_iso: Option<String>,
    pub total_energy_wh: f64,
    pub energy_by_service_wh: BTreeMap<String, f64>,
    pub cpu_fraction: BTreeMap<String, f64>,
    /// Fraction of service-bearing instants that aligned, in [0, 1].
    pub alignment_coverage: f64,
    pub power_samples: u64,
    pub sampler_errors: u64,
    pub dropped_power_samples: u64,
    pub dropped_cpu_samples: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_error: Option<String>,
}

/// Serialize `value` as pretty JSON, atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let json = serde_json::to_vec_pretty(value).context("Failed to serialize artifact")?;

    let temp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;
    file.write_all(&json).context("Failed to write artifact")?;
    file.sync_all().context("Failed to sync artifact")?;

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    Ok(())
}

/// Read and deserialize a JSON artifact.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read artifact {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse artifact {:?}", path))
}
