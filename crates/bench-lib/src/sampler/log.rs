//! Append-only power log (one JSON record per line)
//!
//! The sampler task is the only writer; each poll tick appends exactly
//! one line and flushes, so a reader never sees a torn record. Failed
//! polls are written in-band as `{ts, error}` records.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::models::{PowerRecord, PowerSample};

/// Line-oriented writer for the power log.
pub struct PowerLogWriter {
    file: File,
}

impl PowerLogWriter {
    /// Open the log for appending, creating parent directories.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open power log {:?}", path))?;
        Ok(Self { file })
    }

    /// Append one record and flush it to the OS.
    pub async fn append(&mut self, record: &PowerRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record).context("Failed to serialize power record")?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .await
            .context("Failed to append power record")?;
        self.file.flush().await.context("Failed to flush power log")?;
        Ok(())
    }
}

/// What a log read skipped over, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogReadStats {
    pub samples: u64,
    pub error_records: u64,
    pub malformed_lines: u64,
}

/// Read every power sample from a log, skipping error records and
/// unparseable lines. Only an unreadable file is a hard error.
pub fn read_power_log(path: &Path) -> Result<(Vec<PowerSample>, LogReadStats)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read power log {:?}", path))?;

    let mut samples = Vec::new();
    let mut stats = LogReadStats::default();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PowerRecord>(line) {
            Ok(PowerRecord::Sample(sample)) => {
                stats.samples += 1;
                samples.push(sample);
            }
            Ok(PowerRecord::Error { .. }) => stats.error_records += 1,
            Err(_) => stats.malformed_lines += 1,
        }
    }

    Ok((samples, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("power.jsonl");

        let mut writer = PowerLogWriter::open(&path).await.unwrap();
        writer
            .append(&PowerRecord::Sample(PowerSample {
                ts: "2026-01-04T16:11:32+00:00".to_string(),
                power_w: 42.0,
                voltage_v: None,
                energy_total_wh: None,
            }))
            .await
            .unwrap();
        writer
            .append(&PowerRecord::Error {
                ts: "2026-01-04T16:11:33+00:00".to_string(),
                error: "timeout".to_string(),
            })
            .await
            .unwrap();

        let (samples, stats) = read_power_log(&path).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].power_w, 42.0);
        assert_eq!(stats.samples, 1);
        assert_eq!(stats.error_records, 1);
        assert_eq!(stats.malformed_lines, 0);
    }

    #[tokio::test]
    async fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/run/power.jsonl");

        let _writer = PowerLogWriter::open(&path).await.unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_read_skips_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("power.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"ts\":\"2026-01-04T16:11:32+00:00\",\"power_w\":10.0}\n",
                "not json at all\n",
                "\n",
                "{\"ts\":\"2026-01-04T16:11:33+00:00\",\"power_w\":11.0}\n",
            ),
        )
        .unwrap();

        let (samples, stats) = read_power_log(&path).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(stats.malformed_lines, 1);
    }

    #[test]
    fn test_missing_file_is_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_power_log(&dir.path().join("absent.jsonl")).is_err());
    }
}
