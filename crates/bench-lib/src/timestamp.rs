//! Timestamp canonicalization
//!
//! Every timestamp that crosses a component boundary goes through
//! [`normalize`] exactly once per data source: parse ISO-8601 (with or
//! without an offset), convert to UTC, truncate to whole seconds, and
//! re-serialize with an explicit UTC offset. Normalized strings are the
//! alignment keys of the whole pipeline.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use thiserror::Error;

/// A timestamp that could not be parsed as ISO-8601.
///
/// Callers must treat this as "drop this sample", never as fatal.
#[derive(Debug, Error)]
#[error("malformed timestamp {input:?}")]
pub struct MalformedTimestamp {
    pub input: String,
}

/// Canonicalize an ISO-8601 timestamp to UTC second resolution.
///
/// Timestamps without an offset are assumed to already be UTC.
/// Idempotent: normalizing a normalized string is a no-op.
pub fn normalize(ts: &str) -> Result<String, MalformedTimestamp> {
    let utc = parse_utc(ts)?;
    Ok(utc.trunc_subsecs(0).to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// Seconds since the Unix epoch, fractional part preserved.
pub fn to_epoch(ts: &str) -> Result<f64, MalformedTimestamp> {
    let utc = parse_utc(ts)?;
    Ok(utc.timestamp_micros() as f64 / 1_000_000.0)
}

/// Format an epoch (whole seconds) as a normalized timestamp string.
pub fn from_epoch_secs(epoch: i64) -> Option<String> {
    Utc.timestamp_opt(epoch, 0)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, false))
}

fn parse_utc(input: &str) -> Result<DateTime<Utc>, MalformedTimestamp> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Offset-free forms, "T" or space separated.
    if let Ok(naive) = input.parse::<NaiveDateTime>() {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(MalformedTimestamp {
        input: input.to_string(),
    })
}
