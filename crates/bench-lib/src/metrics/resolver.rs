//! Priority-ordered candidate query resolution
//!
//! The same logical quantity is exposed under different metric names
//! depending on which instrumentation framework a deployment runs, so
//! each quantity is described by an ordered list of equivalent
//! expressions. Candidates are tried strictly in order; a raised error
//! means "try the next one", never "abort".

use tracing::{debug, warn};

use super::client::{LabeledSeries, RangeQuerier, TimeRange};

/// Evaluate candidates in order; return the first non-empty result.
///
/// A candidate succeeds if the query does not error and the series set
/// is non-empty. Failures are logged and skipped. All candidates
/// failing or returning empty yields an empty result, which callers
/// must accept as a valid outcome.
pub async fn resolve(
    querier: &dyn RangeQuerier,
    candidates: &[String],
    range: &TimeRange,
) -> Vec<LabeledSeries> {
    for expr in candidates {
        match querier.query_range(expr, range).await {
            Ok(series) if !series.is_empty() => {
                debug!(candidate = %expr, series = series.len(), "Candidate query resolved");
                return series;
            }
            Ok(_) => {
                debug!(candidate = %expr, "Candidate query returned no series");
            }
            Err(e) => {
                warn!(candidate = %expr, error = %e, "Candidate query failed, trying next");
            }
        }
    }
    Vec::new()
}
