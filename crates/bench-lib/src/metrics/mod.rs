//! Metrics backend access
//!
//! A thin range-query client, the priority-ordered candidate resolver
//! that tolerates metric-naming drift, and the per-service CPU scrape
//! built on both.

mod client;
mod cpu;
mod resolver;

pub use client::{LabeledSeries, PromClient, RangeQuerier, TimeRange};
pub use cpu::{
    cpu_candidates, cpu_fraction_over_period, export_core_series, p95_latency_candidates,
    read_cpu_series, request_rate_candidates, scrape_cpu_by_service, series_to_cpu_samples,
    CoreSeries,
};
pub use resolver::resolve;
