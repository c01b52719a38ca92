//! Core library for greenbench
//!
//! This crate provides the measurement core of the load-test energy
//! harness:
//! - Background power sampling against an external meter
//! - Per-service CPU scraping via a metrics backend
//! - The time-indexed attribution pipeline (merge, align, apportion,
//!   export)
//! - The experiment phase sequencer bracketing the workload
//! - Run artifact persistence, health checks and observability

pub mod artifacts;
pub mod attribution;
pub mod energy;
pub mod health;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod sampler;
pub mod sequencer;
pub mod timestamp;
pub mod workload;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{RunLogger, RunMetrics};
