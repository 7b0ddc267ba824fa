//! Provider health tracking with circuit breaker pattern
//!
//! Tracks rolling success, latency, and cost statistics for each provider
//! and keeps traffic away from providers that are consistently failing,
//! allowing them time to recover.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod breaker;
mod status;
mod tracker;

pub use breaker::CircuitState;
pub use status::ProviderHealthStatus;
pub use tracker::{Admission, HealthTracker};
