//! Resilient execution for Switchyard
//!
//! - **Retry**: exponential backoff with jitter around one provider
//! - **Fallback**: sequential, parallel, cascade, and adaptive chains
//! - **History**: bounded log of recent attempts feeding adaptive ordering

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod attempt;
pub mod error;
pub mod fallback;
pub mod retry;

pub use attempt::{AttemptHistory, AttemptStats, ExecutionAttempt, SkipReason};
pub use error::ExecutionError;
pub use fallback::{FallbackChain, FallbackMetrics, FallbackOrchestrator, FallbackResult};
pub use retry::{RetryOutcome, RetryPolicy, TryReport};
