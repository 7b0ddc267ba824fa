use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy configuration applied to each provider invocation
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Maximum tries per provider invocation (including the first)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second try, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Exponential growth factor between delays
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Randomize each delay by ±25%
    #[serde(default = "default_true")]
    pub jitter: bool,
    /// Hard deadline for a single try, in milliseconds
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl RetryConfig {
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: true,
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

/// How a fallback chain is executed
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FallbackStrategy {
    /// Strictly in order, first success wins
    Sequential,
    /// Race several providers concurrently, first success wins
    Parallel,
    /// In health-score order, proactively skipping unhealthy providers
    #[default]
    Cascade,
    /// Ordered by recent success rate and speed, then cascaded
    Adaptive,
}

/// Fallback orchestration configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackConfig {
    /// Default execution strategy
    #[serde(default)]
    pub strategy: FallbackStrategy,
    /// Providers raced concurrently by the parallel strategy
    #[serde(default = "default_parallel_attempts")]
    pub parallel_attempts: usize,
    /// Consecutive failures at which cascade skips a provider without trying it
    #[serde(default = "default_cascade_skip_failures")]
    pub cascade_skip_consecutive_failures: u32,
    /// Attempts retained for adaptive ordering and diagnostics
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Age after which attempts are trimmed from history, in seconds
    #[serde(default = "default_history_retention_seconds")]
    pub history_retention_seconds: u64,
}

impl FallbackConfig {
    pub const fn history_retention(&self) -> Duration {
        Duration::from_secs(self.history_retention_seconds)
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            strategy: FallbackStrategy::default(),
            parallel_attempts: default_parallel_attempts(),
            cascade_skip_consecutive_failures: default_cascade_skip_failures(),
            history_size: default_history_size(),
            history_retention_seconds: default_history_retention_seconds(),
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_delay_ms() -> u64 {
    200
}

const fn default_max_delay_ms() -> u64 {
    5_000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_attempt_timeout_ms() -> u64 {
    30_000
}

const fn default_parallel_attempts() -> usize {
    2
}

const fn default_cascade_skip_failures() -> u32 {
    3
}

const fn default_history_size() -> usize {
    1_000
}

const fn default_history_retention_seconds() -> u64 {
    3_600
}
