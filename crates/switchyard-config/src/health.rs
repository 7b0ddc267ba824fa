use std::time::Duration;

use serde::Deserialize;

/// Per-provider circuit breaker and health tracking configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Consecutive half-open successes before the circuit closes
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// How long the circuit stays open before probing, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Concurrent probe requests admitted while half-open
    #[serde(default = "default_half_open_max_probes")]
    pub half_open_max_probes: u32,
    /// Number of recent outcomes used for the rolling failure rate
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// How long a rate-limited provider is considered hot, in milliseconds
    #[serde(default = "default_rate_limit_cooldown_ms")]
    pub rate_limit_cooldown_ms: u64,
}

impl CircuitBreakerConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub const fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_ms: default_timeout_ms(),
            half_open_max_probes: default_half_open_max_probes(),
            window_size: default_window_size(),
            rate_limit_cooldown_ms: default_rate_limit_cooldown_ms(),
        }
    }
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_success_threshold() -> u32 {
    2
}

const fn default_timeout_ms() -> u64 {
    30_000
}

const fn default_half_open_max_probes() -> u32 {
    1
}

const fn default_window_size() -> usize {
    100
}

const fn default_rate_limit_cooldown_ms() -> u64 {
    60_000
}
