use serde::{Deserialize, Serialize};

use crate::CircuitState;

/// Point-in-time health of one provider
///
/// Timestamps are milliseconds since the unix epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealthStatus {
    pub provider: String,
    pub circuit_state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// Failure fraction over the rolling outcome window (0.0 to 1.0)
    pub failure_rate: f64,
    pub average_response_ms: f64,
    pub average_cost: f64,
    pub last_success_ms: Option<u64>,
    pub last_failure_ms: Option<u64>,
    pub last_rate_limited_ms: Option<u64>,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub timeout_requests: u64,
    pub rate_limited_requests: u64,
}

impl ProviderHealthStatus {
    /// Whether any outcome has ever been recorded
    pub const fn is_tested(&self) -> bool {
        self.total_requests > 0
    }

    /// Success fraction over the rolling window
    pub fn success_rate(&self) -> f64 {
        1.0 - self.failure_rate
    }
}
