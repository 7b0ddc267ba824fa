use tokio::time::Instant;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use switchyard_config::CircuitBreakerConfig;

/// Circuit breaker state for a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, requests flow through
    #[default]
    Closed,
    /// Provider is failing, requests are blocked
    Open,
    /// Probing: a limited number of requests test recovery
    HalfOpen,
}

/// Per-provider circuit state machine
///
/// Not synchronized on its own; the tracker serializes access per provider.
#[derive(Debug)]
pub(crate) struct CircuitBreaker {
    pub(crate) state: CircuitState,
    pub(crate) consecutive_failures: u32,
    pub(crate) consecutive_successes: u32,
    pub(crate) changed_at: Instant,
    probes_in_flight: u32,
    /// Bumped on every entry into half-open so stale probe releases are ignored
    generation: u64,
}

impl CircuitBreaker {
    pub(crate) fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            changed_at: Instant::now(),
            probes_in_flight: 0,
            generation: 0,
        }
    }

    /// Current state, moving open to half-open once the timeout has elapsed
    pub(crate) fn current(&mut self, config: &CircuitBreakerConfig) -> CircuitState {
        if self.state == CircuitState::Open && self.changed_at.elapsed() >= config.timeout() {
            self.transition(CircuitState::HalfOpen);
        }
        self.state
    }

    /// Try to let one request through
    ///
    /// Returns the half-open generation when the request consumed a probe
    /// slot, `Some(None)` when admitted freely, and `None` when refused.
    pub(crate) fn try_admit(&mut self, config: &CircuitBreakerConfig) -> Option<Option<u64>> {
        match self.current(config) {
            CircuitState::Closed => Some(None),
            CircuitState::Open => None,
            CircuitState::HalfOpen if self.probes_in_flight < config.half_open_max_probes => {
                self.probes_in_flight += 1;
                Some(Some(self.generation))
            }
            CircuitState::HalfOpen => None,
        }
    }

    /// Release a probe slot taken in the given half-open generation
    pub(crate) fn release_probe(&mut self, generation: u64) {
        if self.state == CircuitState::HalfOpen && self.generation == generation {
            self.probes_in_flight = self.probes_in_flight.saturating_sub(1);
        }
    }

    /// Record a success, returning the new state if it changed
    pub(crate) fn on_success(&mut self, config: &CircuitBreakerConfig) -> Option<CircuitState> {
        let state = self.current(config);
        self.consecutive_failures = 0;
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);

        if state == CircuitState::HalfOpen && self.consecutive_successes >= config.success_threshold {
            self.transition(CircuitState::Closed);
            return Some(CircuitState::Closed);
        }

        None
    }

    /// Record a failure, returning the new state if it changed
    pub(crate) fn on_failure(&mut self, config: &CircuitBreakerConfig) -> Option<CircuitState> {
        let state = self.current(config);
        self.consecutive_successes = 0;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        match state {
            CircuitState::HalfOpen => {
                self.transition(CircuitState::Open);
                Some(CircuitState::Open)
            }
            CircuitState::Closed if self.consecutive_failures >= config.failure_threshold => {
                self.transition(CircuitState::Open);
                Some(CircuitState::Open)
            }
            _ => None,
        }
    }

    fn transition(&mut self, next: CircuitState) {
        self.state = next;
        self.changed_at = Instant::now();
        self.probes_in_flight = 0;

        match next {
            CircuitState::HalfOpen => {
                self.generation += 1;
                self.consecutive_successes = 0;
            }
            CircuitState::Closed => self.consecutive_failures = 0,
            CircuitState::Open => {}
        }
    }
}
