use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use switchyard_config::CircuitBreakerConfig;
use switchyard_core::{ErrorKind, now_millis};
use tokio::time::Instant;

use crate::breaker::CircuitBreaker;
use crate::{CircuitState, ProviderHealthStatus};

/// A success within this window earns a cascade ordering bonus
const RECENT_SUCCESS_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct Stamp {
    at: Instant,
    unix_ms: u64,
}

impl Stamp {
    fn now() -> Self {
        Self {
            at: Instant::now(),
            unix_ms: now_millis(),
        }
    }
}

/// Per-provider health state
#[derive(Debug)]
struct ProviderState {
    breaker: CircuitBreaker,
    /// Recent outcomes, `true` for failure
    window: VecDeque<bool>,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    timeout_requests: u64,
    rate_limited_requests: u64,
    average_response_ms: f64,
    latency_samples: u64,
    average_cost: f64,
    cost_samples: u64,
    last_success: Option<Stamp>,
    last_failure: Option<Stamp>,
    last_rate_limited: Option<Stamp>,
}

impl ProviderState {
    fn new() -> Self {
        Self {
            breaker: CircuitBreaker::new(),
            window: VecDeque::new(),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            timeout_requests: 0,
            rate_limited_requests: 0,
            average_response_ms: 0.0,
            latency_samples: 0,
            average_cost: 0.0,
            cost_samples: 0,
            last_success: None,
            last_failure: None,
            last_rate_limited: None,
        }
    }

    fn push_outcome(&mut self, failed: bool, latency: Duration, window_size: usize) {
        self.window.push_back(failed);
        while self.window.len() > window_size {
            self.window.pop_front();
        }

        self.total_requests += 1;
        self.latency_samples += 1;
        let sample = latency.as_secs_f64() * 1000.0;
        self.average_response_ms += (sample - self.average_response_ms) / self.latency_samples as f64;
    }

    fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().filter(|failed| **failed).count() as f64 / self.window.len() as f64
    }

    fn status(&mut self, provider: &str, config: &CircuitBreakerConfig) -> ProviderHealthStatus {
        ProviderHealthStatus {
            provider: provider.to_owned(),
            circuit_state: self.breaker.current(config),
            consecutive_failures: self.breaker.consecutive_failures,
            consecutive_successes: self.breaker.consecutive_successes,
            failure_rate: self.failure_rate(),
            average_response_ms: self.average_response_ms,
            average_cost: self.average_cost,
            last_success_ms: self.last_success.map(|s| s.unix_ms),
            last_failure_ms: self.last_failure.map(|s| s.unix_ms),
            last_rate_limited_ms: self.last_rate_limited.map(|s| s.unix_ms),
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            timeout_requests: self.timeout_requests,
            rate_limited_requests: self.rate_limited_requests,
        }
    }
}

/// Permission to send one request to a provider
///
/// Holds a half-open probe slot when the circuit is probing; the slot is
/// released on drop, including when the request future is cancelled.
#[derive(Debug)]
#[must_use]
pub struct Admission {
    probe: Option<(Arc<Mutex<ProviderState>>, u64)>,
}

impl Admission {
    /// Whether this admission consumed a half-open probe slot
    pub const fn is_probe(&self) -> bool {
        self.probe.is_some()
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        if let Some((state, generation)) = self.probe.take() {
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .breaker
                .release_probe(generation);
        }
    }
}

/// Track provider health and implement circuit breaker logic
///
/// Mutations of one provider are serialized by its own lock; different
/// providers never contend.
pub struct HealthTracker {
    providers: DashMap<String, Arc<Mutex<ProviderState>>>,
    config: CircuitBreakerConfig,
}

impl HealthTracker {
    /// Create a new health tracker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            providers: DashMap::new(),
            config,
        }
    }

    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn entry(&self, provider: &str) -> Arc<Mutex<ProviderState>> {
        if let Some(state) = self.providers.get(provider) {
            return Arc::clone(&state);
        }

        Arc::clone(
            &self
                .providers
                .entry(provider.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(ProviderState::new()))),
        )
    }

    fn existing(&self, provider: &str) -> Option<Arc<Mutex<ProviderState>>> {
        self.providers.get(provider).map(|state| Arc::clone(&state))
    }

    /// Check the circuit state for a provider
    ///
    /// Unknown providers are closed. An open circuit whose timeout has
    /// elapsed moves to half-open here.
    pub fn state(&self, provider: &str) -> CircuitState {
        let Some(state) = self.existing(provider) else {
            return CircuitState::Closed;
        };

        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        let before = guard.breaker.state;
        let after = guard.breaker.current(&self.config);
        drop(guard);

        if before != after {
            tracing::info!(provider, "circuit breaker half-open, probing provider");
        }

        after
    }

    /// Whether requests to a provider are currently blocked
    pub fn is_open(&self, provider: &str) -> bool {
        self.state(provider) == CircuitState::Open
    }

    /// Ask to send one request to a provider
    ///
    /// Returns `None` when the circuit is open or every half-open probe
    /// slot is taken.
    pub fn admit(&self, provider: &str) -> Option<Admission> {
        let state = self.entry(provider);
        let admitted = state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .breaker
            .try_admit(&self.config)?;

        Some(Admission {
            probe: admitted.map(|generation| (state, generation)),
        })
    }

    /// Record a successful request to a provider
    pub fn record_success(&self, provider: &str, latency: Duration) {
        let state = self.entry(provider);
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);

        guard.push_outcome(false, latency, self.config.window_size);
        guard.successful_requests += 1;
        guard.last_success = Some(Stamp::now());
        let transition = guard.breaker.on_success(&self.config);
        drop(guard);

        if transition == Some(CircuitState::Closed) {
            tracing::info!(provider, "circuit breaker closed for provider");
        }
    }

    /// Record a failed request to a provider
    pub fn record_failure(&self, provider: &str, kind: ErrorKind, latency: Duration) {
        let state = self.entry(provider);
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);

        guard.push_outcome(true, latency, self.config.window_size);
        guard.failed_requests += 1;
        let now = Stamp::now();
        guard.last_failure = Some(now);

        match kind {
            ErrorKind::Timeout => guard.timeout_requests += 1,
            ErrorKind::RateLimit => {
                guard.rate_limited_requests += 1;
                guard.last_rate_limited = Some(now);
            }
            _ => {}
        }

        let transition = guard.breaker.on_failure(&self.config);
        let failures = guard.breaker.consecutive_failures;
        drop(guard);

        if transition == Some(CircuitState::Open) {
            tracing::warn!(
                provider,
                consecutive_failures = failures,
                error_kind = %kind,
                "circuit breaker opened for provider"
            );
        }
    }

    /// Fold the cost of a completed request into the provider's average
    pub fn record_cost(&self, provider: &str, cost: f64) {
        let state = self.entry(provider);
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);

        guard.cost_samples += 1;
        let samples = guard.cost_samples as f64;
        guard.average_cost += (cost - guard.average_cost) / samples;
    }

    /// Whether the provider reported a rate limit within the cooldown
    pub fn recently_rate_limited(&self, provider: &str) -> bool {
        self.existing(provider).is_some_and(|state| {
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .last_rate_limited
                .is_some_and(|stamp| stamp.at.elapsed() < self.config.rate_limit_cooldown())
        })
    }

    pub fn consecutive_failures(&self, provider: &str) -> u32 {
        self.existing(provider).map_or(0, |state| {
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .breaker
                .consecutive_failures
        })
    }

    /// Ordering score used by the cascade strategy
    ///
    /// Starts at 100 and penalizes failure rate, consecutive failures, and
    /// open or half-open circuits; a recent success earns a bonus. Not
    /// clamped, so badly failing providers keep their relative order.
    pub fn health_score(&self, provider: &str) -> f64 {
        let Some(state) = self.existing(provider) else {
            return 100.0;
        };

        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        let circuit = guard.breaker.current(&self.config);

        let mut score = f64::from(guard.breaker.consecutive_failures).mul_add(-10.0, guard.failure_rate().mul_add(-50.0, 100.0));

        score -= match circuit {
            CircuitState::Open => 100.0,
            CircuitState::HalfOpen => 30.0,
            CircuitState::Closed => 0.0,
        };

        if guard
            .last_success
            .is_some_and(|stamp| stamp.at.elapsed() < RECENT_SUCCESS_WINDOW)
        {
            score += 10.0;
        }

        score
    }

    /// Health of a single provider, if it has been seen
    pub fn status(&self, provider: &str) -> Option<ProviderHealthStatus> {
        let state = self.existing(provider)?;
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        Some(guard.status(provider, &self.config))
    }

    /// Health of every tracked provider, ordered by name
    pub fn snapshot(&self) -> Vec<ProviderHealthStatus> {
        let entries: Vec<(String, Arc<Mutex<ProviderState>>)> = self
            .providers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut statuses: Vec<_> = entries
            .into_iter()
            .map(|(name, state)| {
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .status(&name, &self.config)
            })
            .collect();

        statuses.sort_by(|a, b| a.provider.cmp(&b.provider));
        statuses
    }

    /// Move every expired open circuit to half-open
    ///
    /// Returns the number of circuits that transitioned.
    pub fn sweep(&self) -> usize {
        let names: Vec<String> = self.providers.iter().map(|entry| entry.key().clone()).collect();

        let mut transitioned = 0;
        for name in names {
            let Some(state) = self.existing(&name) else {
                continue;
            };

            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.breaker.state == CircuitState::Open
                && guard.breaker.current(&self.config) == CircuitState::HalfOpen
            {
                transitioned += 1;
                drop(guard);
                tracing::info!(provider = %name, "circuit breaker half-open, probing provider");
            }
        }

        transitioned
    }

    /// Clear health state for one provider, or for all when `None`
    pub fn reset(&self, provider: Option<&str>) {
        match provider {
            Some(name) => {
                self.providers.remove(name);
            }
            None => self.providers.clear(),
        }
    }

    /// Seed counters and averages from a persisted snapshot
    ///
    /// Circuits start closed; only statistics carry over.
    pub fn restore(&self, statuses: &[ProviderHealthStatus]) {
        for status in statuses {
            let state = self.entry(&status.provider);
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);

            guard.total_requests = status.total_requests;
            guard.successful_requests = status.successful_requests;
            guard.failed_requests = status.failed_requests;
            guard.timeout_requests = status.timeout_requests;
            guard.rate_limited_requests = status.rate_limited_requests;
            guard.average_response_ms = status.average_response_ms;
            guard.latency_samples = status.total_requests;
            guard.average_cost = status.average_cost;
            guard.cost_samples = status.successful_requests;

            // Rebuild a window with the persisted failure ratio
            let len = usize::try_from(status.total_requests)
                .unwrap_or(usize::MAX)
                .min(self.config.window_size);
            let failures = (status.failure_rate * len as f64).round() as usize;
            guard.window = (0..len).map(|i| i < failures).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            timeout_ms: 5_000,
            half_open_max_probes: 1,
            window_size: 10,
            rate_limit_cooldown_ms: 60_000,
        }
    }

    const LATENCY: Duration = Duration::from_millis(100);

    fn trip(tracker: &HealthTracker, provider: &str) {
        for _ in 0..tracker.config().failure_threshold {
            tracker.record_failure(provider, ErrorKind::Server, LATENCY);
        }
    }

    fn expire(tracker: &HealthTracker, provider: &str) {
        let state = tracker.existing(provider).unwrap();
        state.lock().unwrap().breaker.changed_at =
            Instant::now() - tracker.config().timeout() - Duration::from_millis(1);
    }

    #[test]
    fn healthy_provider_is_closed() {
        let tracker = HealthTracker::new(test_config());
        assert_eq!(tracker.state("test"), CircuitState::Closed);
        assert!(!tracker.is_open("test"));
        assert!(tracker.status("test").is_none());
    }

    #[test]
    fn failures_at_threshold_open_circuit() {
        let tracker = HealthTracker::new(test_config());
        tracker.record_failure("test", ErrorKind::Server, LATENCY);
        tracker.record_failure("test", ErrorKind::Server, LATENCY);
        assert_eq!(tracker.state("test"), CircuitState::Closed);

        tracker.record_failure("test", ErrorKind::Server, LATENCY);
        assert!(tracker.is_open("test"));
        assert!(tracker.admit("test").is_none());
    }

    #[test]
    fn independent_provider_tracking() {
        let tracker = HealthTracker::new(test_config());
        trip(&tracker, "bad");

        assert!(tracker.is_open("bad"));
        assert!(!tracker.is_open("good"));
        assert!(tracker.admit("good").is_some());
    }

    #[test]
    fn sweep_moves_expired_circuits_to_half_open() {
        let tracker = HealthTracker::new(test_config());
        trip(&tracker, "a");
        trip(&tracker, "b");
        expire(&tracker, "a");

        assert_eq!(tracker.sweep(), 1);
        assert_eq!(tracker.state("a"), CircuitState::HalfOpen);
        assert_eq!(tracker.state("b"), CircuitState::Open);
    }

    #[test]
    fn half_open_probe_released_on_drop() {
        let tracker = HealthTracker::new(test_config());
        trip(&tracker, "test");
        expire(&tracker, "test");

        let probe = tracker.admit("test").unwrap();
        assert!(probe.is_probe());
        assert!(tracker.admit("test").is_none());

        drop(probe);
        assert!(tracker.admit("test").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn open_circuit_half_opens_once_the_clock_passes_the_timeout() {
        let tracker = HealthTracker::new(test_config());
        trip(&tracker, "test");

        tokio::time::advance(tracker.config().timeout() - Duration::from_millis(1)).await;
        assert!(tracker.admit("test").is_none());
        assert_eq!(tracker.state("test"), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(2)).await;
        let admission = tracker.admit("test").unwrap();
        assert!(admission.is_probe());
        assert_eq!(tracker.state("test"), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_recovery_closes_circuit() {
        let tracker = HealthTracker::new(test_config());
        trip(&tracker, "test");
        expire(&tracker, "test");

        tracker.record_success("test", LATENCY);
        assert_eq!(tracker.state("test"), CircuitState::HalfOpen);
        tracker.record_success("test", LATENCY);
        assert_eq!(tracker.state("test"), CircuitState::Closed);
    }

    #[test]
    fn counters_and_rates() {
        let tracker = HealthTracker::new(test_config());
        tracker.record_success("test", Duration::from_millis(100));
        tracker.record_failure("test", ErrorKind::Timeout, Duration::from_millis(300));
        tracker.record_failure("test", ErrorKind::RateLimit, Duration::from_millis(200));
        tracker.record_success("test", Duration::from_millis(200));
        tracker.record_cost("test", 0.02);
        tracker.record_cost("test", 0.04);

        let status = tracker.status("test").unwrap();
        assert_eq!(status.total_requests, 4);
        assert_eq!(status.successful_requests, 2);
        assert_eq!(status.failed_requests, 2);
        assert_eq!(status.timeout_requests, 1);
        assert_eq!(status.rate_limited_requests, 1);
        assert!((status.failure_rate - 0.5).abs() < 1e-9);
        assert!((status.average_response_ms - 200.0).abs() < 1e-6);
        assert!((status.average_cost - 0.03).abs() < 1e-9);
        assert!(status.last_rate_limited_ms.is_some());
    }

    #[test]
    fn failure_rate_uses_rolling_window() {
        let tracker = HealthTracker::new(test_config());
        tracker.record_failure("test", ErrorKind::Server, LATENCY);
        for _ in 0..10 {
            tracker.record_success("test", LATENCY);
        }

        let status = tracker.status("test").unwrap();
        assert!(status.failure_rate.abs() < f64::EPSILON);
        assert_eq!(status.total_requests, 11);
    }

    #[test]
    fn rate_limit_cooldown_expires() {
        let tracker = HealthTracker::new(test_config());
        tracker.record_failure("test", ErrorKind::RateLimit, LATENCY);
        assert!(tracker.recently_rate_limited("test"));

        {
            let state = tracker.existing("test").unwrap();
            let mut guard = state.lock().unwrap();
            let stamp = guard.last_rate_limited.as_mut().unwrap();
            stamp.at = Instant::now() - tracker.config().rate_limit_cooldown() - Duration::from_millis(1);
        }

        assert!(!tracker.recently_rate_limited("test"));
        assert!(!tracker.recently_rate_limited("unknown"));
    }

    #[test]
    fn health_score_orders_providers() {
        let tracker = HealthTracker::new(test_config());
        tracker.record_success("good", LATENCY);
        tracker.record_failure("shaky", ErrorKind::Server, LATENCY);
        trip(&tracker, "down");

        let good = tracker.health_score("good");
        let shaky = tracker.health_score("shaky");
        let down = tracker.health_score("down");
        let fresh = tracker.health_score("fresh");

        assert!((good - 110.0).abs() < 1e-9);
        assert!((fresh - 100.0).abs() < 1e-9);
        assert!(shaky < fresh);
        assert!(down < shaky);
    }

    #[test]
    fn reset_clears_state() {
        let tracker = HealthTracker::new(test_config());
        trip(&tracker, "a");
        trip(&tracker, "b");

        tracker.reset(Some("a"));
        assert!(!tracker.is_open("a"));
        assert!(tracker.is_open("b"));

        tracker.reset(None);
        assert!(tracker.snapshot().is_empty());
    }

    #[test]
    fn restore_carries_counters_not_circuits() {
        let tracker = HealthTracker::new(test_config());
        trip(&tracker, "a");
        let snapshot = tracker.snapshot();

        let restored = HealthTracker::new(test_config());
        restored.restore(&snapshot);

        let status = restored.status("a").unwrap();
        assert_eq!(status.failed_requests, 3);
        assert_eq!(status.circuit_state, CircuitState::Closed);
        assert!((status.failure_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_serializes() {
        let tracker = HealthTracker::new(test_config());
        tracker.record_success("a", LATENCY);

        let json = serde_json::to_value(tracker.snapshot()).unwrap();
        assert_eq!(json[0]["provider"], "a");
        assert_eq!(json[0]["circuit_state"], "closed");
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let tracker = Arc::new(HealthTracker::new(test_config()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.record_success("test", LATENCY);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.status("test").unwrap().successful_requests, 800);
    }
}
