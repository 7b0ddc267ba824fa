//! Metric names and the engine's instruments

use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};

pub const ROUTING_DECISIONS: &str = "routing.decisions";
pub const PROVIDER_ATTEMPTS: &str = "provider.attempts";
pub const PROVIDER_ATTEMPT_DURATION: &str = "provider.attempt.duration";
pub const CACHE_LOOKUPS: &str = "cache.lookups";
pub const FALLBACK_EXHAUSTED: &str = "fallback.exhausted";
pub const LEDGER_COST: &str = "ledger.cost";
pub const BUDGET_ALERTS: &str = "budget.alerts";

/// Instruments recorded by the engine
///
/// Built from the global meter; without an installed meter provider every
/// recording is a no-op.
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    routing_decisions: Counter<u64>,
    provider_attempts: Counter<u64>,
    attempt_duration: Histogram<f64>,
    cache_lookups: Counter<u64>,
    fallback_exhausted: Counter<u64>,
    ledger_cost: Counter<f64>,
    budget_alerts: Counter<u64>,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        let meter = global::meter("switchyard");

        Self {
            routing_decisions: meter
                .u64_counter(ROUTING_DECISIONS)
                .with_description("Routing decisions made")
                .build(),
            provider_attempts: meter
                .u64_counter(PROVIDER_ATTEMPTS)
                .with_description("Provider invocations by outcome")
                .build(),
            attempt_duration: meter
                .f64_histogram(PROVIDER_ATTEMPT_DURATION)
                .with_description("Provider invocation duration including retries")
                .with_unit("s")
                .build(),
            cache_lookups: meter
                .u64_counter(CACHE_LOOKUPS)
                .with_description("Response cache lookups by result")
                .build(),
            fallback_exhausted: meter
                .u64_counter(FALLBACK_EXHAUSTED)
                .with_description("Fallback chains where every provider failed")
                .build(),
            ledger_cost: meter
                .f64_counter(LEDGER_COST)
                .with_description("Recorded provider spend")
                .with_unit("USD")
                .build(),
            budget_alerts: meter
                .u64_counter(BUDGET_ALERTS)
                .with_description("Budget alerts raised")
                .build(),
        }
    }

    pub fn record_decision(&self, provider: &str, strategy: &str, explored: bool) {
        self.routing_decisions.add(
            1,
            &[
                KeyValue::new("provider", provider.to_owned()),
                KeyValue::new("strategy", strategy.to_owned()),
                KeyValue::new("explored", explored),
            ],
        );
    }

    pub fn record_attempt(&self, provider: &str, outcome: &str, duration: Duration) {
        let attributes = [
            KeyValue::new("provider", provider.to_owned()),
            KeyValue::new("outcome", outcome.to_owned()),
        ];
        self.provider_attempts.add(1, &attributes);
        self.attempt_duration.record(duration.as_secs_f64(), &attributes);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        self.cache_lookups
            .add(1, &[KeyValue::new("result", if hit { "hit" } else { "miss" })]);
    }

    pub fn record_exhausted(&self, strategy: &str) {
        self.fallback_exhausted
            .add(1, &[KeyValue::new("strategy", strategy.to_owned())]);
    }

    pub fn record_cost(&self, provider: &str, cost: f64) {
        self.ledger_cost
            .add(cost, &[KeyValue::new("provider", provider.to_owned())]);
    }

    pub fn record_budget_alert(&self, budget: &str, kind: &str) {
        self.budget_alerts.add(
            1,
            &[
                KeyValue::new("budget", budget.to_owned()),
                KeyValue::new("kind", kind.to_owned()),
            ],
        );
    }
}
