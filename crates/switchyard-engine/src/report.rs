use serde::Serialize;
use switchyard_config::FallbackStrategy;
use switchyard_core::CompletionResponse;
use switchyard_ledger::BudgetAlert;
use switchyard_resilience::{ExecutionAttempt, FallbackMetrics};
use switchyard_routing::RoutingDecision;

/// Outcome of `route_and_execute`
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// Routing decision, absent when the response came from the cache
    pub decision: Option<RoutingDecision>,
    pub response: CompletionResponse,
    pub feedback: ExecutionFeedback,
}

/// What happened while producing the response
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionFeedback {
    /// Provider that produced the response
    pub provider: String,
    pub cache_hit: bool,
    /// Actual cost charged (USD); zero on a cache hit
    pub cost: f64,
    /// Wall time of the whole call
    pub latency_ms: u64,
    pub attempts: Vec<ExecutionAttempt>,
    pub metrics: FallbackMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<FallbackStrategy>,
    /// Budget alerts raised by this request's spend
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub budget_alerts: Vec<BudgetAlert>,
}

impl ExecutionReport {
    pub(crate) fn cached(response: CompletionResponse, latency_ms: u64) -> Self {
        Self {
            decision: None,
            feedback: ExecutionFeedback {
                provider: response.provider.clone(),
                cache_hit: true,
                latency_ms,
                ..ExecutionFeedback::default()
            },
            response,
        }
    }
}
