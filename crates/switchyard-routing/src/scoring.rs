//! Multi-criteria provider scoring
//!
//! Each capable provider gets six 0-100 sub-scores which a strategy weight
//! vector folds into one total. Capability is a hard filter, never a
//! weight: an incapable provider is dropped, not down-ranked.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use switchyard_config::{RoutingConfig, RoutingStrategy};
use switchyard_core::{Features, ProviderProfile};
use switchyard_health::{CircuitState, ProviderHealthStatus};

use crate::classifier::TaskClassification;
use crate::learning::LearningSnapshot;
use crate::options::RoutingOptions;
use crate::weights::WeightVector;

/// Minimum observations before health data adjusts quality
const MIN_FEEDBACK_SAMPLES: u64 = 10;

/// Failure rate above which quality is penalized
const ERROR_RATE_THRESHOLD: f64 = 0.10;

/// Multiplier applied to failure rate when penalizing quality
const ERROR_PENALTY_FACTOR: f64 = 0.2;

/// Quality points for a provider specialized in the task's category
const SPECIALIZATION_BONUS: f64 = 20.0;

/// Context-fit points before load penalties
const CONTEXT_FIT_BASE: f64 = 80.0;

/// Context-fit points for a caller-preferred provider
const PREFERENCE_BONUS: f64 = 20.0;

/// Sub-scores for one provider, each 0 to 100
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub cost: f64,
    pub quality: f64,
    pub speed: f64,
    pub reliability: f64,
    pub capability: f64,
    pub context_fit: f64,
}

/// Ranked score for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderScore {
    pub provider: String,
    /// Weighted total (0 to 100, before the adaptive preference factor)
    pub total: f64,
    pub breakdown: ScoreBreakdown,
    /// Estimated request cost (USD)
    pub estimated_cost: f64,
    pub predicted_latency_ms: f64,
    pub circuit: CircuitState,
}

/// Point-in-time inputs for one scoring pass
///
/// Built from snapshots so scoring never holds a lock on shared state.
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    pub health: HashMap<String, ProviderHealthStatus>,
    pub learning: LearningSnapshot,
    /// In-flight requests per provider
    pub load: HashMap<String, u32>,
    pub options: RoutingOptions,
}

impl ScoringContext {
    pub fn new(options: RoutingOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_health(mut self, statuses: Vec<ProviderHealthStatus>) -> Self {
        self.health = statuses.into_iter().map(|s| (s.provider.clone(), s)).collect();
        self
    }

    #[must_use]
    pub fn with_learning(mut self, learning: LearningSnapshot) -> Self {
        self.learning = learning;
        self
    }

    #[must_use]
    pub fn with_load(mut self, load: HashMap<String, u32>) -> Self {
        self.load = load;
        self
    }

    fn circuit(&self, provider: &str) -> CircuitState {
        self.health
            .get(provider)
            .map_or(CircuitState::Closed, |s| s.circuit_state)
    }
}

/// Provider that survived the hard filters, before relative scoring
struct Candidate<'a> {
    profile: &'a ProviderProfile,
    estimated_cost: f64,
    predicted_latency_ms: f64,
    quality: f64,
}

/// Converts classification and runtime data into ranked provider scores
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: RoutingConfig,
}

impl ScoringEngine {
    pub const fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Score and rank providers for a classified request
    ///
    /// Output is sorted by total, descending; ties keep registration order.
    /// Providers failing any hard filter are absent from the output.
    pub fn score(
        &self,
        profiles: &[ProviderProfile],
        classification: &TaskClassification,
        context: &ScoringContext,
    ) -> Vec<ProviderScore> {
        let options = &context.options;
        let strategy = options.strategy.unwrap_or(self.config.strategy);
        let weights = WeightVector::for_strategy(strategy, classification);

        let candidates: Vec<Candidate<'_>> = profiles
            .iter()
            .filter(|profile| is_capable(profile, classification))
            .filter(|profile| !options.is_excluded(&profile.name))
            .map(|profile| Candidate {
                profile,
                estimated_cost: profile.estimate_cost(
                    classification.estimated_tokens.input,
                    classification.estimated_tokens.output,
                ),
                predicted_latency_ms: predict_latency(profile, classification, context),
                quality: effective_quality(profile.capabilities.quality, context.health.get(&profile.name)),
            })
            .filter(|c| options.min_quality.is_none_or(|min| c.quality >= min))
            .filter(|c| {
                options
                    .max_latency_ms
                    .is_none_or(|max| c.predicted_latency_ms <= max as f64)
            })
            .filter(|c| options.max_cost.is_none_or(|max| c.estimated_cost <= max))
            .collect();

        let max_cost = candidates.iter().map(|c| c.estimated_cost).fold(0.0, f64::max);
        let max_latency = candidates.iter().map(|c| c.predicted_latency_ms).fold(0.0, f64::max);

        let mut scores: Vec<ProviderScore> = candidates
            .iter()
            .map(|candidate| {
                let name = candidate.profile.name.as_str();
                let circuit = context.circuit(name);

                let breakdown = ScoreBreakdown {
                    cost: inverse_linear(candidate.estimated_cost, max_cost),
                    quality: quality_score(candidate, classification, context),
                    speed: inverse_linear(candidate.predicted_latency_ms, max_latency),
                    reliability: self.reliability_score(context.health.get(name), circuit),
                    capability: 100.0,
                    context_fit: self.context_fit(name, context),
                };

                let mut total = weights.combine(&breakdown);
                if strategy == RoutingStrategy::Adaptive
                    && let Some(stats) = context.learning.provider(name)
                {
                    // Learned preference nudges totals by up to ±10%
                    total *= 0.2f64.mul_add(stats.preference, 0.9);
                }

                ProviderScore {
                    provider: name.to_owned(),
                    total,
                    breakdown,
                    estimated_cost: candidate.estimated_cost,
                    predicted_latency_ms: candidate.predicted_latency_ms,
                    circuit,
                }
            })
            .collect();

        scores.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));

        tracing::debug!(
            strategy = ?strategy,
            candidates = scores.len(),
            filtered = profiles.len() - scores.len(),
            "providers scored"
        );

        scores
    }

    fn reliability_score(&self, status: Option<&ProviderHealthStatus>, circuit: CircuitState) -> f64 {
        let success_rate = status
            .filter(|s| s.is_tested())
            .map_or(self.config.untested_reliability, ProviderHealthStatus::success_rate);

        let score = (success_rate * 100.0).clamp(0.0, 100.0);

        match circuit {
            CircuitState::Closed => score,
            CircuitState::HalfOpen => score / 2.0,
            CircuitState::Open => 0.0,
        }
    }

    fn context_fit(&self, provider: &str, context: &ScoringContext) -> f64 {
        let load = context.load.get(provider).copied().unwrap_or(0);
        let mut fit = f64::from(load)
            .mul_add(-self.config.load_penalty_per_request, CONTEXT_FIT_BASE)
            .max(0.0);

        if context.options.is_preferred(provider) {
            fit += PREFERENCE_BONUS;
        }

        fit
    }
}

/// Whether a provider can serve the request at all
fn is_capable(profile: &ProviderProfile, classification: &TaskClassification) -> bool {
    let caps = &profile.capabilities;
    let required = classification.required_features;

    classification.estimated_tokens.total <= u64::from(caps.context_window) && supports(caps.features, required)
}

const fn supports(available: Features, required: Features) -> bool {
    (!required.streaming || available.streaming)
        && (!required.tool_calling || available.tool_calling)
        && (!required.vision || available.vision)
}

/// Learned latency for the task category, then for the provider, then the
/// observed health average, then the advertised nominal latency
fn predict_latency(profile: &ProviderProfile, classification: &TaskClassification, context: &ScoringContext) -> f64 {
    let name = profile.name.as_str();

    context
        .learning
        .category(name, classification.category)
        .and_then(|s| s.latency_ms)
        .or_else(|| context.learning.provider(name).and_then(|s| s.latency_ms))
        .or_else(|| {
            context
                .health
                .get(name)
                .filter(|s| s.successful_requests > 0)
                .map(|s| s.average_response_ms)
        })
        .unwrap_or(profile.capabilities.nominal_latency_ms as f64)
}

/// Base quality, demoted for providers with a high observed failure rate
///
/// Without enough observations the base quality stands. The penalty is
/// bounded so observations can only demote, never promote.
pub fn effective_quality(base: f64, health: Option<&ProviderHealthStatus>) -> f64 {
    let Some(status) = health else {
        return base;
    };

    if status.total_requests < MIN_FEEDBACK_SAMPLES || status.failure_rate <= ERROR_RATE_THRESHOLD {
        return base;
    }

    status.failure_rate.mul_add(-ERROR_PENALTY_FACTOR, base).clamp(0.0, 1.0)
}

/// `0.6·base + 0.2·historical + 20 if specialized`, on a 0-100 scale
fn quality_score(candidate: &Candidate<'_>, classification: &TaskClassification, context: &ScoringContext) -> f64 {
    let name = candidate.profile.name.as_str();

    let historical = context
        .learning
        .category(name, classification.category)
        .and_then(|s| s.quality)
        .or_else(|| context.learning.provider(name).and_then(|s| s.quality))
        .unwrap_or(candidate.quality);

    let mut score = (0.2 * historical).mul_add(100.0, 0.6 * candidate.quality * 100.0);

    if candidate
        .profile
        .capabilities
        .specializations
        .contains(&classification.category)
    {
        score += SPECIALIZATION_BONUS;
    }

    score.clamp(0.0, 100.0)
}

/// `100·(1 − value/max)`, clipped to 0-100; 100 when every value is zero
fn inverse_linear(value: f64, max: f64) -> f64 {
    if max <= 0.0 {
        return 100.0;
    }
    (100.0 * (1.0 - value / max)).clamp(0.0, 100.0)
}
