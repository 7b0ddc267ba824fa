//! Smart provider routing for Switchyard
//!
//! Turns a normalized request into a ranked provider chain:
//! - **Classifier**: category, complexity, token and timing estimates
//! - **Scoring**: six weighted sub-scores per capable provider
//! - **Selector**: epsilon-greedy primary plus ordered fallbacks
//! - **Learning**: outcome averages that feed back into scoring

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod classifier;
pub mod error;
pub mod learning;
pub mod options;
pub mod scoring;
pub mod selector;
pub mod weights;

use serde::{Deserialize, Serialize};
use switchyard_config::{ClassifierConfig, RoutingConfig, RoutingStrategy};
use switchyard_core::{CompletionRequest, ProviderProfile};

pub use classifier::{
    Complexity, KeywordTable, QualityRequirement, TaskClassification, TaskClassifier, TimeConstraint, TokenEstimate,
};
pub use error::RoutingError;
pub use learning::{LearningModule, LearningSample, LearningSnapshot, Outcome, PerformanceStats};
pub use options::{RiskTolerance, RoutingOptions};
pub use scoring::{ProviderScore, ScoreBreakdown, ScoringContext, ScoringEngine};
pub use selector::{Selection, Selector};
pub use weights::WeightVector;

/// Result of a routing decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Selected provider name
    pub provider: String,
    /// Human-readable account of why the provider won
    pub reasoning: String,
    /// How clearly the provider won (0.0 to 1.0)
    pub confidence: f64,
    /// Estimated request cost on the selected provider (USD)
    pub estimated_cost: f64,
    pub estimated_latency_ms: f64,
    /// Providers to try, in order, if the selected one fails
    pub fallbacks: Vec<String>,
    pub strategy: RoutingStrategy,
    pub classification: TaskClassification,
    /// Every scored provider, best first
    pub scores: Vec<ProviderScore>,
    /// Whether exploration overrode the top-ranked provider
    pub explored: bool,
}

impl RoutingDecision {
    /// Selected provider followed by fallbacks
    pub fn chain(&self) -> Vec<String> {
        std::iter::once(self.provider.clone())
            .chain(self.fallbacks.iter().cloned())
            .collect()
    }
}

/// Classification, scoring, and selection behind one call
pub struct Router {
    classifier: TaskClassifier,
    scoring: ScoringEngine,
    selector: Selector,
}

impl Router {
    pub fn new(routing: &RoutingConfig, classifier: &ClassifierConfig) -> Self {
        Self {
            classifier: TaskClassifier::new(KeywordTable::from_config(classifier)),
            scoring: ScoringEngine::new(routing.clone()),
            selector: Selector::new(routing.exploration_rate, routing.fallback_depth),
        }
    }

    /// Replace the selector, e.g. with a seeded one
    #[must_use]
    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    /// Classify a request, applying any time-constraint override
    pub fn classify(&self, request: &CompletionRequest, options: &RoutingOptions) -> TaskClassification {
        let mut classification = self.classifier.classify(request);
        if let Some(time_constraint) = options.time_constraint {
            classification.time_constraint = time_constraint;
        }
        classification
    }

    /// Choose a provider chain for a request
    pub fn route(
        &self,
        request: &CompletionRequest,
        profiles: &[ProviderProfile],
        context: &ScoringContext,
    ) -> Result<RoutingDecision, RoutingError> {
        let classification = self.classify(request, &context.options);
        self.route_classified(classification, profiles, context)
    }

    /// Choose a provider chain for an already classified request
    pub fn route_classified(
        &self,
        classification: TaskClassification,
        profiles: &[ProviderProfile],
        context: &ScoringContext,
    ) -> Result<RoutingDecision, RoutingError> {
        if profiles.is_empty() {
            return Err(RoutingError::NoProviders);
        }

        tracing::debug!(
            category = %classification.category,
            complexity = %classification.complexity,
            tokens = classification.estimated_tokens.total,
            time_constraint = %classification.time_constraint,
            "request classified for routing"
        );

        let scores = self.scoring.score(profiles, &classification, context);
        let selection = self
            .selector
            .select(&scores, context.options.risk_tolerance)
            .ok_or(RoutingError::NoEligibleProvider {
                registered: profiles.len(),
            })?;

        let strategy = context.options.strategy.unwrap_or(self.scoring.config().strategy);
        let decision = build_decision(selection, strategy, classification, scores);

        tracing::info!(
            provider = %decision.provider,
            strategy = ?decision.strategy,
            confidence = decision.confidence,
            explored = decision.explored,
            fallbacks = decision.fallbacks.len(),
            "routing decision made"
        );

        Ok(decision)
    }
}

fn build_decision(
    selection: Selection,
    strategy: RoutingStrategy,
    classification: TaskClassification,
    scores: Vec<ProviderScore>,
) -> RoutingDecision {
    let chosen = scores.iter().find(|s| s.provider == selection.primary);
    let runner_up = scores.iter().find(|s| s.provider != selection.primary);

    let (estimated_cost, estimated_latency_ms, total) =
        chosen.map_or((0.0, 0.0, 0.0), |s| (s.estimated_cost, s.predicted_latency_ms, s.total));

    // Scaled by how far the winner leads the next provider
    let margin = match runner_up {
        Some(next) if total > 0.0 => ((total - next.total) / total).clamp(0.0, 1.0),
        Some(_) => 0.0,
        None => 1.0,
    };
    let confidence = ((total / 100.0) * 0.25f64.mul_add(margin, 0.75)).clamp(0.0, 1.0);

    let mut reasoning = chosen.map_or_else(
        || format!("selected {}", selection.primary),
        |s| {
            format!(
                "selected {} for {} {} task via {strategy}: score {:.1} (cost {:.0}, quality {:.0}, speed {:.0}, reliability {:.0}), est ${:.6}, ~{:.0}ms",
                s.provider,
                classification.complexity,
                classification.category,
                s.total,
                s.breakdown.cost,
                s.breakdown.quality,
                s.breakdown.speed,
                s.breakdown.reliability,
                s.estimated_cost,
                s.predicted_latency_ms,
            )
        },
    );
    if selection.explored {
        reasoning.push_str(" (exploration)");
    }

    RoutingDecision {
        provider: selection.primary,
        reasoning,
        confidence,
        estimated_cost,
        estimated_latency_ms,
        fallbacks: selection.fallbacks,
        strategy,
        classification,
        scores,
        explored: selection.explored,
    }
}

#[cfg(test)]
mod tests {
    use switchyard_core::{Pricing, ProviderCapabilities};

    use super::*;

    fn profile(name: &str, price: f64, quality: f64) -> ProviderProfile {
        ProviderProfile {
            name: name.to_owned(),
            capabilities: ProviderCapabilities {
                quality,
                ..ProviderCapabilities::default()
            },
            pricing: Pricing {
                input_per_mtok: price,
                output_per_mtok: price,
            },
        }
    }

    fn router(strategy: RoutingStrategy) -> Router {
        let config = RoutingConfig {
            strategy,
            exploration_rate: 0.0,
            ..RoutingConfig::default()
        };
        Router::new(&config, &ClassifierConfig::default()).with_selector(Selector::with_seed(0.0, 3, 1))
    }

    #[test]
    fn routes_to_cheapest_under_cost_strategy() {
        let profiles = [profile("a", 0.1, 0.6), profile("b", 10.0, 0.95)];
        let request = CompletionRequest::from_prompt("Write a function that reverses a linked list in place");

        let decision = router(RoutingStrategy::CostOptimized)
            .route(&request, &profiles, &ScoringContext::default())
            .unwrap();

        assert_eq!(decision.provider, "a");
        assert_eq!(decision.chain(), ["a", "b"]);
        assert!(decision.reasoning.starts_with("selected a"));
        assert!((0.0..=1.0).contains(&decision.confidence));
        assert!(!decision.explored);
    }

    #[test]
    fn time_constraint_override_applies() {
        let options = RoutingOptions {
            time_constraint: Some(TimeConstraint::Batch),
            ..RoutingOptions::default()
        };

        let classification = router(RoutingStrategy::Balanced).classify(
            &CompletionRequest {
                stream: true,
                ..CompletionRequest::from_prompt("quick answer please")
            },
            &options,
        );
        assert_eq!(classification.time_constraint, TimeConstraint::Batch);
    }

    #[test]
    fn no_providers_is_an_error() {
        let request = CompletionRequest::from_prompt("hello");
        let err = router(RoutingStrategy::Balanced)
            .route(&request, &[], &ScoringContext::default())
            .unwrap_err();
        assert!(matches!(err, RoutingError::NoProviders));
    }

    #[test]
    fn all_filtered_is_an_error() {
        let request = CompletionRequest::from_prompt("hello");
        let context = ScoringContext::new(RoutingOptions {
            excluded: vec!["a".to_owned()],
            ..RoutingOptions::default()
        });

        let err = router(RoutingStrategy::Balanced)
            .route(&request, &[profile("a", 1.0, 0.5)], &context)
            .unwrap_err();
        assert!(matches!(err, RoutingError::NoEligibleProvider { registered: 1 }));
    }

    #[test]
    fn sole_provider_has_full_margin() {
        let request = CompletionRequest::from_prompt("Summarize the quarterly report in three bullet points");
        let decision = router(RoutingStrategy::Balanced)
            .route(&request, &[profile("only", 1.0, 0.8)], &ScoringContext::default())
            .unwrap();

        assert!(decision.fallbacks.is_empty());
        assert!((decision.confidence - decision.scores[0].total / 100.0).abs() < 1e-9);
    }
}
