use serde::{Deserialize, Serialize};
use switchyard_config::RoutingStrategy;

use crate::classifier::{Complexity, TaskClassification, TimeConstraint};
use crate::scoring::ScoreBreakdown;

/// Weight moved toward quality (from cost) for complex and expert tasks
const ADAPTIVE_QUALITY_SHIFT: f64 = 0.15;

/// Weight moved toward speed (half from cost, half from quality) for realtime tasks
const ADAPTIVE_SPEED_SHIFT: f64 = 0.15;

/// Relative importance of each sub-score, summing to one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    pub cost: f64,
    pub quality: f64,
    pub speed: f64,
    pub reliability: f64,
    pub context: f64,
}

impl WeightVector {
    pub const COST_OPTIMIZED: Self = Self::new(0.60, 0.20, 0.10, 0.10, 0.05);
    pub const QUALITY_FIRST: Self = Self::new(0.05, 0.60, 0.10, 0.25, 0.05);
    pub const SPEED_FIRST: Self = Self::new(0.10, 0.15, 0.55, 0.20, 0.05);
    pub const BALANCED: Self = Self::new(0.25, 0.25, 0.20, 0.30, 0.05);

    pub const fn new(cost: f64, quality: f64, speed: f64, reliability: f64, context: f64) -> Self {
        Self {
            cost,
            quality,
            speed,
            reliability,
            context,
        }
    }

    /// Normalized weights for a strategy and task
    pub fn for_strategy(strategy: RoutingStrategy, classification: &TaskClassification) -> Self {
        let raw = match strategy {
            RoutingStrategy::CostOptimized => Self::COST_OPTIMIZED,
            RoutingStrategy::QualityFirst => Self::QUALITY_FIRST,
            RoutingStrategy::SpeedFirst => Self::SPEED_FIRST,
            RoutingStrategy::Balanced => Self::BALANCED,
            RoutingStrategy::Adaptive => Self::adaptive(classification),
        };

        raw.normalized()
    }

    fn adaptive(classification: &TaskClassification) -> Self {
        let mut weights = Self::BALANCED;

        if classification.complexity >= Complexity::Complex {
            let shift = ADAPTIVE_QUALITY_SHIFT.min(weights.cost);
            weights.cost -= shift;
            weights.quality += shift;
        }

        if classification.time_constraint == TimeConstraint::Realtime {
            let from_cost = (ADAPTIVE_SPEED_SHIFT / 2.0).min(weights.cost);
            let from_quality = (ADAPTIVE_SPEED_SHIFT - from_cost).min(weights.quality);
            weights.cost -= from_cost;
            weights.quality -= from_quality;
            weights.speed += from_cost + from_quality;
        }

        weights
    }

    pub fn sum(&self) -> f64 {
        self.cost + self.quality + self.speed + self.reliability + self.context
    }

    /// Scale so the weights sum to one
    pub fn normalized(self) -> Self {
        let sum = self.sum();
        if sum <= 0.0 {
            return Self::BALANCED.normalized();
        }

        Self::new(
            self.cost / sum,
            self.quality / sum,
            self.speed / sum,
            self.reliability / sum,
            self.context / sum,
        )
    }

    /// Weighted total of a score breakdown (0 to 100)
    pub fn combine(&self, breakdown: &ScoreBreakdown) -> f64 {
        self.context.mul_add(
            breakdown.context_fit,
            self.reliability.mul_add(
                breakdown.reliability,
                self.speed.mul_add(
                    breakdown.speed,
                    self.quality.mul_add(breakdown.quality, self.cost * breakdown.cost),
                ),
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use switchyard_core::{Features, TaskCategory};

    use super::*;
    use crate::classifier::{QualityRequirement, TokenEstimate};

    fn classification(complexity: Complexity, time_constraint: TimeConstraint) -> TaskClassification {
        TaskClassification {
            complexity,
            category: TaskCategory::General,
            estimated_tokens: TokenEstimate::default(),
            requires_reasoning: false,
            time_constraint,
            quality_requirement: QualityRequirement::Medium,
            required_features: Features::default(),
        }
    }

    #[test]
    fn fixed_strategies_are_normalized() {
        let c = classification(Complexity::Medium, TimeConstraint::Normal);
        for strategy in [
            RoutingStrategy::CostOptimized,
            RoutingStrategy::QualityFirst,
            RoutingStrategy::SpeedFirst,
            RoutingStrategy::Balanced,
            RoutingStrategy::Adaptive,
        ] {
            let weights = WeightVector::for_strategy(strategy, &c);
            assert!((weights.sum() - 1.0).abs() < 1e-9, "{strategy:?}");
        }
    }

    #[test]
    fn cost_optimized_prefers_cost() {
        let c = classification(Complexity::Medium, TimeConstraint::Normal);
        let weights = WeightVector::for_strategy(RoutingStrategy::CostOptimized, &c);
        assert!(weights.cost > weights.quality);
        assert!(weights.cost > weights.speed);
        assert!(weights.cost > weights.reliability);
    }

    #[test]
    fn adaptive_matches_balanced_for_ordinary_tasks() {
        let c = classification(Complexity::Medium, TimeConstraint::Normal);
        let adaptive = WeightVector::for_strategy(RoutingStrategy::Adaptive, &c);
        let balanced = WeightVector::for_strategy(RoutingStrategy::Balanced, &c);
        assert_eq!(adaptive, balanced);
    }

    #[test]
    fn adaptive_shifts_toward_quality_for_hard_tasks() {
        let c = classification(Complexity::Expert, TimeConstraint::Normal);
        let adaptive = WeightVector::for_strategy(RoutingStrategy::Adaptive, &c);
        let balanced = WeightVector::BALANCED.normalized();
        assert!(adaptive.quality > balanced.quality);
        assert!(adaptive.cost < balanced.cost);
    }

    #[test]
    fn adaptive_shifts_toward_speed_for_realtime() {
        let c = classification(Complexity::Complex, TimeConstraint::Realtime);
        let adaptive = WeightVector::for_strategy(RoutingStrategy::Adaptive, &c);
        let balanced = WeightVector::BALANCED.normalized();
        assert!(adaptive.speed > balanced.speed);
        assert!(adaptive.cost >= 0.0);
        assert!((adaptive.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn combine_is_weighted_sum() {
        let weights = WeightVector::new(0.5, 0.5, 0.0, 0.0, 0.0);
        let breakdown = ScoreBreakdown {
            cost: 100.0,
            quality: 50.0,
            speed: 10.0,
            reliability: 10.0,
            capability: 100.0,
            context_fit: 10.0,
        };
        assert!((weights.combine(&breakdown) - 75.0).abs() < 1e-9);
    }
}
