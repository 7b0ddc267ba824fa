use serde::{Deserialize, Serialize};
use switchyard_config::{FallbackStrategy, RoutingStrategy};

use crate::classifier::TimeConstraint;

/// Highest exploration rate an aggressive caller can reach
const MAX_AGGRESSIVE_EXPLORATION: f64 = 0.5;

/// How much routing may gamble on less-proven providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    /// Never explore
    Conservative,
    /// Explore at the configured rate
    #[default]
    Moderate,
    /// Explore at twice the configured rate
    Aggressive,
}

impl RiskTolerance {
    /// Exploration rate after applying this tolerance to the configured base
    pub fn exploration_rate(self, base: f64) -> f64 {
        match self {
            Self::Conservative => 0.0,
            Self::Moderate => base,
            Self::Aggressive => (base * 2.0).min(MAX_AGGRESSIVE_EXPLORATION).max(base),
        }
    }
}

/// Per-request routing overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingOptions {
    /// Scoring strategy instead of the configured default
    pub strategy: Option<RoutingStrategy>,
    /// Fallback strategy instead of the configured default
    pub fallback_strategy: Option<FallbackStrategy>,
    /// Providers whose estimated cost exceeds this (USD) are excluded
    pub max_cost: Option<f64>,
    /// Providers below this quality (0.0 to 1.0) are excluded
    pub min_quality: Option<f64>,
    /// Providers predicted slower than this are excluded
    pub max_latency_ms: Option<u64>,
    /// Providers that earn a context-fit bonus
    pub preferred: Vec<String>,
    /// Providers that are never considered
    pub excluded: Vec<String>,
    pub risk_tolerance: RiskTolerance,
    /// Overrides the classified time constraint
    pub time_constraint: Option<TimeConstraint>,
    /// Skip the response cache for this request
    pub bypass_cache: bool,
    /// Refuse to route while any budget is exceeded
    pub enforce_budgets: bool,
}

impl RoutingOptions {
    pub fn is_excluded(&self, provider: &str) -> bool {
        self.excluded.iter().any(|p| p == provider)
    }

    pub fn is_preferred(&self, provider: &str) -> bool {
        self.preferred.iter().any(|p| p == provider)
    }
}
