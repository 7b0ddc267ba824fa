use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use switchyard_core::TaskCategory;

/// Provider scoring strategy
///
/// Each variant maps to a fixed weight vector over the cost, quality,
/// speed, reliability, and context-fit sub-scores.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoutingStrategy {
    /// Cost 0.60, quality 0.20, speed 0.10, reliability 0.10
    CostOptimized,
    /// Cost 0.05, quality 0.60, speed 0.10, reliability 0.25
    QualityFirst,
    /// Cost 0.10, quality 0.15, speed 0.55, reliability 0.20
    SpeedFirst,
    /// Cost 0.25, quality 0.25, speed 0.20, reliability 0.30
    #[default]
    Balanced,
    /// Balanced, shifted toward quality for hard tasks and speed for realtime
    Adaptive,
}

/// Smart routing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Default scoring strategy
    #[serde(default)]
    pub strategy: RoutingStrategy,
    /// Probability (0.0 to 1.0) of exploring a non-top provider
    #[serde(default = "default_exploration_rate")]
    pub exploration_rate: f64,
    /// Maximum number of fallback providers behind the primary
    #[serde(default = "default_fallback_depth")]
    pub fallback_depth: usize,
    /// Reliability assumed for providers without history (0.0 to 1.0)
    #[serde(default = "default_untested_reliability")]
    pub untested_reliability: f64,
    /// Context-fit points deducted per in-flight request on a provider
    #[serde(default = "default_load_penalty")]
    pub load_penalty_per_request: f64,
    /// How long routing decisions are memoized, in milliseconds (0 disables)
    #[serde(default)]
    pub decision_cache_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::default(),
            exploration_rate: default_exploration_rate(),
            fallback_depth: default_fallback_depth(),
            untested_reliability: default_untested_reliability(),
            load_penalty_per_request: default_load_penalty(),
            decision_cache_ms: 0,
        }
    }
}

/// Keyword tables used by the task classifier
///
/// Entries here replace the built-in keyword list for that category; other
/// categories keep their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Category keyword overrides
    #[serde(default)]
    pub keywords: IndexMap<TaskCategory, Vec<String>>,
    /// Phrases that mark a request as needing multi-step reasoning
    #[serde(default)]
    pub reasoning_keywords: Option<Vec<String>>,
}

const fn default_exploration_rate() -> f64 {
    0.1
}

const fn default_fallback_depth() -> usize {
    3
}

const fn default_untested_reliability() -> f64 {
    0.8
}

const fn default_load_penalty() -> f64 {
    10.0
}
