//! Outcome learning
//!
//! Folds observed latency, quality, and cost into exponential moving
//! averages per provider and per (provider, category), and keeps a bounded
//! preference score that rises on success and falls twice as fast on
//! failure. In-memory; persistence goes through `snapshot`/`import`.

use std::collections::BTreeMap;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use switchyard_config::LearningConfig;
use switchyard_core::TaskCategory;

/// Preference assigned before any outcome is observed
const NEUTRAL_PREFERENCE: f64 = 0.5;

/// Observation from one completed provider invocation
#[derive(Debug, Clone)]
pub struct LearningSample {
    pub provider: String,
    pub category: TaskCategory,
    pub latency: Duration,
    /// Cost of the invocation (USD)
    pub cost: f64,
    /// Quality signal (0.0 to 1.0), when the caller or adapter supplied one
    pub quality: Option<f64>,
}

/// Whether an invocation succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Learned performance for one provider or (provider, category) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub latency_ms: Option<f64>,
    pub quality: Option<f64>,
    pub cost: Option<f64>,
    /// Bounded preference (0.0 to 1.0)
    pub preference: f64,
    pub samples: u64,
    pub successes: u64,
}

impl Default for PerformanceStats {
    fn default() -> Self {
        Self {
            latency_ms: None,
            quality: None,
            cost: None,
            preference: NEUTRAL_PREFERENCE,
            samples: 0,
            successes: 0,
        }
    }
}

impl PerformanceStats {
    fn update(&mut self, sample: &LearningSample, outcome: Outcome, config: &LearningConfig) {
        self.samples += 1;

        match outcome {
            Outcome::Success => {
                self.successes += 1;
                self.latency_ms = Some(ema(self.latency_ms, sample.latency.as_secs_f64() * 1000.0, config.decay));
                self.cost = Some(ema(self.cost, sample.cost, config.decay));
                if let Some(quality) = sample.quality {
                    self.quality = Some(ema(self.quality, quality.clamp(0.0, 1.0), config.decay));
                }
                self.preference = (self.preference + config.learning_rate).min(1.0);
            }
            Outcome::Failure => {
                self.preference = 2.0f64.mul_add(-config.learning_rate, self.preference).max(0.0);
            }
        }
    }
}

/// Exponential moving average; the first observation seeds the average
fn ema(current: Option<f64>, observed: f64, decay: f64) -> f64 {
    current.map_or(observed, |value| decay.mul_add(value, (1.0 - decay) * observed))
}

/// Learned performance of one (provider, category) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPerformance {
    pub provider: String,
    pub category: TaskCategory,
    pub stats: PerformanceStats,
}

/// Serializable copy of everything the module has learned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningSnapshot {
    pub providers: BTreeMap<String, PerformanceStats>,
    pub categories: Vec<CategoryPerformance>,
}

impl LearningSnapshot {
    pub fn provider(&self, provider: &str) -> Option<&PerformanceStats> {
        self.providers.get(provider)
    }

    pub fn category(&self, provider: &str, category: TaskCategory) -> Option<&PerformanceStats> {
        self.categories
            .iter()
            .find(|c| c.provider == provider && c.category == category)
            .map(|c| &c.stats)
    }
}

/// Track learned performance across all providers
pub struct LearningModule {
    providers: DashMap<String, PerformanceStats>,
    categories: DashMap<(String, TaskCategory), PerformanceStats>,
    config: LearningConfig,
}

impl LearningModule {
    pub fn new(config: LearningConfig) -> Self {
        Self {
            providers: DashMap::new(),
            categories: DashMap::new(),
            config,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Fold one outcome into the learned statistics
    pub fn learn(&self, sample: &LearningSample, outcome: Outcome) {
        if !self.config.enabled {
            return;
        }

        self.providers
            .entry(sample.provider.clone())
            .or_default()
            .update(sample, outcome, &self.config);

        self.categories
            .entry((sample.provider.clone(), sample.category))
            .or_default()
            .update(sample, outcome, &self.config);

        tracing::debug!(
            provider = %sample.provider,
            category = %sample.category,
            ?outcome,
            "learned from provider outcome"
        );
    }

    pub fn provider(&self, provider: &str) -> Option<PerformanceStats> {
        self.providers.get(provider).map(|s| s.clone())
    }

    /// Copy of everything learned so far, ordered for stable output
    pub fn snapshot(&self) -> LearningSnapshot {
        let providers = self
            .providers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut categories: Vec<CategoryPerformance> = self
            .categories
            .iter()
            .map(|entry| CategoryPerformance {
                provider: entry.key().0.clone(),
                category: entry.key().1,
                stats: entry.value().clone(),
            })
            .collect();
        categories.sort_by(|a, b| a.provider.cmp(&b.provider).then(a.category.cmp(&b.category)));

        LearningSnapshot { providers, categories }
    }

    /// Forget everything learned
    pub fn reset(&self) {
        self.providers.clear();
        self.categories.clear();
        tracing::info!("learned provider statistics reset");
    }

    /// Replace learned statistics with a snapshot
    pub fn import(&self, snapshot: &LearningSnapshot) {
        self.reset();

        for (provider, stats) in &snapshot.providers {
            self.providers.insert(provider.clone(), stats.clone());
        }
        for entry in &snapshot.categories {
            self.categories
                .insert((entry.provider.clone(), entry.category), entry.stats.clone());
        }
    }
}
