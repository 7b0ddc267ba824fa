use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use switchyard_health::CircuitState;

use crate::options::RiskTolerance;
use crate::scoring::ProviderScore;

/// Floor added to every weight so zero-scored candidates stay reachable
const MIN_PICK_WEIGHT: f64 = 1e-6;

/// Primary provider plus ordered fallbacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub primary: String,
    pub fallbacks: Vec<String>,
    /// Whether the primary was chosen by exploration rather than rank
    pub explored: bool,
}

impl Selection {
    /// Primary followed by fallbacks
    pub fn chain(&self) -> Vec<String> {
        std::iter::once(self.primary.clone())
            .chain(self.fallbacks.iter().cloned())
            .collect()
    }
}

/// Epsilon-greedy provider selection
pub struct Selector {
    rng: Mutex<StdRng>,
    exploration_rate: f64,
    fallback_depth: usize,
}

impl Selector {
    pub fn new(exploration_rate: f64, fallback_depth: usize) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
            exploration_rate,
            fallback_depth,
        }
    }

    /// Deterministic selector for reproducible runs
    pub fn with_seed(exploration_rate: f64, fallback_depth: usize, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            exploration_rate,
            fallback_depth,
        }
    }

    /// Pick a primary and fallbacks from ranked scores
    ///
    /// Exploitation takes the best provider whose circuit is not open.
    /// Exploration draws among the same candidates with probability
    /// proportional to score. Fallbacks are every other scored provider in
    /// rank order, open circuits included so the attempt log shows them as
    /// skipped. Returns `None` for empty input.
    pub fn select(&self, scores: &[ProviderScore], risk: RiskTolerance) -> Option<Selection> {
        let top = scores.first()?;

        let available: Vec<&ProviderScore> = scores.iter().filter(|s| s.circuit != CircuitState::Open).collect();
        let best = available.first().copied().unwrap_or(top);

        let rate = risk.exploration_rate(self.exploration_rate);
        let mut explored = false;
        let mut primary = best;

        if rate > 0.0 && available.len() > 1 {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            if rng.random::<f64>() < rate {
                primary = weighted_pick(&mut *rng, &available);
                explored = primary.provider != best.provider;
            }
        }

        let fallbacks = scores
            .iter()
            .filter(|s| s.provider != primary.provider)
            .take(self.fallback_depth)
            .map(|s| s.provider.clone())
            .collect();

        Some(Selection {
            primary: primary.provider.clone(),
            fallbacks,
            explored,
        })
    }
}

fn weighted_pick<'a>(rng: &mut impl Rng, candidates: &[&'a ProviderScore]) -> &'a ProviderScore {
    let weights: Vec<f64> = candidates.iter().map(|s| s.total.max(0.0) + MIN_PICK_WEIGHT).collect();
    let mut remaining = rng.random::<f64>() * weights.iter().sum::<f64>();

    for (candidate, weight) in candidates.iter().zip(&weights) {
        if remaining < *weight {
            return *candidate;
        }
        remaining -= weight;
    }

    // Rounding can leave a sliver past the last weight
    candidates[candidates.len() - 1]
}
