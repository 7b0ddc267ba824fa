use std::cmp::Ordering;

use super::FallbackOrchestrator;

/// Weight of recent success rate in the adaptive order
const SUCCESS_WEIGHT: f64 = 0.7;
/// Weight of relative speed in the adaptive order
const SPEED_WEIGHT: f64 = 0.3;
/// Score for providers with no recorded attempts
const UNKNOWN_SCORE: f64 = 0.5;

impl FallbackOrchestrator {
    /// Chain reordered by recent success rate and speed from attempt history
    ///
    /// Speed is relative to the slowest provider in the chain. Providers
    /// without history score as neutral; ties keep chain order.
    pub(super) fn adaptive_order(&self, providers: &[String]) -> Vec<String> {
        let stats = self.history.stats();
        let slowest = providers
            .iter()
            .filter_map(|p| stats.get(p))
            .map(|s| s.average_duration_ms)
            .fold(0.0, f64::max);

        let mut scored: Vec<(f64, &String)> = providers
            .iter()
            .map(|p| {
                let score = stats.get(p).map_or(UNKNOWN_SCORE, |s| {
                    let speed = if slowest > 0.0 {
                        1.0 - s.average_duration_ms / slowest
                    } else {
                        1.0
                    };
                    SUCCESS_WEIGHT.mul_add(s.success_rate, SPEED_WEIGHT * speed)
                });
                (score, p)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.into_iter().map(|(_, p)| p.clone()).collect()
    }
}
