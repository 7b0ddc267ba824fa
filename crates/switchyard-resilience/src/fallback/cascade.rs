use std::cmp::Ordering;

use super::FallbackOrchestrator;
use crate::attempt::{ExecutionAttempt, SkipReason};

impl FallbackOrchestrator {
    /// Chain reordered by health score, best first; ties keep chain order
    pub(super) fn cascade_order(&self, providers: &[String]) -> Vec<String> {
        let mut scored: Vec<(f64, &String)> = providers
            .iter()
            .map(|p| (self.health.health_score(p), p))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.into_iter().map(|(_, p)| p.clone()).collect()
    }

    /// Skip record when a provider is too unhealthy to be worth a try
    pub(super) fn proactive_skip(&self, provider: &str, position: u32) -> Option<ExecutionAttempt> {
        let reason = if self.health.recently_rate_limited(provider) {
            SkipReason::RateLimitedRecently
        } else if self.health.consecutive_failures(provider) >= self.config.cascade_skip_consecutive_failures {
            SkipReason::ConsecutiveFailures
        } else {
            return None;
        };

        tracing::debug!(provider, %reason, "cascade skipping provider");
        Some(ExecutionAttempt::skipped(provider, position, reason))
    }
}
