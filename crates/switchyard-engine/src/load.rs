//! In-flight request counts per provider

use std::collections::HashMap;

use dashmap::DashMap;

/// Counts invocations currently running against each provider
///
/// Read by scoring to penalize busy providers.
#[derive(Debug, Default)]
pub struct LoadTracker {
    in_flight: DashMap<String, u32>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one invocation until the returned guard is dropped
    pub fn begin(&self, provider: &str) -> LoadGuard<'_> {
        *self.in_flight.entry(provider.to_owned()).or_default() += 1;
        LoadGuard {
            tracker: self,
            provider: provider.to_owned(),
        }
    }

    pub fn in_flight(&self, provider: &str) -> u32 {
        self.in_flight.get(provider).map_or(0, |count| *count)
    }

    /// Non-zero counts by provider
    pub fn snapshot(&self) -> HashMap<String, u32> {
        self.in_flight
            .iter()
            .filter(|entry| *entry.value() > 0)
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    fn end(&self, provider: &str) {
        if let Some(mut count) = self.in_flight.get_mut(provider) {
            *count = count.saturating_sub(1);
        }
    }
}

/// Decrements the provider's count on drop
#[derive(Debug)]
pub struct LoadGuard<'a> {
    tracker: &'a LoadTracker,
    provider: String,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.tracker.end(&self.provider);
    }
}
