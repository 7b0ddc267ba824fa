use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchyard_core::{ErrorKind, now_millis};

/// Why a provider in a chain was passed over without being called
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// Circuit open, or half-open with every probe slot taken
    CircuitOpen,
    /// Rate limited within the avoidance window
    RateLimitedRecently,
    /// Too many consecutive failures to be worth a try
    ConsecutiveFailures,
}

/// One provider invocation within a fallback chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    pub provider: String,
    /// 1-based position within the executed chain
    pub position: u32,
    /// Tries made, zero when skipped
    pub tries: u32,
    pub started_at_ms: u64,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

impl ExecutionAttempt {
    pub fn skipped(provider: &str, position: u32, reason: SkipReason) -> Self {
        Self {
            provider: provider.to_owned(),
            position,
            tries: 0,
            started_at_ms: now_millis(),
            duration_ms: 0,
            success: false,
            error_kind: None,
            error: None,
            skip_reason: Some(reason),
        }
    }

    pub const fn is_skipped(&self) -> bool {
        self.skip_reason.is_some()
    }
}

/// Aggregated history of one provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptStats {
    /// Invocations actually made
    pub attempts: usize,
    pub success_rate: f64,
    pub average_duration_ms: f64,
}

/// Bounded, time-trimmed log of recent attempts
#[derive(Debug)]
pub struct AttemptHistory {
    attempts: Mutex<VecDeque<ExecutionAttempt>>,
    capacity: usize,
    retention: Duration,
}

impl AttemptHistory {
    pub fn new(capacity: usize, retention: Duration) -> Self {
        Self {
            attempts: Mutex::new(VecDeque::with_capacity(capacity.min(1_024))),
            capacity,
            retention,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ExecutionAttempt>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, attempt: ExecutionAttempt) {
        let mut attempts = self.lock();
        attempts.push_back(attempt);
        while attempts.len() > self.capacity {
            attempts.pop_front();
        }
    }

    pub fn extend(&self, batch: impl IntoIterator<Item = ExecutionAttempt>) {
        for attempt in batch {
            self.record(attempt);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Most recent `limit` attempts, oldest first
    pub fn recent(&self, limit: usize) -> Vec<ExecutionAttempt> {
        let attempts = self.lock();
        let skip = attempts.len().saturating_sub(limit);
        attempts.iter().skip(skip).cloned().collect()
    }

    /// Drop attempts older than the retention window, returning how many went
    pub fn trim(&self) -> usize {
        let cutoff = now_millis().saturating_sub(u64::try_from(self.retention.as_millis()).unwrap_or(u64::MAX));
        let mut attempts = self.lock();
        let before = attempts.len();
        attempts.retain(|a| a.started_at_ms >= cutoff);
        before - attempts.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Per-provider aggregates over attempts that were actually made
    pub fn stats(&self) -> HashMap<String, AttemptStats> {
        let mut totals: HashMap<String, (usize, usize, u64)> = HashMap::new();
        for attempt in self.lock().iter().filter(|a| !a.is_skipped()) {
            let entry = totals.entry(attempt.provider.clone()).or_default();
            entry.0 += 1;
            entry.1 += usize::from(attempt.success);
            entry.2 += attempt.duration_ms;
        }

        totals
            .into_iter()
            .map(|(provider, (attempts, successes, duration))| {
                let stats = AttemptStats {
                    attempts,
                    success_rate: successes as f64 / attempts as f64,
                    average_duration_ms: duration as f64 / attempts as f64,
                };
                (provider, stats)
            })
            .collect()
    }
}
