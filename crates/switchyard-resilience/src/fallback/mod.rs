//! Fallback chain execution
//!
//! A chain is an ordered list of providers executed under one of four
//! strategies:
//! - **Sequential**: strictly in order, first success wins
//! - **Parallel**: race the first admitted providers, cancel the losers
//! - **Cascade**: health-score order, proactively skipping unhealthy providers
//! - **Adaptive**: recent success rate and speed order, then cascade rules
//!
//! Every try is recorded into the health tracker, and every provider
//! invocation or skip produces one [`ExecutionAttempt`].

mod adaptive;
mod cascade;
mod parallel;
mod sequential;

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use switchyard_config::{FallbackConfig, FallbackStrategy, RetryConfig};
use switchyard_core::{ProviderError, now_millis};
use switchyard_health::{Admission, HealthTracker};

use crate::attempt::{AttemptHistory, ExecutionAttempt, SkipReason};
use crate::error::ExecutionError;
use crate::retry::RetryPolicy;

/// Ordered providers plus how to execute them
#[derive(Debug, Clone)]
pub struct FallbackChain {
    pub providers: Vec<String>,
    pub strategy: FallbackStrategy,
    /// Providers raced at once by the parallel strategy
    pub parallel_attempts: usize,
    /// Overrides the retry policy's per-try deadline
    pub attempt_timeout: Option<Duration>,
    /// Overrides the orchestrator's retry policy
    pub retry: Option<RetryConfig>,
}

impl FallbackChain {
    pub fn new(providers: Vec<String>) -> Self {
        Self {
            providers,
            strategy: FallbackStrategy::default(),
            parallel_attempts: 2,
            attempt_timeout: None,
            retry: None,
        }
    }

    #[must_use]
    pub const fn with_strategy(mut self, strategy: FallbackStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub const fn with_parallel_attempts(mut self, parallel_attempts: usize) -> Self {
        self.parallel_attempts = parallel_attempts;
        self
    }

    #[must_use]
    pub const fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// Summary numbers for one chain execution
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FallbackMetrics {
    /// Providers actually invoked
    pub attempted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub average_attempt_ms: f64,
    pub total_ms: u64,
}

impl FallbackMetrics {
    fn from_attempts(attempts: &[ExecutionAttempt], elapsed: Duration) -> Self {
        let invoked: Vec<&ExecutionAttempt> = attempts.iter().filter(|a| !a.is_skipped()).collect();
        let average_attempt_ms = if invoked.is_empty() {
            0.0
        } else {
            invoked.iter().map(|a| a.duration_ms as f64).sum::<f64>() / invoked.len() as f64
        };

        Self {
            attempted: invoked.len(),
            skipped: attempts.len() - invoked.len(),
            failed: invoked.iter().filter(|a| !a.success).count(),
            average_attempt_ms,
            total_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Successful chain execution
#[derive(Debug)]
pub struct FallbackResult<T> {
    pub value: T,
    /// Provider that produced the value
    pub provider: String,
    pub strategy: FallbackStrategy,
    /// Every invocation and skip, in the order they concluded
    pub attempts: Vec<ExecutionAttempt>,
    pub metrics: FallbackMetrics,
}

/// Attempts and last error accumulated while running a chain
#[derive(Debug, Default)]
struct ChainRun {
    attempts: Vec<ExecutionAttempt>,
    last_error: Option<ProviderError>,
}

/// How a strategy finished
enum Step<T> {
    Succeeded(String, T),
    Exhausted,
    Rejected(String, ProviderError),
}

/// Execute fallback chains against providers
pub struct FallbackOrchestrator {
    health: Arc<HealthTracker>,
    history: Arc<AttemptHistory>,
    retry: RetryPolicy,
    config: FallbackConfig,
}

impl FallbackOrchestrator {
    pub fn new(health: Arc<HealthTracker>, retry: RetryConfig, config: FallbackConfig) -> Self {
        let history = Arc::new(AttemptHistory::new(config.history_size, config.history_retention()));
        Self {
            health,
            history,
            retry: RetryPolicy::new(retry),
            config,
        }
    }

    pub const fn history(&self) -> &Arc<AttemptHistory> {
        &self.history
    }

    pub const fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// Chain over `providers` with the configured defaults
    pub fn chain(&self, providers: Vec<String>) -> FallbackChain {
        FallbackChain::new(providers)
            .with_strategy(self.config.strategy)
            .with_parallel_attempts(self.config.parallel_attempts)
    }

    /// Run `op` against the chain until a provider succeeds
    ///
    /// `op` receives the provider name and performs one try. Validation
    /// failures end the chain immediately.
    pub async fn execute<T, F, Fut>(&self, chain: &FallbackChain, op: F) -> Result<FallbackResult<T>, ExecutionError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        if chain.providers.is_empty() {
            return Err(ExecutionError::EmptyChain);
        }

        let started = Instant::now();
        let mut policy = chain
            .retry
            .clone()
            .map_or_else(|| self.retry.clone(), RetryPolicy::new);
        if let Some(timeout) = chain.attempt_timeout {
            policy = policy.with_attempt_timeout(timeout);
        }

        let mut run = ChainRun::default();
        let step = match chain.strategy {
            FallbackStrategy::Sequential => {
                self.run_in_order(chain.providers.clone(), false, &policy, &op, &mut run)
                    .await
            }
            FallbackStrategy::Parallel => self.run_parallel(chain, &policy, &op, &mut run).await,
            FallbackStrategy::Cascade => {
                let order = self.cascade_order(&chain.providers);
                self.run_in_order(order, true, &policy, &op, &mut run).await
            }
            FallbackStrategy::Adaptive => {
                let order = self.adaptive_order(&chain.providers);
                self.run_in_order(order, true, &policy, &op, &mut run).await
            }
        };

        self.history.extend(run.attempts.iter().cloned());
        let metrics = FallbackMetrics::from_attempts(&run.attempts, started.elapsed());

        match step {
            Step::Succeeded(provider, value) => {
                tracing::info!(
                    provider = %provider,
                    strategy = ?chain.strategy,
                    attempted = metrics.attempted,
                    skipped = metrics.skipped,
                    total_ms = metrics.total_ms,
                    "fallback chain succeeded"
                );
                Ok(FallbackResult {
                    value,
                    provider,
                    strategy: chain.strategy,
                    attempts: run.attempts,
                    metrics,
                })
            }
            Step::Rejected(provider, source) => {
                tracing::warn!(
                    provider = %provider,
                    error = %source,
                    "request rejected, ending fallback chain"
                );
                Err(ExecutionError::Rejected {
                    provider,
                    attempts: run.attempts,
                    source,
                })
            }
            Step::Exhausted => {
                tracing::error!(
                    strategy = ?chain.strategy,
                    attempted = metrics.attempted,
                    skipped = metrics.skipped,
                    providers = ?chain.providers,
                    "fallback chain exhausted"
                );
                Err(ExecutionError::Exhausted {
                    attempts: run.attempts,
                    last_error: run.last_error,
                })
            }
        }
    }

    /// Acquire admission or produce the skip record
    fn admit(&self, provider: &str, position: u32) -> Result<Admission, ExecutionAttempt> {
        self.health.admit(provider).ok_or_else(|| {
            tracing::debug!(provider, "circuit open, skipping provider");
            ExecutionAttempt::skipped(provider, position, SkipReason::CircuitOpen)
        })
    }

    /// Invoke one provider under the retry policy, recording every try
    async fn call<T, F, Fut>(
        &self,
        provider: &str,
        position: u32,
        admission: Admission,
        policy: &RetryPolicy,
        op: &F,
    ) -> (ExecutionAttempt, Result<T, ProviderError>)
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let started_at_ms = now_millis();
        let outcome = policy
            .execute(
                provider,
                || op(provider.to_owned()),
                |report| {
                    match report.error {
                        None => self.health.record_success(provider, report.duration),
                        Some(error) => self.health.record_failure(provider, error.kind, report.duration),
                    }
                    if self.health.is_open(provider) {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                },
            )
            .await;
        drop(admission);

        let error = outcome.result.as_ref().err();
        if let Some(error) = error {
            tracing::warn!(
                provider,
                position,
                tries = outcome.tries,
                kind = %error.kind,
                error = %error.message,
                "provider attempt failed"
            );
        }

        let attempt = ExecutionAttempt {
            provider: provider.to_owned(),
            position,
            tries: outcome.tries,
            started_at_ms,
            duration_ms: u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
            success: error.is_none(),
            error_kind: error.map(|e| e.kind),
            error: error.map(|e| e.message.clone()),
            skip_reason: None,
        };

        (attempt, outcome.result)
    }
}
