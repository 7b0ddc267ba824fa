//! Exponential backoff around a single provider
//!
//! Each try runs under a hard deadline. Retryable failures back off as
//! `initial * multiplier^(n - 2)` before try `n`, jittered by ±25% and
//! capped at the configured maximum. A provider `retry_after` hint raises
//! the delay but never past the cap.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use rand::Rng;
use switchyard_config::RetryConfig;
use switchyard_core::ProviderError;

/// Lower bound of the jitter factor
const JITTER_MIN: f64 = 0.75;
/// Upper bound of the jitter factor
const JITTER_MAX: f64 = 1.25;

/// What the observer sees after every try
#[derive(Debug)]
pub struct TryReport<'a> {
    pub provider: &'a str,
    /// 1-based try number within this invocation
    pub try_number: u32,
    pub duration: Duration,
    /// Failure of this try, `None` on success
    pub error: Option<&'a ProviderError>,
}

/// Final result of a retried invocation
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, ProviderError>,
    /// Tries actually made
    pub tries: u32,
    /// Wall time including back-off sleeps
    pub elapsed: Duration,
}

/// Retry policy for one provider invocation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Same policy with a different per-try deadline
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.config.attempt_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Delay before try `try_number` for a given jitter factor
    ///
    /// Returns zero for the first try. `jitter` is clamped into
    /// `[0.75, 1.25]`.
    pub fn backoff(&self, try_number: u32, jitter: f64, retry_after: Option<Duration>) -> Duration {
        if try_number < 2 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(try_number - 2).unwrap_or(i32::MAX);
        let base_ms = self.config.initial_delay_ms as f64 * self.config.multiplier.powi(exponent);
        let jittered_ms = base_ms * jitter.clamp(JITTER_MIN, JITTER_MAX);
        let max_ms = self.config.max_delay_ms as f64;

        let mut delay = Duration::from_micros((jittered_ms.min(max_ms).max(0.0) * 1000.0).round() as u64);
        if let Some(hint) = retry_after {
            delay = delay.max(hint);
        }
        delay.min(self.config.max_delay())
    }

    fn delay_for(&self, try_number: u32, retry_after: Option<Duration>) -> Duration {
        let jitter = if self.config.jitter {
            rand::rng().random_range(JITTER_MIN..=JITTER_MAX)
        } else {
            1.0
        };
        self.backoff(try_number, jitter, retry_after)
    }

    /// Run `op` until it succeeds, fails non-retryably, or tries run out
    ///
    /// `observer` is called after every try. Returning `Break` stops
    /// further retries, e.g. when the provider's circuit opened.
    pub async fn execute<T, F, Fut, O>(&self, provider: &str, mut op: F, mut observer: O) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
        O: FnMut(&TryReport<'_>) -> ControlFlow<()>,
    {
        let started = Instant::now();
        let deadline = self.config.attempt_timeout();
        let max_tries = self.config.max_attempts.max(1);
        let mut try_number = 0;

        loop {
            try_number += 1;
            let try_started = Instant::now();
            let result = tokio::time::timeout(deadline, op())
                .await
                .unwrap_or_else(|_| Err(ProviderError::timeout(deadline)));

            let flow = observer(&TryReport {
                provider,
                try_number,
                duration: try_started.elapsed(),
                error: result.as_ref().err(),
            });

            let error = match result {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        tries: try_number,
                        elapsed: started.elapsed(),
                    };
                }
                Err(error) => error,
            };

            if !error.is_retryable() || try_number >= max_tries || flow.is_break() {
                tracing::debug!(
                    provider,
                    tries = try_number,
                    kind = %error.kind,
                    "giving up on provider"
                );
                return RetryOutcome {
                    result: Err(error),
                    tries: try_number,
                    elapsed: started.elapsed(),
                };
            }

            let delay = self.delay_for(try_number + 1, error.retry_after);
            tracing::debug!(
                provider,
                try_number,
                kind = %error.kind,
                delay_ms = delay.as_millis() as u64,
                "retrying provider after backoff"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use switchyard_core::ErrorKind;

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 2.0,
            jitter: true,
            attempt_timeout_ms: 5_000,
        })
    }

    #[test]
    fn backoff_grows_exponentially() {
        let policy = policy();
        assert_eq!(policy.backoff(1, 1.0, None), Duration::ZERO);
        assert_eq!(policy.backoff(2, 1.0, None), Duration::from_millis(100));
        assert_eq!(policy.backoff(3, 1.0, None), Duration::from_millis(200));
        assert_eq!(policy.backoff(4, 1.0, None), Duration::from_millis(400));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = policy();
        assert_eq!(policy.backoff(10, 1.25, None), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_in_band() {
        let policy = policy();
        assert_eq!(policy.backoff(3, 0.75, None), Duration::from_millis(150));
        assert_eq!(policy.backoff(3, 1.25, None), Duration::from_millis(250));
        // Out-of-band factors are clamped
        assert_eq!(policy.backoff(3, 3.0, None), Duration::from_millis(250));

        for try_number in 2..8 {
            let delay = policy.delay_for(try_number, None);
            assert!(delay <= Duration::from_secs(1));
            assert!(delay >= policy.backoff(try_number, 0.75, None));
        }
    }

    #[test]
    fn retry_after_raises_but_respects_cap() {
        let policy = policy();
        assert_eq!(
            policy.backoff(2, 1.0, Some(Duration::from_millis(600))),
            Duration::from_millis(600)
        );
        assert_eq!(
            policy.backoff(2, 1.0, Some(Duration::from_secs(30))),
            Duration::from_secs(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = &AtomicU32::new(0);
        let mut reports = Vec::new();

        let outcome = policy()
            .execute(
                "a",
                || async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ProviderError::new(ErrorKind::Server, "overloaded"))
                    } else {
                        Ok("done")
                    }
                },
                |report| {
                    reports.push((report.try_number, report.error.map(|e| e.kind)));
                    ControlFlow::Continue(())
                },
            )
            .await;

        assert_eq!(outcome.result.unwrap(), "done");
        assert_eq!(outcome.tries, 3);
        assert_eq!(
            reports,
            [(1, Some(ErrorKind::Server)), (2, Some(ErrorKind::Server)), (3, None)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_fails_immediately() {
        let calls = &AtomicU32::new(0);

        let outcome: RetryOutcome<()> = policy()
            .execute(
                "a",
                || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::new(ErrorKind::Auth, "bad api key"))
                },
                |_| ControlFlow::Continue(()),
            )
            .await;

        assert_eq!(outcome.result.unwrap_err().kind, ErrorKind::Auth);
        assert_eq!(outcome.tries, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_attempts() {
        let outcome: RetryOutcome<()> = policy()
            .execute(
                "a",
                || async { Err(ProviderError::new(ErrorKind::Network, "connection reset")) },
                |_| ControlFlow::Continue(()),
            )
            .await;

        assert_eq!(outcome.tries, 3);
        // Two sleeps of at least 75ms and 150ms
        assert!(outcome.elapsed >= Duration::from_millis(225));
    }

    #[tokio::test(start_paused = true)]
    async fn observer_break_stops_retrying() {
        let outcome: RetryOutcome<()> = policy()
            .execute(
                "a",
                || async { Err(ProviderError::new(ErrorKind::Server, "unavailable")) },
                |_| ControlFlow::Break(()),
            )
            .await;

        assert_eq!(outcome.tries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_try_times_out() {
        let policy = policy().with_attempt_timeout(Duration::from_millis(50));

        let outcome: RetryOutcome<()> = policy
            .execute(
                "slow",
                || async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(())
                },
                |report| {
                    assert_eq!(report.error.map(|e| e.kind), Some(ErrorKind::Timeout));
                    ControlFlow::Continue(())
                },
            )
            .await;

        assert_eq!(outcome.result.unwrap_err().kind, ErrorKind::Timeout);
        assert_eq!(outcome.tries, 3);
    }
}
