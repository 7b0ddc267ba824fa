use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use switchyard_core::ProviderError;

use super::{ChainRun, FallbackChain, FallbackOrchestrator, Step};
use crate::retry::RetryPolicy;

impl FallbackOrchestrator {
    /// Race the first admitted providers; the first success wins
    ///
    /// Losers are cancelled by dropping their futures, which also releases
    /// any half-open probe slots they held. Providers past the fan-out are
    /// not tried.
    pub(super) async fn run_parallel<T, F, Fut>(
        &self,
        chain: &FallbackChain,
        policy: &RetryPolicy,
        op: &F,
        run: &mut ChainRun,
    ) -> Step<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let fan_out = chain.parallel_attempts.max(1);
        let mut racers = FuturesUnordered::new();

        for (index, provider) in chain.providers.iter().enumerate() {
            if racers.len() >= fan_out {
                break;
            }

            let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
            match self.admit(provider, position) {
                Ok(admission) => racers.push(async move {
                    let (attempt, result) = self.call(provider, position, admission, policy, op).await;
                    (provider, attempt, result)
                }),
                Err(skipped) => run.attempts.push(skipped),
            }
        }

        tracing::debug!(racers = racers.len(), "racing providers");

        while let Some((provider, attempt, result)) = racers.next().await {
            run.attempts.push(attempt);
            match result {
                Ok(value) => {
                    if !racers.is_empty() {
                        tracing::debug!(
                            winner = %provider,
                            cancelled = racers.len(),
                            "cancelling slower providers"
                        );
                    }
                    return Step::Succeeded(provider.clone(), value);
                }
                Err(error) => run.last_error = Some(error),
            }
        }

        Step::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use switchyard_config::FallbackStrategy;
    use switchyard_core::ErrorKind;

    use super::super::FallbackChain;
    use super::super::test_support::{Behavior, Script, names, no_retry, orchestrator};
    use crate::ExecutionError;

    fn chain(providers: &[&str], fan_out: usize) -> FallbackChain {
        FallbackChain::new(names(providers))
            .with_strategy(FallbackStrategy::Parallel)
            .with_parallel_attempts(fan_out)
    }

    #[tokio::test(start_paused = true)]
    async fn fastest_success_wins() {
        let orchestrator = orchestrator(no_retry());
        let script = Script::new(&[("slow", Behavior::Slow(5_000)), ("fast", Behavior::Slow(50))]);

        let result = orchestrator
            .execute(&chain(&["slow", "fast"], 2), |p| script.run(p))
            .await
            .unwrap();

        assert_eq!(result.provider, "fast");
        // The slow racer was cancelled and left no attempt behind
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(script.calls("slow"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn success_beats_earlier_failure() {
        let orchestrator = orchestrator(no_retry());
        let script = Script::new(&[("a", Behavior::Fail(ErrorKind::Server)), ("b", Behavior::Slow(100))]);

        let result = orchestrator
            .execute(&chain(&["a", "b"], 2), |p| script.run(p))
            .await
            .unwrap();

        assert_eq!(result.provider, "b");
        assert_eq!(result.metrics.failed, 1);
    }

    #[tokio::test]
    async fn fan_out_limits_racers() {
        let orchestrator = orchestrator(no_retry());
        let script = Script::new(&[
            ("a", Behavior::Fail(ErrorKind::Server)),
            ("b", Behavior::Fail(ErrorKind::Server)),
        ]);

        let err = orchestrator
            .execute(&chain(&["a", "b", "c"], 2), |p| script.run(p))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::Exhausted { .. }));
        assert_eq!(err.attempts().len(), 2);
        assert_eq!(script.calls("c"), 0);
        assert_eq!(script.total.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn open_circuit_does_not_take_a_slot() {
        let orchestrator = orchestrator(no_retry());
        for _ in 0..5 {
            orchestrator
                .health
                .record_failure("a", ErrorKind::Server, std::time::Duration::from_millis(5));
        }
        let script = Script::new(&[("b", Behavior::Fail(ErrorKind::Server))]);

        let result = orchestrator
            .execute(&chain(&["a", "b", "c"], 2), |p| script.run(p))
            .await
            .unwrap();

        assert_eq!(result.provider, "c");
        assert_eq!(script.calls("a"), 0);
        assert!(result.attempts[0].is_skipped());
    }
}
