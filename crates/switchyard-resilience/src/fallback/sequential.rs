use std::future::Future;

use switchyard_core::ProviderError;

use super::{ChainRun, FallbackOrchestrator, Step};
use crate::retry::RetryPolicy;

impl FallbackOrchestrator {
    /// Try providers one at a time in the given order
    ///
    /// Open circuits are skipped first. With `proactive` set, closed
    /// circuits the cascade rules flag are skipped too, without being called.
    pub(super) async fn run_in_order<T, F, Fut>(
        &self,
        order: Vec<String>,
        proactive: bool,
        policy: &RetryPolicy,
        op: &F,
        run: &mut ChainRun,
    ) -> Step<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        for (index, provider) in order.into_iter().enumerate() {
            let position = u32::try_from(index + 1).unwrap_or(u32::MAX);

            let admission = match self.admit(&provider, position) {
                Ok(admission) => admission,
                Err(skipped) => {
                    run.attempts.push(skipped);
                    continue;
                }
            };

            // A half-open trial call must go out regardless of the failure streak
            if proactive
                && !admission.is_probe()
                && let Some(skipped) = self.proactive_skip(&provider, position)
            {
                drop(admission);
                run.attempts.push(skipped);
                continue;
            }

            let (attempt, result) = self.call(&provider, position, admission, policy, op).await;
            run.attempts.push(attempt);

            match result {
                Ok(value) => return Step::Succeeded(provider, value),
                Err(error) if error.kind.is_request_fault() => return Step::Rejected(provider, error),
                Err(error) => run.last_error = Some(error),
            }
        }

        Step::Exhausted
    }
}
