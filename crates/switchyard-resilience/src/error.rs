use switchyard_core::ProviderError;
use thiserror::Error;

use crate::attempt::ExecutionAttempt;

/// Errors from executing a fallback chain
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Chain contained no providers
    #[error("fallback chain is empty")]
    EmptyChain,

    /// Every provider in the chain failed or was skipped
    #[error("all providers failed after {} attempts", .attempts.len())]
    Exhausted {
        attempts: Vec<ExecutionAttempt>,
        /// Last error returned by a provider, absent when every one was skipped
        last_error: Option<ProviderError>,
    },

    /// Request itself was rejected; other providers would reject it too
    #[error("request rejected by {provider}: {source}")]
    Rejected {
        provider: String,
        attempts: Vec<ExecutionAttempt>,
        #[source]
        source: ProviderError,
    },
}

impl ExecutionError {
    /// Attempts made before the chain gave up
    pub fn attempts(&self) -> &[ExecutionAttempt] {
        match self {
            Self::EmptyChain => &[],
            Self::Exhausted { attempts, .. } | Self::Rejected { attempts, .. } => attempts,
        }
    }
}
