//! Scripted in-process provider
//!
//! Plays back a queue of outcomes, then repeats a default outcome. Counts
//! calls as they start and as they complete, so cancelled racers are
//! visible.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use switchyard_core::{
    CompletionRequest, CompletionResponse, ErrorKind, Pricing, Provider, ProviderCapabilities, ProviderError, Usage,
};

/// Mock provider with canned outcomes
pub struct MockProvider {
    name: String,
    /// Upcoming outcomes, `None` meaning success
    script: Mutex<VecDeque<Option<ErrorKind>>>,
    /// Outcome once the script runs out
    default_failure: Option<ErrorKind>,
    delay: Duration,
    calls: AtomicU32,
    completed: AtomicU32,
}

impl MockProvider {
    /// Provider that always succeeds
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            script: Mutex::new(VecDeque::new()),
            default_failure: None,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            completed: AtomicU32::new(0),
        }
    }

    /// Fail every call not covered by the script
    pub const fn failing(mut self, kind: ErrorKind) -> Self {
        self.default_failure = Some(kind);
        self
    }

    /// Play these outcomes first
    pub fn script(self, outcomes: impl IntoIterator<Item = Option<ErrorKind>>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(outcomes);
        self
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Calls started
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that ran to completion
    pub fn completed(&self) -> u32 {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }

    fn pricing(&self) -> Pricing {
        Pricing::default()
    }

    async fn execute(&self, _request: &CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(self.default_failure);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Some(kind) => Err(ProviderError::new(kind, format!("{} scripted {kind}", self.name))),
            None => Ok(CompletionResponse {
                provider: self.name.clone(),
                model: format!("{}-model", self.name),
                content: format!("Hello from {}", self.name),
                usage: Usage {
                    input_tokens: 1_000,
                    output_tokens: 1_000,
                },
                quality: Some(0.8),
            }),
        }
    }
}
