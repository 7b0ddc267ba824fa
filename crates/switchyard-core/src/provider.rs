//! Provider adapter contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::category::TaskCategory;
use crate::error::ProviderError;
use crate::types::{CompletionRequest, CompletionResponse};

/// Optional features a provider may support
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Features {
    /// Streaming responses
    #[serde(default)]
    pub streaming: bool,
    /// Tool/function calling
    #[serde(default)]
    pub tool_calling: bool,
    /// Image inputs
    #[serde(default)]
    pub vision: bool,
}

/// Token pricing for a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    /// Cost per million input tokens (USD)
    pub input_per_mtok: f64,
    /// Cost per million output tokens (USD)
    pub output_per_mtok: f64,
}

impl Pricing {
    /// Estimate the cost of a request with the given token counts
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input_per_mtok;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output_per_mtok;
        input_cost + output_cost
    }
}

/// Static-ish metadata describing what a provider can do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Context window in tokens
    pub context_window: u32,
    /// Supported features
    #[serde(default)]
    pub features: Features,
    /// Nominal latency for a typical request (milliseconds)
    pub nominal_latency_ms: u64,
    /// Base quality score (0.0 to 1.0)
    pub quality: f64,
    /// Categories this provider is particularly good at
    #[serde(default)]
    pub specializations: Vec<TaskCategory>,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            context_window: 128_000,
            features: Features::default(),
            nominal_latency_ms: 2_000,
            quality: 0.7,
            specializations: Vec::new(),
        }
    }
}

/// Trait implemented by each backend adapter
///
/// The engine only ever calls `execute` with a normalized request; wire
/// format translation is entirely the adapter's concern.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique provider name
    fn name(&self) -> &str;

    /// Advertised capabilities
    fn capabilities(&self) -> ProviderCapabilities;

    /// Token pricing
    fn pricing(&self) -> Pricing;

    /// Whether the adapter is correctly configured and usable
    fn validate(&self) -> bool {
        true
    }

    /// Execute one normalized request against the backend
    async fn execute(&self, request: &CompletionRequest) -> Result<CompletionResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_cost() {
        let pricing = Pricing {
            input_per_mtok: 0.15,
            output_per_mtok: 0.60,
        };
        let cost = pricing.estimate_cost(1_000_000, 500_000);
        // 1M * 0.15/1M + 0.5M * 0.60/1M = 0.15 + 0.30 = 0.45
        assert!((cost - 0.45).abs() < 0.001);
    }
}
