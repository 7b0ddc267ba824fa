use serde::Deserialize;
use switchyard_core::{ErrorKind, Features, Pricing, ProviderCapabilities, TaskCategory};

/// Provider registration metadata
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Whether the provider participates in routing
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Context window in tokens
    #[serde(default = "default_context_window")]
    pub context_window: u32,
    /// Cost per million input tokens (USD)
    pub input_per_mtok: f64,
    /// Cost per million output tokens (USD)
    pub output_per_mtok: f64,
    /// Base quality score (0.0 to 1.0)
    #[serde(default = "default_quality")]
    pub quality: f64,
    /// Nominal latency in milliseconds
    #[serde(default = "default_nominal_latency_ms")]
    pub nominal_latency_ms: u64,
    /// Optional features
    #[serde(default)]
    pub features: Features,
    /// Categories this provider is particularly good at
    #[serde(default)]
    pub specializations: Vec<TaskCategory>,
    /// Parameters for the built-in simulated backend
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
}

impl ProviderConfig {
    /// Capability metadata for registry registration
    pub fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            context_window: self.context_window,
            features: self.features,
            nominal_latency_ms: self.nominal_latency_ms,
            quality: self.quality,
            specializations: self.specializations.clone(),
        }
    }

    pub const fn pricing(&self) -> Pricing {
        Pricing {
            input_per_mtok: self.input_per_mtok,
            output_per_mtok: self.output_per_mtok,
        }
    }
}

/// Behavior of a simulated backend used by `switchyard simulate`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Mean response latency in milliseconds
    #[serde(default = "default_sim_latency_ms")]
    pub latency_ms: u64,
    /// Uniform jitter added to latency in milliseconds
    #[serde(default)]
    pub latency_jitter_ms: u64,
    /// Probability (0.0 to 1.0) that a request fails
    #[serde(default)]
    pub failure_rate: f64,
    /// Error kind reported on failure
    #[serde(default = "default_failure_kind")]
    pub failure_kind: ErrorKind,
    /// Output tokens produced per response
    #[serde(default = "default_sim_output_tokens")]
    pub output_tokens: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_sim_latency_ms(),
            latency_jitter_ms: 0,
            failure_rate: 0.0,
            failure_kind: default_failure_kind(),
            output_tokens: default_sim_output_tokens(),
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

const fn default_context_window() -> u32 {
    128_000
}

const fn default_quality() -> f64 {
    0.7
}

const fn default_nominal_latency_ms() -> u64 {
    2_000
}

const fn default_sim_latency_ms() -> u64 {
    250
}

const fn default_failure_kind() -> ErrorKind {
    ErrorKind::Server
}

const fn default_sim_output_tokens() -> u32 {
    200
}
