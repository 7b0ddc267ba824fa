//! Backend that fakes latency and failures from configuration

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use switchyard_config::{Config, ProviderConfig, SimulationConfig};
use switchyard_core::{
    CompletionRequest, CompletionResponse, Pricing, Provider, ProviderCapabilities, ProviderError, ProviderRegistry,
    Usage,
};

/// Provider whose behavior comes from `providers.<name>.simulation`
pub struct SimulatedProvider {
    name: String,
    capabilities: ProviderCapabilities,
    pricing: Pricing,
    simulation: SimulationConfig,
}

impl SimulatedProvider {
    pub fn new(name: impl Into<String>, config: &ProviderConfig) -> Self {
        Self {
            name: name.into(),
            capabilities: config.capabilities(),
            pricing: config.pricing(),
            simulation: config.simulation.clone().unwrap_or_default(),
        }
    }

    /// Latency and failure draw for one request
    fn roll(&self) -> (Duration, bool) {
        let mut rng = rand::rng();
        let jitter = self.simulation.latency_jitter_ms;
        let latency_ms = if jitter == 0 {
            self.simulation.latency_ms
        } else {
            self.simulation
                .latency_ms
                .saturating_sub(jitter)
                .saturating_add(rng.random_range(0..=jitter.saturating_mul(2)))
        };
        let failed = rng.random_bool(self.simulation.failure_rate.clamp(0.0, 1.0));
        (Duration::from_millis(latency_ms), failed)
    }
}

#[async_trait]
impl Provider for SimulatedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities.clone()
    }

    fn pricing(&self) -> Pricing {
        self.pricing
    }

    async fn execute(&self, request: &CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let (latency, failed) = self.roll();
        tokio::time::sleep(latency).await;

        if failed {
            return Err(ProviderError::new(
                self.simulation.failure_kind,
                format!("simulated {} failure", self.simulation.failure_kind),
            ));
        }

        let input_tokens = u32::try_from(request.full_text().len() / 4).unwrap_or(u32::MAX).max(1);
        Ok(CompletionResponse {
            provider: self.name.clone(),
            model: format!("{}-simulated", self.name),
            content: format!("simulated response from {}", self.name),
            usage: Usage {
                input_tokens,
                output_tokens: self.simulation.output_tokens,
            },
            quality: Some(self.capabilities.quality),
        })
    }
}

/// Registry with a simulated adapter for every enabled provider
pub fn registry(config: &Config) -> anyhow::Result<Arc<ProviderRegistry>> {
    let registry = ProviderRegistry::new();
    for (name, provider) in config.providers.iter().filter(|(_, p)| p.enabled) {
        registry
            .register(Arc::new(SimulatedProvider::new(name.clone(), provider)))
            .map_err(|e| anyhow::anyhow!("failed to register provider '{name}': {e}"))?;
    }
    Ok(Arc::new(registry))
}
