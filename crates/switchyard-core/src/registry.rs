//! Provider registry with capability and pricing profiles
//!
//! Explicitly constructed and passed to every component that needs it.
//! Registration order is preserved and used as the deterministic tie-break
//! wherever providers are ranked.

use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use thiserror::Error;

use crate::provider::{Pricing, Provider, ProviderCapabilities};

/// Errors raised while registering providers
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The adapter reported itself as unusable
    #[error("provider failed validation: {name}")]
    Invalid { name: String },

    /// A provider with the same name is already registered
    #[error("provider already registered: {name}")]
    Duplicate { name: String },

    /// No provider with this name
    #[error("provider not found: {name}")]
    NotFound { name: String },
}

/// Snapshot of a provider's metadata taken at registration
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    /// Provider name
    pub name: String,
    /// Advertised capabilities
    pub capabilities: ProviderCapabilities,
    /// Token pricing
    pub pricing: Pricing,
}

impl ProviderProfile {
    /// Estimate the cost of a request with the given token counts
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        self.pricing.estimate_cost(input_tokens, output_tokens)
    }
}

struct Registered {
    adapter: Arc<dyn Provider>,
    profile: ProviderProfile,
}

/// Registry of all available providers
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<IndexMap<String, Registered>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, capturing its capabilities and pricing
    pub fn register(&self, adapter: Arc<dyn Provider>) -> Result<(), RegistryError> {
        let name = adapter.name().to_owned();

        if !adapter.validate() {
            return Err(RegistryError::Invalid { name });
        }

        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        if providers.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }

        let profile = ProviderProfile {
            name: name.clone(),
            capabilities: adapter.capabilities(),
            pricing: adapter.pricing(),
        };

        tracing::debug!(
            provider = %name,
            context_window = profile.capabilities.context_window,
            quality = profile.capabilities.quality,
            "provider registered"
        );

        providers.insert(name, Registered { adapter, profile });
        Ok(())
    }

    /// Replace the capability and pricing metadata of a registered provider
    pub fn reconfigure(
        &self,
        name: &str,
        capabilities: ProviderCapabilities,
        pricing: Pricing,
    ) -> Result<(), RegistryError> {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        let entry = providers.get_mut(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_owned(),
        })?;

        entry.profile.capabilities = capabilities;
        entry.profile.pricing = pricing;
        drop(providers);

        tracing::info!(provider = name, "provider reconfigured");
        Ok(())
    }

    /// Look up an adapter by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|r| Arc::clone(&r.adapter))
    }

    /// Look up a provider profile by name
    pub fn profile(&self, name: &str) -> Option<ProviderProfile> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|r| r.profile.clone())
    }

    /// All profiles in registration order
    pub fn profiles(&self) -> Vec<ProviderProfile> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|r| r.profile.clone())
            .collect()
    }

    /// Registered provider names in registration order
    pub fn names(&self) -> Vec<String> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
