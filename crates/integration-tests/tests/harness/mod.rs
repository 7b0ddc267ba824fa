//! Shared fixtures for the end-to-end scenarios

#![allow(dead_code)]

pub mod config;
pub mod mock_provider;

use std::sync::Arc;

use switchyard_config::Config;
use switchyard_core::{Provider, ProviderRegistry};
use switchyard_engine::Engine;
use switchyard_routing::{Router, Selector};

use mock_provider::MockProvider;

/// Engine over the given mocks with a deterministic selector
pub fn engine(config: &Config, providers: &[Arc<MockProvider>]) -> Engine {
    let registry = Arc::new(ProviderRegistry::new());
    for provider in providers {
        registry
            .register(Arc::clone(provider) as Arc<dyn Provider>)
            .expect("mock provider registers");
    }

    let router = Router::new(&config.routing, &config.classifier).with_selector(Selector::with_seed(
        0.0,
        config.routing.fallback_depth,
        42,
    ));
    Engine::new(config, registry).expect("engine builds").with_router(router)
}
