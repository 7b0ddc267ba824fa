//! Configuration for the Switchyard routing engine
//!
//! Loaded from TOML with `{{ env.VAR }}` expansion. Every section is optional
//! except `[providers]`, which must name at least one enabled provider.

#![allow(clippy::must_use_candidate)]

pub mod cache;
mod env;
pub mod health;
pub mod learning;
pub mod ledger;
mod loader;
pub mod providers;
pub mod resilience;
pub mod routing;
pub mod telemetry;

use indexmap::IndexMap;
use serde::Deserialize;

pub use cache::*;
pub use health::*;
pub use learning::*;
pub use ledger::*;
pub use providers::*;
pub use resilience::*;
pub use routing::*;
pub use telemetry::{ExportProtocol, ExporterConfig, LogFormat, MetricsConfig, TelemetryConfig, TracingConfig};

/// Top-level Switchyard configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Provider metadata keyed by provider name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Scoring and selection
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Task classifier keyword tables
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Circuit breaker and health tracking
    #[serde(default)]
    pub health: CircuitBreakerConfig,
    /// Per-provider retry policy
    #[serde(default)]
    pub retry: RetryConfig,
    /// Fallback chain execution
    #[serde(default)]
    pub fallback: FallbackConfig,
    /// Response cache
    #[serde(default)]
    pub cache: ResponseCacheConfig,
    /// Cost ledger and budgets
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Outcome learning
    #[serde(default)]
    pub learning: LearningConfig,
    /// Background maintenance
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    /// Snapshot persistence
    #[serde(default)]
    pub persistence: Option<PersistenceConfig>,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
