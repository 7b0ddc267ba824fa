use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Outcome learning configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LearningConfig {
    /// Whether outcomes feed back into scoring
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Weight kept on history for each EMA update (0.0 to 1.0)
    #[serde(default = "default_decay")]
    pub decay: f64,
    /// Preference step on success; failures step back twice as far
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            decay: default_decay(),
            learning_rate: default_learning_rate(),
        }
    }
}

/// Background maintenance cadence
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaintenanceConfig {
    /// Interval between sweeps, in milliseconds
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl MaintenanceConfig {
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

/// Snapshot persistence for restart continuity
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Snapshot file path
    pub path: PathBuf,
    /// Interval between snapshot writes, in seconds
    #[serde(default = "default_persist_interval_seconds")]
    pub interval_seconds: u64,
    /// Recent attempts included in each snapshot
    #[serde(default = "default_recent_attempts")]
    pub recent_attempts: usize,
}

impl PersistenceConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_enabled() -> bool {
    true
}

const fn default_decay() -> f64 {
    0.95
}

const fn default_learning_rate() -> f64 {
    0.05
}

const fn default_sweep_interval_ms() -> u64 {
    1_000
}

const fn default_persist_interval_seconds() -> u64 {
    60
}

const fn default_recent_attempts() -> usize {
    200
}
