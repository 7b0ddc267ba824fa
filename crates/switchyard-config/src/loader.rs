use std::collections::HashSet;
use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        tracing::debug!(providers = config.providers.len(), "configuration loaded");

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error on the first inconsistent value found
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_providers()?;
        self.validate_routing()?;
        self.validate_health()?;
        self.validate_resilience()?;
        self.validate_cache()?;
        self.validate_ledger()?;
        self.validate_learning()?;
        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        if !self.providers.values().any(|p| p.enabled) {
            anyhow::bail!("at least one enabled provider must be configured");
        }

        for (name, provider) in &self.providers {
            if name.trim().is_empty() {
                anyhow::bail!("provider names must not be empty");
            }
            if provider.context_window == 0 {
                anyhow::bail!("provider '{name}': context_window must be greater than 0");
            }
            if provider.input_per_mtok < 0.0 || provider.output_per_mtok < 0.0 {
                anyhow::bail!("provider '{name}': prices must not be negative");
            }
            if !unit_interval(provider.quality) {
                anyhow::bail!("provider '{name}': quality must be between 0.0 and 1.0");
            }
            if let Some(ref sim) = provider.simulation
                && !unit_interval(sim.failure_rate)
            {
                anyhow::bail!("provider '{name}': simulation.failure_rate must be between 0.0 and 1.0");
            }
        }

        Ok(())
    }

    fn validate_routing(&self) -> anyhow::Result<()> {
        if !unit_interval(self.routing.exploration_rate) {
            anyhow::bail!("routing.exploration_rate must be between 0.0 and 1.0");
        }
        if !unit_interval(self.routing.untested_reliability) {
            anyhow::bail!("routing.untested_reliability must be between 0.0 and 1.0");
        }
        if self.routing.load_penalty_per_request < 0.0 {
            anyhow::bail!("routing.load_penalty_per_request must not be negative");
        }
        Ok(())
    }

    fn validate_health(&self) -> anyhow::Result<()> {
        let health = &self.health;
        if health.failure_threshold == 0 {
            anyhow::bail!("health.failure_threshold must be greater than 0");
        }
        if health.success_threshold == 0 {
            anyhow::bail!("health.success_threshold must be greater than 0");
        }
        if health.half_open_max_probes == 0 {
            anyhow::bail!("health.half_open_max_probes must be at least 1");
        }
        if health.window_size == 0 {
            anyhow::bail!("health.window_size must be greater than 0");
        }
        Ok(())
    }

    fn validate_resilience(&self) -> anyhow::Result<()> {
        let retry = &self.retry;
        if retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if retry.multiplier < 1.0 {
            anyhow::bail!("retry.multiplier must be at least 1.0");
        }
        if retry.initial_delay_ms > retry.max_delay_ms {
            anyhow::bail!("retry.initial_delay_ms must not exceed retry.max_delay_ms");
        }
        if retry.attempt_timeout_ms == 0 {
            anyhow::bail!("retry.attempt_timeout_ms must be greater than 0");
        }
        if self.fallback.parallel_attempts == 0 {
            anyhow::bail!("fallback.parallel_attempts must be at least 1");
        }
        Ok(())
    }

    fn validate_cache(&self) -> anyhow::Result<()> {
        if self.cache.enabled && self.cache.capacity == 0 {
            anyhow::bail!("cache.capacity must be greater than 0 when the cache is enabled");
        }
        Ok(())
    }

    fn validate_ledger(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();

        for budget in &self.ledger.budgets {
            if !seen.insert(budget.id.as_str()) {
                anyhow::bail!("duplicate budget id '{}'", budget.id);
            }
            if budget.limit <= 0.0 {
                anyhow::bail!("budget '{}': limit must be greater than 0", budget.id);
            }
            if budget.warning_threshold <= 0.0 || budget.warning_threshold > 100.0 {
                anyhow::bail!("budget '{}': warning_threshold must be in (0, 100]", budget.id);
            }
            budget.period().map_err(|e| anyhow::anyhow!("budget '{}': {e}", budget.id))?;
        }

        Ok(())
    }

    fn validate_learning(&self) -> anyhow::Result<()> {
        if !unit_interval(self.learning.decay) {
            anyhow::bail!("learning.decay must be between 0.0 and 1.0");
        }
        if !unit_interval(self.learning.learning_rate) {
            anyhow::bail!("learning.learning_rate must be between 0.0 and 1.0");
        }
        if self.maintenance.sweep_interval_ms == 0 {
            anyhow::bail!("maintenance.sweep_interval_ms must be greater than 0");
        }
        if let Some(ref persistence) = self.persistence
            && persistence.interval_seconds == 0
        {
            anyhow::bail!("persistence.interval_seconds must be greater than 0");
        }
        Ok(())
    }
}

fn unit_interval(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}
