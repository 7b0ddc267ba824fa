//! Programmatic configuration builder for integration tests

use std::fmt::Write;
use std::path::Path;

use switchyard_config::Config;

/// Builder producing TOML that goes through the real loader
pub struct ConfigBuilder {
    toml: String,
    retry: String,
}

impl ConfigBuilder {
    /// Create a new builder with exploration off and single-try retries
    pub fn new() -> Self {
        Self {
            toml: String::new(),
            retry: "max_attempts = 1\njitter = false".to_owned(),
        }
    }

    /// Add a provider priced per million tokens with a base quality
    pub fn with_provider(mut self, name: &str, price: f64, quality: f64) -> Self {
        let _ = write!(
            self.toml,
            "\n[providers.{name}]\ninput_per_mtok = {price:?}\noutput_per_mtok = {price:?}\nquality = {quality:?}\n"
        );
        self
    }

    /// Append a table, e.g. `("health", "failure_threshold = 1")`
    ///
    /// Each table may only be added once.
    pub fn with_section(mut self, section: &str, body: &str) -> Self {
        let _ = write!(self.toml, "\n[{section}]\n{body}\n");
        self
    }

    pub fn with_retry(mut self, body: &str) -> Self {
        body.clone_into(&mut self.retry);
        self
    }

    pub fn with_budget(mut self, id: &str, limit: f64, warning_threshold: f64, provider: Option<&str>) -> Self {
        let _ = write!(
            self.toml,
            "\n[[ledger.budgets]]\nid = \"{id}\"\nlimit = {limit:?}\nwarning_threshold = {warning_threshold:?}\n"
        );
        if let Some(provider) = provider {
            let _ = writeln!(self.toml, "scope = {{ provider = \"{provider}\" }}");
        }
        self
    }

    pub fn with_persistence(self, path: &Path) -> Self {
        self.with_section(
            "persistence",
            &format!("path = {:?}\ninterval_seconds = 3600", path.display().to_string()),
        )
    }

    /// Parse and validate the accumulated TOML
    pub fn build(self, routing: &str) -> Config {
        let raw = format!(
            "{}\n[routing]\nexploration_rate = 0.0\n{routing}\n\n[retry]\n{}\n",
            self.toml, self.retry
        );
        Config::from_toml(&raw).unwrap_or_else(|e| panic!("invalid test config: {e}\n{raw}"))
    }
}
