use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchyard_core::TaskCategory;

/// Which cost records a budget is evaluated against
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetScope {
    /// Every record
    #[default]
    Global,
    /// Records from one provider
    Provider(String),
    /// Records for one task category
    Category(TaskCategory),
}

/// A named cost ceiling
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetConfig {
    /// Unique budget identifier
    pub id: String,
    /// Spend limit in USD
    pub limit: f64,
    /// Percentage of the limit (0-100) at which a warning is raised
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
    /// Records the budget applies to
    #[serde(default)]
    pub scope: BudgetScope,
    /// Rolling window (e.g. "1h", "30d"); lifetime when unset
    #[serde(default)]
    pub period: Option<String>,
}

impl BudgetConfig {
    /// Parse the rolling window
    ///
    /// # Errors
    ///
    /// Returns an error if the period string is not a valid duration
    pub fn period(&self) -> Result<Option<Duration>, String> {
        self.period
            .as_deref()
            .map(|s| duration_str::parse(s).map_err(|e| format!("invalid budget period '{s}': {e}")))
            .transpose()
    }
}

/// Cost ledger configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Window in which an unacknowledged alert suppresses duplicates, in seconds
    #[serde(default = "default_alert_window_seconds")]
    pub alert_window_seconds: u64,
    /// Maximum records kept in memory; oldest are trimmed first
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    /// Configured budgets
    #[serde(default)]
    pub budgets: Vec<BudgetConfig>,
}

impl LedgerConfig {
    pub const fn alert_window(&self) -> Duration {
        Duration::from_secs(self.alert_window_seconds)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            alert_window_seconds: default_alert_window_seconds(),
            max_records: default_max_records(),
            budgets: Vec::new(),
        }
    }
}

const fn default_warning_threshold() -> f64 {
    80.0
}

const fn default_alert_window_seconds() -> u64 {
    3_600
}

const fn default_max_records() -> usize {
    100_000
}
