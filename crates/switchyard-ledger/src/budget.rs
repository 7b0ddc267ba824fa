use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchyard_config::{BudgetConfig, BudgetScope};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::record::CostRecord;

/// Tolerance when comparing spend percentages against thresholds
const PERCENT_EPSILON: f64 = 1e-9;

/// Validated budget
#[derive(Debug, Clone)]
pub struct Budget {
    pub id: String,
    /// Spend limit (USD)
    pub limit: f64,
    /// Percentage of the limit (0-100) that triggers a warning
    pub warning_threshold: f64,
    pub scope: BudgetScope,
    /// Rolling window; lifetime when `None`
    pub period: Option<Duration>,
}

impl Budget {
    pub fn from_config(config: &BudgetConfig) -> Result<Self, LedgerError> {
        let invalid = |reason: String| LedgerError::InvalidBudget {
            id: config.id.clone(),
            reason,
        };

        if config.limit <= 0.0 {
            return Err(invalid(format!("limit must be positive, got {}", config.limit)));
        }
        if !(0.0..=100.0).contains(&config.warning_threshold) {
            return Err(invalid(format!(
                "warning_threshold must be within 0-100, got {}",
                config.warning_threshold
            )));
        }

        Ok(Self {
            id: config.id.clone(),
            limit: config.limit,
            warning_threshold: config.warning_threshold,
            scope: config.scope.clone(),
            period: config.period().map_err(invalid)?,
        })
    }

    /// Whether a record counts toward this budget's scope
    pub fn covers(&self, record: &CostRecord) -> bool {
        match &self.scope {
            BudgetScope::Global => true,
            BudgetScope::Provider(provider) => record.provider == *provider,
            BudgetScope::Category(category) => record.category == Some(*category),
        }
    }

    /// Earliest timestamp inside the rolling window
    pub(crate) fn window_start(&self, now_ms: u64) -> Option<u64> {
        self.period
            .map(|period| now_ms.saturating_sub(u64::try_from(period.as_millis()).unwrap_or(u64::MAX)))
    }

    pub(crate) fn status(&self, spent: f64) -> BudgetStatus {
        let percent_used = spent / self.limit * 100.0;
        let level = if percent_used + PERCENT_EPSILON >= 100.0 {
            BudgetLevel::Exceeded
        } else if percent_used + PERCENT_EPSILON >= self.warning_threshold {
            BudgetLevel::Warning
        } else {
            BudgetLevel::Ok
        };

        BudgetStatus {
            id: self.id.clone(),
            limit: self.limit,
            spent,
            remaining: (self.limit - spent).max(0.0),
            percent_used,
            within_limit: level != BudgetLevel::Exceeded,
            level,
        }
    }
}

/// Where spend stands relative to a budget's thresholds, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BudgetLevel {
    Ok,
    Warning,
    Exceeded,
}

/// Point-in-time budget evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub id: String,
    pub limit: f64,
    pub spent: f64,
    pub remaining: f64,
    pub percent_used: f64,
    pub within_limit: bool,
    pub level: BudgetLevel,
}

/// Kind of threshold an alert reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertKind {
    Warning,
    Exceeded,
}

impl AlertKind {
    pub(crate) const fn for_level(level: BudgetLevel) -> Option<Self> {
        match level {
            BudgetLevel::Ok => None,
            BudgetLevel::Warning => Some(Self::Warning),
            BudgetLevel::Exceeded => Some(Self::Exceeded),
        }
    }
}

/// Raised when spend crosses a budget threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub id: Uuid,
    pub budget_id: String,
    pub kind: AlertKind,
    pub spent: f64,
    pub limit: f64,
    pub percent_used: f64,
    pub raised_at_ms: u64,
    pub acknowledged: bool,
}
