use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use switchyard_core::{TaskCategory, now_millis};
use uuid::Uuid;

/// Spend to append to the ledger
#[derive(Debug, Clone)]
pub struct CostEntry {
    pub provider: String,
    pub category: Option<TaskCategory>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Actual cost (USD)
    pub cost: f64,
    pub success: bool,
}

impl CostEntry {
    pub fn new(provider: impl Into<String>, cost: f64) -> Self {
        Self {
            provider: provider.into(),
            category: None,
            input_tokens: 0,
            output_tokens: 0,
            cost,
            success: true,
        }
    }
}

/// Immutable ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub id: Uuid,
    pub timestamp_ms: u64,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TaskCategory>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
    pub success: bool,
}

impl CostRecord {
    pub(crate) fn from_entry(entry: CostEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp_ms: now_millis(),
            provider: entry.provider,
            category: entry.category,
            input_tokens: entry.input_tokens,
            output_tokens: entry.output_tokens,
            cost: entry.cost,
            success: entry.success,
        }
    }
}

/// Which records a query covers; empty matches everything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CostFilter {
    pub provider: Option<String>,
    pub category: Option<TaskCategory>,
    /// Inclusive lower bound, unix milliseconds
    pub since_ms: Option<u64>,
    /// Exclusive upper bound, unix milliseconds
    pub until_ms: Option<u64>,
}

impl CostFilter {
    pub fn provider(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &CostRecord) -> bool {
        self.provider.as_ref().is_none_or(|p| *p == record.provider)
            && self.category.is_none_or(|c| record.category == Some(c))
            && self.since_ms.is_none_or(|since| record.timestamp_ms >= since)
            && self.until_ms.is_none_or(|until| record.timestamp_ms < until)
    }
}

/// Spend attributed to one provider or category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub cost: f64,
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl CostBreakdown {
    fn add(&mut self, record: &CostRecord) {
        self.cost += record.cost;
        self.requests += 1;
        self.input_tokens += u64::from(record.input_tokens);
        self.output_tokens += u64::from(record.output_tokens);
    }
}

/// Aggregated spend over the records matching a filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub total: CostBreakdown,
    pub successful_requests: u64,
    pub average_cost: f64,
    pub by_provider: BTreeMap<String, CostBreakdown>,
    pub by_category: BTreeMap<TaskCategory, CostBreakdown>,
    pub first_ms: Option<u64>,
    pub last_ms: Option<u64>,
}

impl CostReport {
    pub(crate) fn build<'a>(records: impl Iterator<Item = &'a CostRecord>) -> Self {
        let mut report = Self::default();

        for record in records {
            report.total.add(record);
            report.successful_requests += u64::from(record.success);
            report.by_provider.entry(record.provider.clone()).or_default().add(record);
            if let Some(category) = record.category {
                report.by_category.entry(category).or_default().add(record);
            }
            report.first_ms = Some(report.first_ms.map_or(record.timestamp_ms, |t| t.min(record.timestamp_ms)));
            report.last_ms = Some(report.last_ms.map_or(record.timestamp_ms, |t| t.max(record.timestamp_ms)));
        }

        if report.total.requests > 0 {
            report.average_cost = report.total.cost / report.total.requests as f64;
        }
        report
    }
}
