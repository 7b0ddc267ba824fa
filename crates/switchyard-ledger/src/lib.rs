//! Cost accounting for Switchyard
//!
//! Records actual spend per provider invocation, evaluates configured
//! budgets on every record, and raises de-duplicated warning and exceeded
//! alerts to subscribers.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod budget;
pub mod error;
pub mod ledger;
pub mod record;

pub use budget::{AlertKind, Budget, BudgetAlert, BudgetLevel, BudgetStatus};
pub use error::LedgerError;
pub use ledger::CostLedger;
pub use record::{CostBreakdown, CostEntry, CostFilter, CostRecord, CostReport};
