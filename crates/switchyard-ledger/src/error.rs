use thiserror::Error;
use uuid::Uuid;

/// Errors returned by the cost ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Budget configuration could not be used
    #[error("invalid budget '{id}': {reason}")]
    InvalidBudget { id: String, reason: String },

    /// No budget with this id is configured
    #[error("unknown budget: {0}")]
    UnknownBudget(String),

    /// No alert with this id was raised
    #[error("unknown alert: {0}")]
    UnknownAlert(Uuid),
}
