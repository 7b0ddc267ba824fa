use std::path::PathBuf;

use switchyard_cache::CacheError;
use switchyard_core::RegistryError;
use switchyard_ledger::LedgerError;
use switchyard_resilience::ExecutionError;
use switchyard_routing::RoutingError;
use thiserror::Error;

/// Errors surfaced by the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Caller asked for budget enforcement and a budget is over its limit
    #[error("budget exceeded: {}", .budgets.join(", "))]
    BudgetExceeded { budgets: Vec<String> },

    /// Snapshot file could not be read or written
    #[error("snapshot {path}: {source}")]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot was written by a newer format version
    #[error("unsupported snapshot version {version}")]
    UnsupportedSnapshot { version: u32 },

    /// Snapshot contents were not a valid statistics snapshot
    #[error("snapshot format: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
}
