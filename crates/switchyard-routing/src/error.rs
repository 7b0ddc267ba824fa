//! Routing-specific error types

use thiserror::Error;

/// Errors that can occur while choosing a provider
#[derive(Debug, Error)]
pub enum RoutingError {
    /// No providers are registered
    #[error("no providers registered for routing")]
    NoProviders,

    /// Every registered provider was filtered out
    #[error("no provider can serve this request ({registered} registered, all filtered by capability or routing options)")]
    NoEligibleProvider { registered: usize },
}
