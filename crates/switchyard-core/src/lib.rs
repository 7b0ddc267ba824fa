//! Core types shared across Switchyard crates
//!
//! Defines the normalized request/response shapes, the closed error
//! taxonomy, the provider adapter contract, and the explicitly constructed
//! provider registry handed to every component.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod category;
pub mod error;
pub mod provider;
pub mod registry;
pub mod types;

pub use category::TaskCategory;
pub use error::{ErrorKind, ProviderError};
pub use provider::{Features, Pricing, Provider, ProviderCapabilities};
pub use registry::{ProviderProfile, ProviderRegistry, RegistryError};
pub use types::{CompletionRequest, CompletionResponse, Content, ContentPart, Message, Role, Usage};

/// Milliseconds since the unix epoch, saturating to zero on clock errors
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
