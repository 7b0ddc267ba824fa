//! Exact-match response cache for Switchyard
//!
//! Caches completion responses keyed by a SHA-256 hash of the canonical
//! request (model + messages + temperature). Only deterministic,
//! non-streaming requests are cached. Bounded in memory with LRU, LFU, or
//! TTL eviction.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod lfu;
mod store;

use serde::Serialize;
use sha2::{Digest, Sha256};
use switchyard_core::{CompletionRequest, Message};
use thiserror::Error;

pub use store::{CacheStats, ResponseCache};

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Enabled cache configured with no room
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,
    /// Request could not be serialized for hashing
    #[error("serialization: {0}")]
    Serialization(String),
}

/// Fields of a request that determine its response
#[derive(Serialize)]
struct KeyFields<'a> {
    model: Option<&'a str>,
    messages: &'a [Message],
    temperature: Option<f64>,
}

/// Compute a SHA-256 cache key for a request
///
/// Hashes the canonical JSON of the model hint, messages, and temperature.
/// The `stream` flag is excluded since it does not affect content.
pub fn compute_cache_key(request: &CompletionRequest) -> Result<String, CacheError> {
    let fields = KeyFields {
        model: request.model.as_deref(),
        messages: &request.messages,
        temperature: request.temperature,
    };
    let json = serde_json::to_vec(&fields).map_err(|e| CacheError::Serialization(e.to_string()))?;
    let hash = Sha256::digest(&json);
    Ok(format!("{hash:x}"))
}

/// Check whether a request is cacheable
///
/// Only deterministic requests (temperature 0 or unset) in non-streaming
/// mode are eligible.
pub fn is_cacheable(request: &CompletionRequest) -> bool {
    if request.stream {
        return false;
    }
    request.temperature.is_none_or(|t| t == 0.0)
}
