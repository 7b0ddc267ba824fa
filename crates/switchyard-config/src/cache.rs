use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Eviction policy for the in-process response cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Evict the least recently accessed entry
    #[default]
    Lru,
    /// Evict the least frequently hit entry
    Lfu,
    /// Evict the entry closest to expiry; expired entries are swept
    Ttl,
}

/// Response cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseCacheConfig {
    /// Whether caching is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Eviction policy
    #[serde(default)]
    pub policy: EvictionPolicy,
    /// Maximum number of entries
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Default TTL in seconds for cached responses (0 = no expiry)
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl ResponseCacheConfig {
    /// Default entry lifetime, if any
    pub const fn ttl(&self) -> Option<Duration> {
        if self.ttl_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.ttl_seconds))
        }
    }
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            policy: EvictionPolicy::default(),
            capacity: default_capacity(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_enabled() -> bool {
    true
}

const fn default_capacity() -> usize {
    1_000
}

#[allow(clippy::missing_const_for_fn)]
fn default_ttl_seconds() -> u64 {
    300
}
