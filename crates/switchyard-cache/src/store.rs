use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use mini_moka::sync::Cache;
use serde::{Deserialize, Serialize};
use switchyard_config::{EvictionPolicy, ResponseCacheConfig};

use crate::CacheError;
use crate::lfu::LfuStore;

#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<V> {
    pub(crate) value: V,
    /// Cost the original response incurred (USD), credited on every hit
    cost: f64,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(value: V, cost: f64, ttl: Option<Duration>) -> Self {
        Self {
            value,
            cost,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Cache counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
    pub capacity: usize,
    /// Provider spend avoided by hits (USD)
    pub saved_cost: f64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Backing store for each eviction policy
enum Store<V> {
    Lru(Mutex<LruCache<String, CacheEntry<V>>>),
    Lfu(Mutex<LfuStore<V>>),
    /// Expiry and capacity are left to mini-moka; per-entry deadlines are
    /// checked on read and purge
    Ttl(Cache<String, CacheEntry<V>>),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded in-process response cache
///
/// Under the TTL policy capacity evictions happen inside mini-moka and are
/// not reflected in `evictions`.
pub struct ResponseCache<V> {
    store: Store<V>,
    stats: Mutex<CacheStats>,
    config: ResponseCacheConfig,
}

impl<V> fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<V: Clone + Send + Sync + 'static> ResponseCache<V> {
    pub fn new(config: ResponseCacheConfig) -> Result<Self, CacheError> {
        if config.enabled && config.capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }

        let store = match config.policy {
            EvictionPolicy::Lru => Store::Lru(Mutex::new(LruCache::new(
                NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN),
            ))),
            EvictionPolicy::Lfu => Store::Lfu(Mutex::new(LfuStore::new(config.capacity))),
            EvictionPolicy::Ttl => {
                let mut builder = Cache::builder().max_capacity(config.capacity as u64);
                if let Some(ttl) = config.ttl() {
                    builder = builder.time_to_live(ttl);
                }
                Store::Ttl(builder.build())
            }
        };

        Ok(Self {
            store,
            stats: Mutex::new(CacheStats {
                capacity: config.capacity,
                ..CacheStats::default()
            }),
            config,
        })
    }

    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub const fn policy(&self) -> EvictionPolicy {
        self.config.policy
    }

    /// Look up a live entry, counting the hit or miss
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        if !self.config.enabled {
            return None;
        }

        let now = Instant::now();
        let mut expired = false;
        let found = match &self.store {
            Store::Lru(cache) => {
                let mut cache = lock(cache);
                if cache.peek(key).is_some_and(|e| e.is_expired(now)) {
                    cache.pop(key);
                    expired = true;
                }
                cache.get(key).map(|e| (e.value.clone(), e.cost))
            }
            Store::Lfu(store) => {
                let mut store = lock(store);
                if store.peek(key).is_some_and(|e| e.is_expired(now)) {
                    store.remove(key);
                    expired = true;
                }
                store.touch(key).map(|e| (e.value.clone(), e.cost))
            }
            Store::Ttl(cache) => match cache.get(&key.to_owned()) {
                Some(entry) if entry.is_expired(now) => {
                    cache.invalidate(&key.to_owned());
                    expired = true;
                    None
                }
                found => found.map(|e| (e.value, e.cost)),
            },
        };

        let mut stats = lock(&self.stats);
        if expired {
            stats.expirations += 1;
        }
        if let Some((value, cost)) = found {
            stats.hits += 1;
            stats.saved_cost += cost;
            tracing::debug!(cache_key = key, "cache hit");
            Some(value)
        } else {
            stats.misses += 1;
            tracing::debug!(cache_key = key, "cache miss");
            None
        }
    }

    /// Store a value under the configured default TTL
    pub fn put(&self, key: impl Into<String>, value: V, cost: f64) {
        self.put_with_ttl(key, value, cost, self.config.ttl());
    }

    /// Store a value with an explicit TTL, `None` meaning no expiry
    ///
    /// Replacing an existing key never evicts. Inserting a new key into a
    /// full LRU or LFU cache evicts exactly one entry first. Under the TTL
    /// policy the configured TTL still bounds every entry.
    pub fn put_with_ttl(&self, key: impl Into<String>, value: V, cost: f64, ttl: Option<Duration>) {
        if !self.config.enabled {
            return;
        }

        let key = key.into();
        let entry = CacheEntry::new(value, cost, ttl);
        let evicted = match &self.store {
            Store::Lru(cache) => lock(cache)
                .push(key.clone(), entry)
                .map(|(old, _)| old)
                .filter(|old| *old != key),
            Store::Lfu(store) => lock(store).insert(key, entry),
            Store::Ttl(cache) => {
                cache.insert(key, entry);
                None
            }
        };

        let mut stats = lock(&self.stats);
        stats.insertions += 1;
        if let Some(victim) = evicted {
            stats.evictions += 1;
            tracing::debug!(cache_key = %victim, policy = ?self.config.policy, "evicted cache entry");
        }
    }

    /// Remove one entry, returning whether it existed
    pub fn invalidate(&self, key: &str) -> bool {
        match &self.store {
            Store::Lru(cache) => lock(cache).pop(key).is_some(),
            Store::Lfu(store) => lock(store).remove(key).is_some(),
            Store::Ttl(cache) => {
                let key = key.to_owned();
                let existed = cache.contains_key(&key);
                cache.invalidate(&key);
                existed
            }
        }
    }

    pub fn clear(&self) {
        match &self.store {
            Store::Lru(cache) => lock(cache).clear(),
            Store::Lfu(store) => lock(store).clear(),
            Store::Ttl(cache) => {
                for key in ttl_keys(cache, |_| true) {
                    cache.invalidate(&key);
                }
            }
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let purged = match &self.store {
            Store::Lru(cache) => {
                let mut cache = lock(cache);
                let expired: Vec<String> = cache
                    .iter()
                    .filter(|(_, e)| e.is_expired(now))
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in &expired {
                    cache.pop(key);
                }
                expired.len()
            }
            Store::Lfu(store) => lock(store).purge_expired(now),
            Store::Ttl(cache) => {
                let expired = ttl_keys(cache, |e| e.is_expired(now));
                for key in &expired {
                    cache.invalidate(key);
                }
                expired.len()
            }
        };

        lock(&self.stats).expirations += purged as u64;
        if purged > 0 {
            tracing::debug!(purged, "purged expired cache entries");
        }
        purged
    }

    pub fn len(&self) -> usize {
        match &self.store {
            Store::Lru(cache) => lock(cache).len(),
            Store::Lfu(store) => lock(store).len(),
            Store::Ttl(cache) => cache.iter().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.len();
        CacheStats {
            entries,
            ..lock(&self.stats).clone()
        }
    }
}

fn ttl_keys<V>(cache: &Cache<String, CacheEntry<V>>, keep: impl Fn(&CacheEntry<V>) -> bool) -> Vec<String>
where
    V: Clone + Send + Sync + 'static,
{
    cache
        .iter()
        .filter(|entry| keep(entry.value()))
        .map(|entry| entry.key().clone())
        .collect()
}
