use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use crate::store::CacheEntry;

#[derive(Debug)]
struct Slot<V> {
    entry: CacheEntry<V>,
    hits: u64,
    last_access: u64,
}

/// Least-frequently-used store
///
/// `order` mirrors `slots` as `(hits, last_access, key)` so the victim is
/// always the first element. Ties on hits fall back to the older access.
#[derive(Debug)]
pub(crate) struct LfuStore<V> {
    slots: HashMap<String, Slot<V>>,
    order: BTreeSet<(u64, u64, String)>,
    clock: u64,
    capacity: usize,
}

impl<V> LfuStore<V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(capacity),
            order: BTreeSet::new(),
            clock: 0,
            capacity,
        }
    }

    const fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub(crate) fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.slots.get(key).map(|slot| &slot.entry)
    }

    /// Count a hit and return the entry
    pub(crate) fn touch(&mut self, key: &str) -> Option<&CacheEntry<V>> {
        let tick = self.tick();
        let slot = self.slots.get_mut(key)?;
        self.order.remove(&(slot.hits, slot.last_access, key.to_owned()));
        slot.hits += 1;
        slot.last_access = tick;
        self.order.insert((slot.hits, slot.last_access, key.to_owned()));
        Some(&slot.entry)
    }

    /// Insert or replace, returning the key evicted to make room
    pub(crate) fn insert(&mut self, key: String, entry: CacheEntry<V>) -> Option<String> {
        let tick = self.tick();

        if let Some(slot) = self.slots.get_mut(&key) {
            self.order.remove(&(slot.hits, slot.last_access, key.clone()));
            slot.entry = entry;
            slot.last_access = tick;
            self.order.insert((slot.hits, tick, key));
            return None;
        }

        let evicted = if self.slots.len() >= self.capacity {
            self.order.pop_first().map(|(_, _, victim)| {
                self.slots.remove(&victim);
                victim
            })
        } else {
            None
        };

        self.order.insert((0, tick, key.clone()));
        self.slots.insert(
            key,
            Slot {
                entry,
                hits: 0,
                last_access: tick,
            },
        );
        evicted
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let slot = self.slots.remove(key)?;
        self.order.remove(&(slot.hits, slot.last_access, key.to_owned()));
        Some(slot.entry)
    }

    /// Drop expired entries, returning how many went
    pub(crate) fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.order.clear();
    }
}
