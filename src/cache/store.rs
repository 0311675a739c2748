//! Cache Store Module
//!
//! Core cache state combining HashMap storage with LRU tracking and TTL
//! expiration. The store is synchronous and holds no clock: callers pass the
//! current instant into every operation, which keeps expiry decisions
//! deterministic under an injected test clock.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::cache::{CacheEntry, CacheStats, LruTracker};

// == Cache Store ==
/// Core cache storage with LRU eviction and TTL support.
#[derive(Debug)]
pub struct CacheStore<K, V> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker<K>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    capacity: usize,
    /// TTL applied when an insertion does not carry its own
    default_ttl: Duration,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a new CacheStore with the given capacity and default TTL.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries the store can hold
    /// * `default_ttl` - TTL for insertions without an explicit one
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            capacity,
            default_ttl,
        }
    }

    // == Lookup ==
    /// Retrieves a value by key as of `now`.
    ///
    /// A live entry counts as a hit and refreshes its recency without
    /// touching its expiry instant. An expired entry is removed on sight and
    /// the lookup counts as a miss, the same as an absent key.
    ///
    /// # Arguments
    /// * `key` - The key to retrieve
    /// * `now` - The current instant
    pub fn lookup(&mut self, key: &K, now: Instant) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired(now) {
                // Lazy expiry: drop the stale entry on the way out
                self.entries.remove(key);
                self.lru.remove(key);
                self.stats.record_expiration();
                self.stats.record_miss();
                trace!("lookup removed an expired entry");
                return None;
            }

            let value = entry.value.clone();
            self.stats.record_hit();
            self.lru.touch(key.clone());
            trace!("cache hit");
            Some(value)
        } else {
            self.stats.record_miss();
            trace!("cache miss");
            None
        }
    }

    // == Insert ==
    /// Stores a computed value with optional TTL.
    ///
    /// If the key already exists, the value is overwritten and its TTL is
    /// reset; no eviction happens. A brand-new key at capacity first reclaims
    /// expired entries, then evicts in LRU order, skipping keys `is_protected`
    /// shields (keys with an in-flight computation).
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The computed value
    /// * `now` - The current instant
    /// * `ttl` - Optional TTL (uses the default when None)
    /// * `is_protected` - Keys this admits are never chosen as eviction victims
    pub fn insert_value<F>(
        &mut self,
        key: K,
        value: V,
        now: Instant,
        ttl: Option<Duration>,
        mut is_protected: F,
    ) where
        F: FnMut(&K) -> bool,
    {
        // Check if key already exists (overwrite case)
        let is_overwrite = self.entries.contains_key(&key);

        // If not overwriting and at capacity, make room before inserting
        if !is_overwrite && self.entries.len() >= self.capacity {
            self.purge_expired(now);
            while self.entries.len() >= self.capacity {
                match self.lru.evict_where(|k| !is_protected(k)) {
                    Some(victim) => {
                        self.entries.remove(&victim);
                        self.stats.record_eviction();
                        debug!("evicted least recently used entry at capacity");
                    }
                    // Protected keys hold at most expired entries, and those
                    // were purged above, so a victim always exists
                    None => break,
                }
            }
        }

        // Use provided TTL or default
        let effective_ttl = ttl.unwrap_or(self.default_ttl);

        // Create and store entry
        let entry = CacheEntry::new(value, now, effective_ttl);
        self.entries.insert(key.clone(), entry);

        // Update LRU tracker (touch moves to front)
        self.lru.touch(key);

        trace!(
            ttl_ms = effective_ttl.as_millis() as u64,
            "stored computed value"
        );
    }

    // == Remove ==
    /// Removes an entry by key.
    ///
    /// Returns true if an entry was present. Removing an absent key is a
    /// no-op, not an error.
    pub fn remove(&mut self, key: &K) -> bool {
        if self.entries.remove(key).is_some() {
            self.lru.remove(key);
            true
        } else {
            false
        }
    }

    // == Clear ==
    /// Removes every entry. Returns the number of entries dropped.
    ///
    /// Cumulative counters (hits, misses, evictions) are kept.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        count
    }

    // == Purge Expired ==
    /// Removes all expired entries from the cache as of `now`.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let expired_keys: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            self.entries.remove(&key);
            self.lru.remove(&key);
            self.stats.record_expiration();
        }

        if count > 0 {
            debug!(purged = count, "removed expired entries");
        }
        count
    }

    // == Stats ==
    /// Returns current cache statistics with the live entry count as of `now`.
    pub fn snapshot(&self, now: Instant) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_entries(self.live_len(now));
        stats
    }

    /// Counts a caller that attached to an in-flight computation.
    pub(crate) fn record_coalesced(&mut self) {
        self.stats.record_coalesced();
    }

    // == Length ==
    /// Returns the number of live (unexpired) entries as of `now`.
    ///
    /// Expired entries awaiting lazy removal are not counted.
    pub fn live_len(&self, now: Instant) -> usize {
        self.entries
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Returns the number of resident entries, expired ones included.
    pub fn resident_len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache holds no live entries as of `now`.
    pub fn is_empty(&self, now: Instant) -> bool {
        self.live_len(now) == 0
    }
}
