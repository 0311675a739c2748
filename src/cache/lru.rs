//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::collections::VecDeque;

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Keys are stored in a VecDeque where:
/// - Front = Most recently used
/// - Back = Least recently used
///
/// Keys that were never touched after insertion keep their insertion order,
/// so among equally-stale keys the earliest-created one is evicted first.
#[derive(Debug)]
pub struct LruTracker<K> {
    /// Order of keys by access time
    order: VecDeque<K>,
}

impl<K: Eq> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Touch ==
    /// Marks a key as recently used (moves to front).
    ///
    /// If key exists, removes it first then adds to front.
    /// If key is new, just adds to front.
    pub fn touch(&mut self, key: K) {
        // Remove existing occurrence
        self.remove(&key);
        // Add to front (most recent)
        self.order.push_front(key);
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &K) {
        self.order.retain(|k| k != key);
    }

    // == Evict Where ==
    /// Removes and returns the least recently used key accepted by `eligible`.
    ///
    /// Walks from the least recently used end toward the front, skipping keys
    /// the predicate rejects (e.g. keys with an in-flight computation).
    /// Returns None if no tracked key is eligible.
    pub fn evict_where<F>(&mut self, mut eligible: F) -> Option<K>
    where
        F: FnMut(&K) -> bool,
    {
        let index = self.order.iter().rposition(|k| eligible(k))?;
        self.order.remove(index)
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<K> {
        self.order.pop_back()
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        self.order.back()
    }

    // == Clear ==
    /// Drops every tracked key.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // == Contains ==
    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &K) -> bool {
        self.order.iter().any(|k| k == key)
    }
}

impl<K: Eq> Default for LruTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}
