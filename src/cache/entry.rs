//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.
//!
//! Entries never read the clock themselves: the current instant is passed
//! into every query so the owning cache stays the single source of time.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// Represents a single cache entry with value and expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Instant the entry was created
    pub created_at: Instant,
    /// Instant the entry stops being served
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl` after `now`.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `now` - Creation instant
    /// * `ttl` - Lifetime of the entry
    pub fn new(value: V, now: Instant, ttl: Duration) -> Self {
        Self {
            value,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// Boundary condition: an entry is considered expired when the current
    /// time is greater than or equal to the expiration time. Once the TTL
    /// duration has fully elapsed, the entry is immediately expired.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    // == Time To Live ==
    /// Returns remaining TTL as of `now`, zero once expired.
    ///
    /// This method is useful for debugging and statistics purposes.
    pub fn ttl_remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}
