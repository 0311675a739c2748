//! Context Cache Module
//!
//! The public cache handle: a bounded, TTL-aware, concurrency-safe lookup
//! cache with single-flight computation. Expensive retrievals for the same
//! key are collapsed into one in-flight computation whose outcome (success
//! or failure) fans out to every concurrent caller.
//!
//! The entry store and the flight registry live behind a single lock, so
//! every key-level step is one short critical section and the two views
//! cannot disagree. Computations themselves always run outside the lock, in
//! a task of their own, so a caller that gives up waiting never cancels the
//! computation for everyone else.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::flight::{self, Claim, FlightMap, FlightTicket};
use crate::cache::{CacheStats, CacheStore};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Inner State ==
/// Entry store and flight registry guarded together.
struct Inner<K, V> {
    store: CacheStore<K, V>,
    flights: FlightMap<K, V>,
}

// == Context Cache ==
/// Bounded lookup cache for expensive keyed computations.
///
/// Entries expire after a per-entry TTL and the least recently used entry
/// is evicted when the cache is at capacity. Concurrent `get_or_compute`
/// calls for the same missing key share a single computation.
///
/// Cloning the handle is cheap and shares the underlying cache.
pub struct ContextCache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    inner: Arc<RwLock<Inner<K, V>>>,
    clock: C,
    config: CacheConfig,
}

impl<K, V, C> Clone for ContextCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            clock: self.clock.clone(),
            config: self.config.clone(),
        }
    }
}

impl<K, V> ContextCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache driven by the system clock.
    ///
    /// Fails fast if the configuration is invalid (zero capacity or zero
    /// default TTL).
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> ContextCache<K, V, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock + Clone,
{
    // == Constructor With Clock ==
    /// Creates a cache with an injected time source.
    ///
    /// # Arguments
    /// * `config` - Capacity, default TTL, and sweep interval
    /// * `clock` - Time source consulted for every expiry decision
    pub fn with_clock(config: CacheConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Inner {
                store: CacheStore::new(config.capacity, config.default_ttl),
                flights: FlightMap::new(),
            })),
            clock,
            config,
        })
    }

    /// Returns the configuration the cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Get ==
    /// Retrieves the value for `key` if present and unexpired.
    ///
    /// A hit refreshes the entry's recency but never its expiry. An expired
    /// entry is dropped on sight and reads as a miss. This never waits on an
    /// in-flight computation; a miss is `None`, not an error.
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut guard = self.inner.write().await;
        guard.store.lookup(key, now)
    }

    // == Get Or Compute ==
    /// Retrieves the value for `key`, computing it on a miss.
    ///
    /// On a miss, the first caller runs `compute` and stores the result with
    /// the given TTL (`None` uses the configured default). Callers arriving
    /// while the computation is in flight do not start a second one; they
    /// wait and receive the same outcome, success or failure.
    ///
    /// A failed computation is not cached and not retried here: the error
    /// reaches every waiting caller, and the next call starts fresh. The
    /// computation runs in its own task, so dropping this future (e.g. via
    /// `tokio::time::timeout`) abandons only this caller's wait.
    ///
    /// # Arguments
    /// * `key` - The key to retrieve or compute
    /// * `ttl` - Lifetime for a freshly computed entry (default when None)
    /// * `compute` - Producer of the value for `key`
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: K,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let rx = {
            let now = self.clock.now();
            let mut guard = self.inner.write().await;

            // Fast path: a live entry settles the call immediately
            if let Some(value) = guard.store.lookup(&key, now) {
                return Ok(value);
            }

            match guard.flights.claim(key.clone()) {
                Claim::Follower(rx) => {
                    guard.store.record_coalesced();
                    debug!("joining in-flight computation");
                    rx
                }
                Claim::Leader(ticket) => {
                    debug!("starting computation for missing entry");
                    let rx = ticket.tx.subscribe();
                    drop(guard);
                    // The closure runs outside the lock: it may do real work
                    // before returning its future
                    self.spawn_computation(key, ttl, ticket, compute());
                    rx
                }
            }
        };

        flight::await_outcome(rx).await
    }

    /// Drives a claimed computation to its published outcome.
    ///
    /// Runs detached from the claiming caller so cancellation of any waiter
    /// leaves the computation and the remaining waiters untouched.
    fn spawn_computation<Fut>(
        &self,
        key: K,
        ttl: Option<Duration>,
        ticket: FlightTicket<V>,
        future: Fut,
    ) where
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let clock = self.clock.clone();

        tokio::spawn(async move {
            let outcome = future.await;

            let result = match outcome {
                Ok(value) => {
                    let mut guard = inner.write().await;
                    let Inner { store, flights } = &mut *guard;
                    // Publish only if this flight is still the registered
                    // one; invalidation during the computation promised
                    // later callers a fresh miss
                    if flights.id_of(&key) == Some(ticket.id) {
                        flights.remove(&key);
                        store.insert_value(key, value.clone(), clock.now(), ttl, |k| {
                            flights.is_inflight(k)
                        });
                    } else {
                        debug!("computation superseded by invalidation; not cached");
                    }
                    Ok(value)
                }
                Err(err) => {
                    warn!(error = %err, "computation failed; nothing cached");
                    let mut guard = inner.write().await;
                    if guard.flights.id_of(&key) == Some(ticket.id) {
                        guard.flights.remove(&key);
                    }
                    Err(CacheError::computation(err))
                }
            };

            // Waiters may have all given up; that is fine
            let _ = ticket.tx.send(Some(result));
        });
    }

    // == Invalidate ==
    /// Removes the entry for `key`, if any.
    ///
    /// Also unregisters any in-flight computation for the key, so the next
    /// `get_or_compute` observes a fresh miss. Absent keys are a no-op.
    pub async fn invalidate(&self, key: &K) {
        let mut guard = self.inner.write().await;
        let removed = guard.store.remove(key);
        guard.flights.remove(key);
        if removed {
            debug!("invalidated cache entry");
        }
    }

    // == Invalidate All ==
    /// Removes every entry and unregisters every in-flight computation.
    pub async fn invalidate_all(&self) {
        let mut guard = self.inner.write().await;
        let dropped = guard.store.clear();
        guard.flights.clear();
        debug!(dropped, "invalidated all cache entries");
    }

    // == Purge Expired ==
    /// Removes expired entries eagerly.
    ///
    /// Lazy expiry on access keeps the cache correct without this; sweeping
    /// just reclaims memory for entries nobody asks about. Returns the
    /// number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut guard = self.inner.write().await;
        guard.store.purge_expired(now)
    }

    // == Length ==
    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        let guard = self.inner.read().await;
        guard.store.live_len(now)
    }

    // == Is Empty ==
    /// True when no live entries remain.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // == Stats ==
    /// Snapshot of hit/miss/eviction/expiration/coalesced counters and the
    /// current live entry count.
    pub async fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let guard = self.inner.read().await;
        guard.store.snapshot(now)
    }
}
