//! Property-Based Tests for Cache Module
//!
//! Uses proptest to verify the cache's behavioral properties. Expiry
//! properties pass explicit instants into the store, so no test here
//! depends on real time passing.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{CacheStore, ContextCache};
use crate::config::CacheConfig;

// == Test Configuration ==
const TEST_CAPACITY: usize = 100;
const TEST_DEFAULT_TTL: Duration = Duration::from_secs(300);

fn test_store() -> CacheStore<String, String> {
    CacheStore::new(TEST_CAPACITY, TEST_DEFAULT_TTL)
}

fn unprotected(_: &String) -> bool {
    false
}

// == Strategies ==
/// Generates cache keys
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}".prop_map(|s| s)
}

/// Generates cache values
fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,256}".prop_map(|s| s)
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Insert { key: String, value: String },
    Lookup { key: String },
    Invalidate { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::Insert { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Lookup { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Invalidate { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // **Property: Statistics Accuracy**
    // *For any* sequence of cache operations, the hit and miss counters
    // SHALL reflect exactly the lookups that found or missed a value, and
    // the entry gauge SHALL match the live entry count.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let now = Instant::now();
        let mut store = test_store();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Insert { key, value } => {
                    store.insert_value(key, value, now, None, unprotected);
                }
                CacheOp::Lookup { key } => {
                    match store.lookup(&key, now) {
                        Some(_) => expected_hits += 1,
                        None => expected_misses += 1,
                    }
                }
                CacheOp::Invalidate { key } => {
                    store.remove(&key);
                }
            }
        }

        let stats = store.snapshot(now);
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.entries, store.live_len(now), "Entry gauge mismatch");
    }

    // **Property: Round-trip Storage Consistency**
    // *For any* key-value pair, storing the pair and then retrieving it
    // (before expiration) SHALL return the exact same value that was stored.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in valid_value_strategy()) {
        let now = Instant::now();
        let mut store = test_store();

        // Store the value
        store.insert_value(key.clone(), value.clone(), now, None, unprotected);

        // Retrieve and verify
        let retrieved = store.lookup(&key, now);
        prop_assert_eq!(retrieved, Some(value), "Round-trip value mismatch");
    }

    // **Property: Invalidation Removes Entry**
    // *For any* key present in the cache, after invalidation a subsequent
    // lookup SHALL miss, even though the entry had not expired.
    #[test]
    fn prop_invalidate_removes_entry(key in valid_key_strategy(), value in valid_value_strategy()) {
        let now = Instant::now();
        let mut store = test_store();

        // Store the value
        store.insert_value(key.clone(), value, now, None, unprotected);

        // Verify it exists
        prop_assert!(store.lookup(&key, now).is_some(), "Key should exist before invalidation");

        // Invalidate it
        prop_assert!(store.remove(&key), "Invalidation should find the entry");

        // Verify it's gone well before its TTL
        prop_assert!(store.lookup(&key, now).is_none(), "Key should miss after invalidation");
    }

    // **Property: Overwrite Semantics**
    // *For any* key, storing a value V1 and then storing a value V2 with the
    // same key SHALL result in lookups returning V2.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in valid_value_strategy(),
        value2 in valid_value_strategy()
    ) {
        let now = Instant::now();
        let mut store = test_store();

        // Store first value
        store.insert_value(key.clone(), value1, now, None, unprotected);

        // Overwrite with second value
        store.insert_value(key.clone(), value2.clone(), now, None, unprotected);

        // Retrieve and verify second value is returned
        let retrieved = store.lookup(&key, now);
        prop_assert_eq!(retrieved, Some(value2), "Overwrite should return new value");

        // Verify only one entry exists
        prop_assert_eq!(store.live_len(now), 1, "Should have exactly one entry after overwrite");
    }

    // **Property: Capacity Enforcement**
    // *For any* sequence of insertions, the number of resident entries
    // SHALL never exceed the configured capacity.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec(
            (valid_key_strategy(), valid_value_strategy()),
            1..200
        )
    ) {
        let now = Instant::now();
        let capacity = 50; // Use smaller capacity for testing
        let mut store = CacheStore::new(capacity, TEST_DEFAULT_TTL);

        for (key, value) in entries {
            store.insert_value(key, value, now, None, unprotected);
            prop_assert!(
                store.resident_len() <= capacity,
                "Cache size {} exceeds capacity {}",
                store.resident_len(),
                capacity
            );
        }
    }

    // **Property: TTL Expiration Boundary**
    // *For any* entry stored with a TTL, lookups strictly before the expiry
    // instant SHALL return the value, and lookups at or after it SHALL miss.
    #[test]
    fn prop_ttl_expiration_behavior(
        key in valid_key_strategy(),
        value in valid_value_strategy(),
        ttl_secs in 1u64..3600
    ) {
        let now = Instant::now();
        let mut store = test_store();
        let ttl = Duration::from_secs(ttl_secs);

        store.insert_value(key.clone(), value.clone(), now, Some(ttl), unprotected);

        // Live right up to the boundary
        let just_before = now + ttl - Duration::from_millis(1);
        prop_assert_eq!(
            store.lookup(&key, just_before),
            Some(value),
            "Entry should be live before its TTL elapses"
        );

        // Expired exactly at the boundary
        prop_assert_eq!(
            store.lookup(&key, now + ttl),
            None,
            "Entry should miss once its TTL has elapsed"
        );
    }

    // **Property: Reads Do Not Extend Lifetime**
    // *For any* entry, repeated reads before expiry SHALL all return the
    // stored value, and SHALL NOT move the expiry instant.
    #[test]
    fn prop_repeated_reads_preserve_value_and_expiry(
        key in valid_key_strategy(),
        value in valid_value_strategy(),
        reads in 1usize..20
    ) {
        let now = Instant::now();
        let mut store = test_store();
        let ttl = Duration::from_secs(10);

        store.insert_value(key.clone(), value.clone(), now, Some(ttl), unprotected);

        // Every read before expiry returns the same value
        for i in 0..reads {
            let at = now + Duration::from_millis(i as u64 * 100);
            let found = store.lookup(&key, at);
            prop_assert_eq!(
                found.as_deref(),
                Some(value.as_str()),
                "Read {} should return the stored value",
                i
            );
        }

        // The reads above did not push the expiry out
        prop_assert_eq!(store.lookup(&key, now + ttl), None, "Reads must not extend the TTL");
    }
}

// Property tests for LRU eviction behavior
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // **Property: LRU Eviction Order**
    // *For any* set of entries filling the cache to capacity, inserting one
    // more SHALL evict the entry that was accessed least recently.
    #[test]
    fn prop_lru_eviction_order(
        // Generate unique keys for initial fill
        initial_keys in prop::collection::vec(valid_key_strategy(), 3..10),
        new_key in valid_key_strategy(),
        new_value in valid_value_strategy()
    ) {
        // Deduplicate keys to ensure we have unique entries
        let unique_keys: Vec<String> = initial_keys
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        // Need at least 2 unique keys for meaningful test
        prop_assume!(unique_keys.len() >= 2);

        // Ensure new_key is not in the initial set
        prop_assume!(!unique_keys.contains(&new_key));

        let now = Instant::now();
        let capacity = unique_keys.len();
        let mut store = CacheStore::new(capacity, TEST_DEFAULT_TTL);

        // Fill cache to capacity - first key added will be oldest (LRU candidate)
        let oldest_key = unique_keys[0].clone();
        for key in &unique_keys {
            store.insert_value(key.clone(), format!("value_{}", key), now, None, unprotected);
        }

        // Verify cache is at capacity
        prop_assert_eq!(store.live_len(now), capacity, "Cache should be at capacity");

        // Add new entry - should evict the oldest (first) key
        store.insert_value(new_key.clone(), new_value, now, None, unprotected);

        // Cache should still be at capacity
        prop_assert_eq!(store.live_len(now), capacity, "Cache should remain at capacity after eviction");

        // The oldest key should have been evicted
        prop_assert!(
            store.lookup(&oldest_key, now).is_none(),
            "Oldest key '{}' should have been evicted",
            oldest_key
        );

        // The new key should exist
        prop_assert!(
            store.lookup(&new_key, now).is_some(),
            "New key '{}' should exist after insertion",
            new_key
        );

        // All other original keys (except oldest) should still exist
        for key in unique_keys.iter().skip(1) {
            prop_assert!(
                store.lookup(key, now).is_some(),
                "Key '{}' should still exist (not the oldest)",
                key
            );
        }
    }

    // **Property: LRU Access Tracking**
    // *For any* lookup on an existing key, that key SHALL become the most
    // recently used and SHALL NOT be the next eviction candidate.
    #[test]
    fn prop_lru_access_tracking(
        // Generate unique keys
        keys in prop::collection::vec(valid_key_strategy(), 3..8),
        new_key in valid_key_strategy(),
        new_value in valid_value_strategy()
    ) {
        // Deduplicate keys
        let unique_keys: Vec<String> = keys
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        // Need at least 3 unique keys for meaningful test
        prop_assume!(unique_keys.len() >= 3);

        // Ensure new_key is not in the initial set
        prop_assume!(!unique_keys.contains(&new_key));

        let now = Instant::now();
        let capacity = unique_keys.len();
        let mut store = CacheStore::new(capacity, TEST_DEFAULT_TTL);

        // Fill cache to capacity
        for key in &unique_keys {
            store.insert_value(key.clone(), format!("value_{}", key), now, None, unprotected);
        }

        // Access the first key (which would normally be evicted next).
        // This should move it to most recently used
        let accessed_key = unique_keys[0].clone();
        let _ = store.lookup(&accessed_key, now);

        // Now the second key should be the oldest (LRU candidate)
        let expected_evicted = unique_keys[1].clone();

        // Add new entry to trigger eviction
        store.insert_value(new_key.clone(), new_value, now, None, unprotected);

        // The accessed key should NOT have been evicted
        prop_assert!(
            store.lookup(&accessed_key, now).is_some(),
            "Accessed key '{}' should not be evicted after being touched",
            accessed_key
        );

        // The second key (now oldest) should have been evicted
        prop_assert!(
            store.lookup(&expected_evicted, now).is_none(),
            "Key '{}' should have been evicted as it was oldest after access",
            expected_evicted
        );

        // New key should exist
        prop_assert!(
            store.lookup(&new_key, now).is_some(),
            "New key should exist"
        );
    }
}

// == Property Test for Single-Flight Computation ==
// Exercises the concurrent contract through the public handle

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // **Property: Single-Flight Computation**
    // *For any* group of concurrent lookups against missing keys, each key's
    // computation SHALL run exactly once, every caller SHALL receive the
    // computed value, and the cache SHALL stay within capacity.
    #[test]
    fn prop_single_flight_runs_once_per_key(
        keys in prop::collection::vec(valid_key_strategy(), 1..6),
        waiters_per_key in 2usize..5
    ) {
        let unique_keys: Vec<String> = keys
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        tokio_test::block_on(async {
            let config = CacheConfig {
                capacity: TEST_CAPACITY,
                default_ttl: TEST_DEFAULT_TTL,
                sweep_interval: Duration::from_secs(60),
            };
            let cache: ContextCache<String, String> =
                ContextCache::new(config).expect("config should be valid");

            let counters: HashMap<String, Arc<AtomicUsize>> = unique_keys
                .iter()
                .map(|key| (key.clone(), Arc::new(AtomicUsize::new(0))))
                .collect();

            let mut handles = Vec::new();
            for key in &unique_keys {
                for _ in 0..waiters_per_key {
                    let cache = cache.clone();
                    let key = key.clone();
                    let counter = Arc::clone(&counters[&key]);
                    handles.push(tokio::spawn(async move {
                        let expected = format!("value_{}", key);
                        let value = cache
                            .get_or_compute(key, None, move || async move {
                                counter.fetch_add(1, Ordering::SeqCst);
                                // Give other callers a chance to pile on
                                tokio::task::yield_now().await;
                                Ok(expected)
                            })
                            .await?;
                        Ok::<String, crate::error::CacheError>(value)
                    }));
                }
            }

            for handle in handles {
                let value = handle.await.expect("task should not panic");
                prop_assert!(value.is_ok(), "Coalesced lookup failed: {:?}", value);
                prop_assert!(value.unwrap().starts_with("value_"), "Value should be complete");
            }

            for (key, counter) in &counters {
                prop_assert_eq!(
                    counter.load(Ordering::SeqCst),
                    1,
                    "Computation for key '{}' should run exactly once",
                    key
                );
            }

            prop_assert!(
                cache.len().await <= TEST_CAPACITY,
                "Cache should not exceed capacity"
            );

            Ok(())
        })?;
    }
}

// == Additional Unit Tests for Edge Cases ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ttl_override_is_immediately_expired() {
        let now = Instant::now();
        let mut store = test_store();

        // A zero per-call TTL is a deliberate opt-out of caching this result
        store.insert_value(
            "key".to_string(),
            "value".to_string(),
            now,
            Some(Duration::ZERO),
            unprotected,
        );

        assert_eq!(store.lookup(&"key".to_string(), now), None);
    }

    #[test]
    fn test_hit_rate_stays_in_unit_interval() {
        let now = Instant::now();
        let mut store = test_store();

        store.insert_value("key".to_string(), "value".to_string(), now, None, unprotected);
        store.lookup(&"key".to_string(), now);
        store.lookup(&"missing".to_string(), now);

        let rate = store.snapshot(now).hit_rate();
        assert!((0.0..=1.0).contains(&rate));
    }

    #[test]
    fn test_snapshot_entry_gauge_matches_live_count() {
        let now = Instant::now();
        let mut store = test_store();

        store.insert_value(
            "short".to_string(),
            "a".to_string(),
            now,
            Some(Duration::from_secs(1)),
            unprotected,
        );
        store.insert_value("long".to_string(), "b".to_string(), now, None, unprotected);

        let later = now + Duration::from_secs(5);
        let stats = store.snapshot(later);
        assert_eq!(stats.entries, store.live_len(later));
        assert_eq!(stats.entries, 1);
    }
}
