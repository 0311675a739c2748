//! Cache Module
//!
//! Provides bounded in-memory caching with TTL expiration, LRU eviction,
//! and single-flight computation for concurrent misses.

mod context;
mod entry;
pub(crate) mod flight;
mod lru;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use context::ContextCache;
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::CacheStore;
