//! Context Cache - A bounded in-memory lookup cache for expensive
//! computations
//!
//! Provides TTL expiration, LRU eviction, and single-flight deduplication:
//! concurrent requests for the same missing key share one computation and
//! its outcome. Built for retrieval pipelines where recomputing a context
//! is slow and bursts of identical lookups are common.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheStats, ContextCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;
