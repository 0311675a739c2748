//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment
//! variables.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub capacity: usize,
    /// Default TTL applied when `get_or_compute` is called without one
    pub default_ttl: Duration,
    /// Background sweep task interval
    pub sweep_interval: Duration,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CONTEXT_CACHE_CAPACITY` - Maximum cache entries (default: 1000)
    /// - `CONTEXT_CACHE_DEFAULT_TTL_SECS` - Default TTL in seconds (default: 300)
    /// - `CONTEXT_CACHE_SWEEP_INTERVAL_SECS` - Sweep frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        Self {
            capacity: env::var("CONTEXT_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            default_ttl: env::var("CONTEXT_CACHE_DEFAULT_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(300)),
            sweep_interval: env::var("CONTEXT_CACHE_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(60)),
        }
    }

    /// Rejects configurations the cache cannot operate under.
    ///
    /// Construction fails fast on a zero capacity or a zero default TTL
    /// rather than deferring the problem to the first insertion.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::ZeroTtl);
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            default_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}
