//! Error types for the cache
//!
//! Provides unified error handling using thiserror.
//!
//! A lookup miss is not an error: `get` returns `Option` and
//! `get_or_compute` fills misses by running the supplied computation. The
//! variants here cover invalid construction parameters and computations
//! that failed or died before producing an outcome.

use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Cache was constructed with a capacity of zero entries
    #[error("invalid configuration: capacity must be at least 1 entry")]
    ZeroCapacity,

    /// Cache was constructed with a zero default TTL
    #[error("invalid configuration: default TTL must be non-zero")]
    ZeroTtl,

    /// The computation supplied to `get_or_compute` returned an error.
    ///
    /// The underlying error is shared: when several callers coalesce onto
    /// one in-flight computation, each receives a clone of this variant
    /// wrapping the same failure.
    #[error("computation failed: {0}")]
    Computation(Arc<anyhow::Error>),

    /// The computing task died (e.g. panicked) before publishing an outcome
    #[error("computation aborted before producing a result")]
    ComputationAborted,
}

impl CacheError {
    /// Wraps a computation failure for fan-out to every waiting caller.
    pub(crate) fn computation(err: anyhow::Error) -> Self {
        CacheError::Computation(Arc::new(err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
