//! Background Tasks Module
//!
//! Contains background tasks a host service can run alongside the cache.
//!
//! # Tasks
//! - Expiry Sweep: Removes expired cache entries at configured intervals

mod sweep;

pub use sweep::spawn_sweep_task;
