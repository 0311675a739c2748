//! Time source abstraction for TTL bookkeeping
//!
//! The cache never reads the system clock directly. All expiry decisions go
//! through a [`Clock`] supplied at construction, so tests can drive time
//! forward deterministically with [`ManualClock`] instead of sleeping.
//!
//! Time is monotonic (`std::time::Instant`): TTLs are durations, and entry
//! lifetimes should not move when the wall clock is stepped.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// == Clock Trait ==
/// Monotonic time source used for entry expiry.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

// == System Clock ==
/// Production clock backed by `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// == Manual Clock ==
/// Hand-advanced clock for deterministic expiry tests.
///
/// Clones share the same underlying instant, so a test can keep one handle
/// and advance time under a cache holding another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
