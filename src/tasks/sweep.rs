//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries.
//!
//! Lazy expiry on access already keeps lookups correct; the sweep only
//! reclaims memory held by entries nobody asks about anymore.

use std::hash::Hash;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::ContextCache;
use crate::clock::Clock;

/// Spawns a background task that periodically purges expired cache entries.
///
/// The task runs in an infinite loop, sleeping for the given interval
/// between sweeps. Each sweep takes the cache's write lock briefly to drop
/// entries whose TTL has elapsed.
///
/// # Arguments
/// * `cache` - Handle to the cache to sweep
/// * `interval` - Time between sweeps (typically `config.sweep_interval`)
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache: ContextCache<String, String> = ContextCache::new(config.clone())?;
/// let sweep_handle = spawn_sweep_task(cache.clone(), config.sweep_interval);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task<K, V, C>(
    cache: ContextCache<K, V, C>,
    interval: Duration,
) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock + Clone,
{
    tokio::spawn(async move {
        info!(
            "starting expiry sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            // Sleep for the configured interval
            tokio::time::sleep(interval).await;

            // Drop entries whose TTL has elapsed
            let removed = cache.purge_expired().await;

            if removed > 0 {
                info!("expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("expiry sweep: no expired entries found");
            }
        }
    })
}
