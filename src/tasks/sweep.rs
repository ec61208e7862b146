//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::hash::Hash;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::store::WeakTtlCache;
use crate::cache::{Clock, TtlCache};

// == Sweep Handle ==
/// Controls a running sweep task.
///
/// Dropping the handle leaves the task running; it then ends only when the
/// cache itself is dropped.
#[derive(Debug)]
pub struct SweepHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweepHandle {
    /// Signals the task to stop without waiting for it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the task and waits for it to exit.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "TTL sweep task did not exit cleanly");
        }
    }
}

/// Releases the cache's sweeper slot when the task ends, however it ends.
struct SweeperSlot<K, V, C> {
    cache: WeakTtlCache<K, V, C>,
}

impl<K, V, C> Drop for SweeperSlot<K, V, C> {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.upgrade() {
            cache.release_sweeper();
        }
    }
}

/// Spawns the background sweep for `cache` on the current Tokio runtime.
///
/// Each pass snapshots the expired keys, removes them in batches of
/// `sweep_batch_size` (one write lock per batch, yielding in between), then
/// sleeps for `sweep_interval`. The task holds only a weak reference to the
/// cache and exits when cancelled or when the cache is dropped.
///
/// Returns `None` if the cache already has a sweeper or no runtime is
/// available.
pub(crate) fn spawn_sweep_task<K, V, C>(cache: &TtlCache<K, V, C>) -> Option<SweepHandle>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    C: Clock,
{
    let runtime = match Handle::try_current() {
        Ok(runtime) => runtime,
        Err(e) => {
            warn!(error = %e, "Cannot start TTL sweep outside a Tokio runtime");
            return None;
        }
    };

    if !cache.try_claim_sweeper() {
        warn!("TTL sweep already running for this cache");
        return None;
    }

    let interval = cache.config().sweep_interval;
    let batch_size = cache.config().sweep_batch_size.max(1);
    let slot = SweeperSlot {
        cache: cache.downgrade(),
    };
    let token = CancellationToken::new();
    let cancel = token.clone();

    let handle = runtime.spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            batch_size, "Starting TTL sweep task"
        );

        loop {
            let Some(cache) = slot.cache.upgrade() else {
                debug!("Cache dropped, ending TTL sweep");
                break;
            };

            let removed = sweep_pass(&cache, batch_size, &cancel).await;
            cache.record_sweep_pass();
            drop(cache);

            if removed > 0 {
                info!(removed, "TTL sweep removed expired entries");
            } else {
                debug!("TTL sweep: no expired entries found");
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("TTL sweep cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        drop(slot);
        info!("TTL sweep task stopped");
    });

    Some(SweepHandle { token, handle })
}

/// Runs one pass over the cache and returns the number of entries removed.
async fn sweep_pass<K, V, C>(
    cache: &TtlCache<K, V, C>,
    batch_size: usize,
    cancel: &CancellationToken,
) -> usize
where
    K: Eq + Hash + Clone,
    C: Clock,
{
    let expired = cache.expired_keys();
    let mut removed = 0;

    for batch in expired.chunks(batch_size) {
        if cancel.is_cancelled() {
            break;
        }
        removed += cache.remove_expired(batch);
        tokio::task::yield_now().await;
    }

    removed
}
