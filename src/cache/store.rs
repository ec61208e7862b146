//! Cache Store Module
//!
//! Main cache engine: a HashMap behind a single reader/writer lock with
//! lazy expiration on read.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::trace;

use crate::cache::entry::duration_to_ticks;
use crate::cache::stats::StatsCollector;
use crate::cache::{CacheEntry, CacheStats, Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweep_task, SweepHandle};

// == Shared State ==
struct Inner<K, V, C> {
    /// Key-value storage
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    /// Activity counters
    stats: StatsCollector,
    /// Time source
    clock: C,
    /// Instant all entry timestamps are relative to
    origin: Instant,
    /// Tuning parameters
    config: CacheConfig,
    /// Set while a sweep task owns this cache
    sweeper_running: AtomicBool,
}

// == TTL Cache ==
/// Concurrent key/value cache with per-entry TTL.
///
/// The handle is cheap to clone; clones share the same storage. Entries
/// expire lazily: a `get` that finds an entry past its TTL removes it and
/// reports [`CacheError::TimedOut`]. Entries nobody reads again are
/// reclaimed by the background sweep started with
/// [`spawn_sweeper`](Self::spawn_sweeper), or on demand with
/// [`purge_expired`](Self::purge_expired).
///
/// A TTL of [`Duration::ZERO`] means the entry never expires.
///
/// ```
/// use std::time::Duration;
/// use ttl_cache::{CacheError, TtlCache};
///
/// let cache: TtlCache<&str, String> = TtlCache::new();
/// assert!(cache.set("greeting", "hello".to_string(), Duration::from_secs(60)));
/// assert_eq!(cache.get("greeting"), Ok("hello".to_string()));
/// assert_eq!(cache.get("missing"), Err(CacheError::KeyNotFound));
/// ```
pub struct TtlCache<K, V, C = SystemClock> {
    inner: Arc<Inner<K, V, C>>,
}

impl<K, V, C> Clone for TtlCache<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, C> fmt::Debug for TtlCache<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("len", &self.inner.entries.read().len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<K, V> TtlCache<K, V, SystemClock>
where
    K: Eq + Hash,
{
    // == Constructors ==
    /// Creates an empty cache with the default configuration.
    pub fn new() -> Self {
        Self::from_config(&CacheConfig::default())
    }

    /// Creates an empty cache with the given configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_clock(config.clone(), SystemClock)
    }
}

impl<K, V> Default for TtlCache<K, V, SystemClock>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash,
    C: Clock,
{
    /// Creates an empty cache driven by a custom clock (useful for testing).
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        let origin = clock.now();
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                stats: StatsCollector::default(),
                clock,
                origin,
                config,
                sweeper_running: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Current time in ticks since the cache origin.
    fn now_ticks(&self) -> u64 {
        let now = self.inner.clock.now();
        duration_to_ticks(now.saturating_duration_since(self.inner.origin))
    }

    // == Set ==
    /// Stores `value` under `key` with the given TTL.
    ///
    /// Returns `false` without touching anything when a live entry already
    /// holds an equal value. Otherwise the entry is (re)created with a fresh
    /// timestamp and `true` is returned. An expired entry that has not been
    /// reclaimed yet is always replaced.
    pub fn set(&self, key: K, value: V, ttl: Duration) -> bool
    where
        V: PartialEq,
    {
        let mut entries = self.inner.entries.write();
        let now = self.now_ticks();

        if let Some(existing) = entries.get(&key) {
            if !existing.is_expired_at(now) && *existing.value() == value {
                return false;
            }
        }

        entries.insert(key, CacheEntry::new(value, ttl, self.inner.origin, now));
        self.inner.stats.record_insert();
        true
    }

    // == Get ==
    /// Retrieves a clone of the value stored under `key`.
    ///
    /// A live entry has its last access refreshed, which restarts its TTL.
    /// An entry past its TTL is removed and [`CacheError::TimedOut`] is
    /// returned; the next lookup then reports [`CacheError::KeyNotFound`].
    pub fn get<Q>(&self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        {
            let entries = self.inner.entries.read();
            let now = self.now_ticks();
            match entries.get(key) {
                None => {
                    self.inner.stats.record_miss();
                    return Err(CacheError::KeyNotFound);
                }
                Some(entry) if !entry.is_expired_at(now) => {
                    entry.touch(now);
                    self.inner.stats.record_hit();
                    return Ok(entry.value().clone());
                }
                Some(_) => {}
            }
        }

        // Past due: re-check under exclusive access, the entry may have been
        // replaced or reclaimed since the shared lock was released.
        let mut entries = self.inner.entries.write();
        let now = self.now_ticks();
        match entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                entry.touch(now);
                self.inner.stats.record_hit();
                Ok(entry.value().clone())
            }
            Some(_) => {
                entries.remove(key);
                self.inner.stats.record_expired();
                trace!("Removed expired entry on lookup");
                Err(CacheError::TimedOut)
            }
            None => {
                self.inner.stats.record_miss();
                Err(CacheError::TimedOut)
            }
        }
    }

    // == Exists ==
    /// Returns true if an entry is present for `key`.
    ///
    /// Expiry is not evaluated, so a past-due entry that has not been
    /// reclaimed still counts. The answer may be stale by the time it is
    /// used; call [`get`](Self::get) when correctness depends on it.
    pub fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.entries.read().contains_key(key)
    }

    // == Delete ==
    /// Removes the entry for `key`. Returns whether an entry was present.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.inner.entries.write().remove(key).is_some();
        if removed {
            self.inner.stats.record_deletes(1);
        }
        removed
    }

    // == Cleanup ==
    /// Removes every entry for which `predicate` returns true.
    ///
    /// The predicate is handed the whole [`CacheEntry`], not just the value,
    /// so it can look at the TTL and last access as well; use
    /// [`CacheEntry::value`] to reach the payload. All entries are evaluated
    /// under a single exclusive lock hold, and entries that are kept are not
    /// refreshed.
    ///
    /// The predicate must not call back into this cache: the lock is held
    /// while it runs and such a call would deadlock.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&CacheEntry<V>) -> bool,
    {
        let mut entries = self.inner.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !predicate(entry));
        let removed = before - entries.len();
        self.inner.stats.record_deletes(removed);
        removed
    }

    // == Clear ==
    /// Removes all entries.
    pub fn clear(&self) {
        let mut entries = self.inner.entries.write();
        let removed = entries.len();
        entries.clear();
        self.inner.stats.record_deletes(removed);
    }

    // == Length ==
    /// Returns the number of entries currently stored, including expired
    /// entries that have not been reclaimed yet.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    // == Stats ==
    /// Returns a snapshot of the activity counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot(self.len())
    }
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
    C: Clock,
{
    // == Purge Expired ==
    /// Removes all expired entries right away, in batches of
    /// `sweep_batch_size` per exclusive lock hold.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let batch_size = self.inner.config.sweep_batch_size.max(1);
        self.expired_keys()
            .chunks(batch_size)
            .map(|batch| self.remove_expired(batch))
            .sum()
    }

    /// Snapshots the keys that are past due, under shared access only.
    pub(crate) fn expired_keys(&self) -> Vec<K> {
        let entries = self.inner.entries.read();
        let now = self.now_ticks();
        entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Removes the given keys if they are still expired.
    ///
    /// Entries refreshed or replaced since the snapshot survive.
    pub(crate) fn remove_expired(&self, keys: &[K]) -> usize {
        let mut entries = self.inner.entries.write();
        let now = self.now_ticks();
        let mut removed = 0;
        for key in keys {
            if entries.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
                entries.remove(key);
                removed += 1;
            }
        }
        self.inner.stats.record_swept(removed);
        removed
    }

    pub(crate) fn record_sweep_pass(&self) {
        self.inner.stats.record_sweep_pass();
    }
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    C: Clock,
{
    // == Spawn Sweeper ==
    /// Starts the background sweep for this cache on the current Tokio
    /// runtime.
    ///
    /// Only one sweep task runs per cache. Returns `None` if one is already
    /// running or no runtime is available. Once the returned handle is
    /// stopped (or the task ends because the cache was dropped) a new sweep
    /// can be started.
    pub fn spawn_sweeper(&self) -> Option<SweepHandle> {
        spawn_sweep_task(self)
    }
}

impl<K, V, C> TtlCache<K, V, C> {
    /// Claims the single sweeper slot. Returns false if already taken.
    pub(crate) fn try_claim_sweeper(&self) -> bool {
        self.inner
            .sweeper_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_sweeper(&self) {
        self.inner.sweeper_running.store(false, Ordering::Release);
    }

    /// Returns true while a sweep task is attached to this cache.
    pub fn has_sweeper(&self) -> bool {
        self.inner.sweeper_running.load(Ordering::Acquire)
    }

    pub(crate) fn downgrade(&self) -> WeakTtlCache<K, V, C> {
        WeakTtlCache {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

// == Weak Handle ==
/// Non-owning handle held by the sweep task so it never keeps a dropped
/// cache alive.
pub(crate) struct WeakTtlCache<K, V, C> {
    inner: Weak<Inner<K, V, C>>,
}

impl<K, V, C> WeakTtlCache<K, V, C> {
    pub(crate) fn upgrade(&self) -> Option<TtlCache<K, V, C>> {
        self.inner.upgrade().map(|inner| TtlCache { inner })
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    const TTL: Duration = Duration::from_secs(10);

    fn manual_cache() -> (TtlCache<String, String, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let cache = TtlCache::with_clock(CacheConfig::default(), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_store_new() {
        let cache: TtlCache<String, String> = TtlCache::new();
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert!(!cache.has_sweeper());
    }

    #[test]
    fn test_store_set_and_get() {
        let (cache, _) = manual_cache();

        assert!(cache.set("key1".to_string(), "value1".to_string(), TTL));

        assert_eq!(cache.get("key1"), Ok("value1".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let (cache, _) = manual_cache();
        assert_eq!(cache.get("nonexistent"), Err(CacheError::KeyNotFound));
    }

    #[test]
    fn test_store_set_same_value_is_noop() {
        let (cache, clock) = manual_cache();

        assert!(cache.set("key1".to_string(), "value1".to_string(), TTL));
        clock.advance(Duration::from_secs(6));
        assert!(!cache.set("key1".to_string(), "value1".to_string(), TTL));

        // The no-op did not refresh the timestamp
        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.get("key1"), Err(CacheError::TimedOut));
        assert_eq!(cache.stats().inserts, 1);
    }

    #[test]
    fn test_store_overwrite() {
        let (cache, _) = manual_cache();

        assert!(cache.set("key1".to_string(), "value1".to_string(), TTL));
        assert!(cache.set("key1".to_string(), "value2".to_string(), TTL));

        assert_eq!(cache.get("key1"), Ok("value2".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_set_replaces_expired_equal_value() {
        let (cache, clock) = manual_cache();

        cache.set("key1".to_string(), "value1".to_string(), TTL);
        clock.advance(TTL * 2);

        assert!(cache.set("key1".to_string(), "value1".to_string(), TTL));
        assert_eq!(cache.get("key1"), Ok("value1".to_string()));
    }

    #[test]
    fn test_store_ttl_expiration() {
        let (cache, clock) = manual_cache();

        cache.set("key1".to_string(), "value1".to_string(), TTL);
        assert!(cache.get("key1").is_ok());

        clock.advance(TTL + Duration::from_millis(1));

        assert_eq!(cache.get("key1"), Err(CacheError::TimedOut));
        assert_eq!(cache.get("key1"), Err(CacheError::KeyNotFound));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_live_entry_is_returned_not_expired() {
        let (cache, clock) = manual_cache();

        cache.set("key1".to_string(), "value1".to_string(), TTL);
        clock.advance(TTL - Duration::from_millis(1));

        // Still inside its TTL: must come back, and must stay stored
        assert_eq!(cache.get("key1"), Ok("value1".to_string()));
        assert!(cache.exists("key1"));
    }

    #[test]
    fn test_store_get_refreshes_ttl() {
        let (cache, clock) = manual_cache();

        cache.set("key1".to_string(), "value1".to_string(), TTL);
        clock.advance(Duration::from_secs(8));
        assert!(cache.get("key1").is_ok());

        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.get("key1"), Ok("value1".to_string()));
    }

    #[test]
    fn test_store_zero_ttl_never_expires() {
        let (cache, clock) = manual_cache();

        cache.set("key1".to_string(), "value1".to_string(), Duration::ZERO);
        clock.advance(Duration::from_secs(365 * 24 * 3600));

        assert_eq!(cache.get("key1"), Ok("value1".to_string()));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_store_exists_ignores_expiry() {
        let (cache, clock) = manual_cache();

        cache.set("key1".to_string(), "value1".to_string(), TTL);
        clock.advance(TTL * 3);

        assert!(cache.exists("key1"));
        assert!(!cache.exists("key2"));
    }

    #[test]
    fn test_store_delete() {
        let (cache, _) = manual_cache();

        cache.set("key1".to_string(), "value1".to_string(), TTL);

        assert!(cache.delete("key1"));
        assert!(cache.is_empty());
        assert_eq!(cache.get("key1"), Err(CacheError::KeyNotFound));
    }

    #[test]
    fn test_store_delete_nonexistent() {
        let (cache, _) = manual_cache();

        assert!(!cache.delete("nonexistent"));
        assert_eq!(cache.stats().deletes, 0);
    }

    #[test]
    fn test_store_cleanup_by_value() {
        let (cache, _) = manual_cache();

        cache.set("a".to_string(), "keep".to_string(), TTL);
        cache.set("b".to_string(), "drop".to_string(), TTL);
        cache.set("c".to_string(), "drop".to_string(), Duration::ZERO);

        let removed = cache.cleanup(|entry| entry.value() == "drop");

        assert_eq!(removed, 2);
        assert_eq!(cache.get("a"), Ok("keep".to_string()));
        assert_eq!(cache.get("b"), Err(CacheError::KeyNotFound));
        assert_eq!(cache.get("c"), Err(CacheError::KeyNotFound));
    }

    #[test]
    fn test_store_cleanup_by_entry_metadata() {
        let (cache, _) = manual_cache();

        cache.set("pinned".to_string(), "v".to_string(), Duration::ZERO);
        cache.set("short".to_string(), "v".to_string(), Duration::from_secs(1));

        let removed = cache.cleanup(|entry| entry.never_expires());

        assert_eq!(removed, 1);
        assert!(!cache.exists("pinned"));
        assert!(cache.exists("short"));
    }

    #[test]
    fn test_store_purge_expired() {
        let (cache, clock) = manual_cache();

        cache.set("key1".to_string(), "value1".to_string(), Duration::from_secs(1));
        cache.set("key2".to_string(), "value2".to_string(), TTL);

        clock.advance(Duration::from_secs(2));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("key2").is_ok());
        assert_eq!(cache.stats().swept, 1);
    }

    #[test]
    fn test_remove_expired_spares_refreshed_entry() {
        let (cache, clock) = manual_cache();

        cache.set("key1".to_string(), "old".to_string(), Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));
        let snapshot = cache.expired_keys();

        // Replaced between snapshot and removal
        cache.set("key1".to_string(), "new".to_string(), TTL);

        assert_eq!(cache.remove_expired(&snapshot), 0);
        assert_eq!(cache.get("key1"), Ok("new".to_string()));
    }

    #[test]
    fn test_store_clear() {
        let (cache, _) = manual_cache();

        cache.set("a".to_string(), "1".to_string(), TTL);
        cache.set("b".to_string(), "2".to_string(), TTL);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.stats().deletes, 2);
    }

    #[test]
    fn test_store_stats() {
        let (cache, clock) = manual_cache();

        cache.set("key1".to_string(), "value1".to_string(), TTL);
        cache.set("key2".to_string(), "value2".to_string(), Duration::from_secs(1));
        cache.get("key1").unwrap(); // hit
        let _ = cache.get("nonexistent"); // miss
        clock.advance(Duration::from_secs(2));
        let _ = cache.get("key2"); // expired

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.inserts, 2);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_clones_share_storage() {
        let (cache, _) = manual_cache();
        let other = cache.clone();

        cache.set("key1".to_string(), "value1".to_string(), TTL);

        assert_eq!(other.get("key1"), Ok("value1".to_string()));
    }

    #[test]
    fn test_sweeper_slot_is_exclusive() {
        let (cache, _) = manual_cache();

        assert!(cache.try_claim_sweeper());
        assert!(!cache.try_claim_sweeper());
        cache.release_sweeper();
        assert!(cache.try_claim_sweeper());
    }

    #[test]
    fn test_weak_handle_does_not_keep_cache_alive() {
        let (cache, _) = manual_cache();
        let weak = cache.downgrade();

        assert!(weak.upgrade().is_some());
        drop(cache);
        assert!(weak.upgrade().is_none());
    }
}
