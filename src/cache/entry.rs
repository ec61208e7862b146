//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// == Cache Entry ==
/// A stored value together with its last access time and TTL.
///
/// Timestamps are kept as nanosecond ticks relative to the owning cache's
/// clock origin. The last access tick is atomic so a lookup can refresh it
/// while holding only shared access to the map.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// The stored value
    value: V,
    /// Last access, in ticks since `origin`
    last_access: AtomicU64,
    /// Time to live, zero = no expiration
    ttl: Duration,
    /// Clock origin of the owning cache
    origin: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry last accessed at `now` ticks past `origin`.
    pub(crate) fn new(value: V, ttl: Duration, origin: Instant, now: u64) -> Self {
        Self {
            value,
            last_access: AtomicU64::new(now),
            ttl,
            origin,
        }
    }

    /// Returns the stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns the configured TTL (zero when the entry never expires).
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns true if the entry was stored without a TTL.
    pub fn never_expires(&self) -> bool {
        self.ttl.is_zero()
    }

    /// Returns the instant of the last set or successful get.
    pub fn last_access(&self) -> Instant {
        self.origin + Duration::from_nanos(self.last_access_ticks())
    }

    /// Returns the instant after which the entry counts as expired, or None
    /// if it never expires.
    pub fn expires_at(&self) -> Option<Instant> {
        if self.never_expires() {
            None
        } else {
            self.last_access().checked_add(self.ttl)
        }
    }

    pub(crate) fn last_access_ticks(&self) -> u64 {
        self.last_access.load(Ordering::Acquire)
    }

    // == Touch ==
    /// Refreshes the last access time. Never moves it backwards.
    pub(crate) fn touch(&self, now: u64) {
        self.last_access.fetch_max(now, Ordering::AcqRel);
    }

    // == Is Expired ==
    /// Checks expiry at `now` ticks.
    ///
    /// Boundary condition: the entry is expired only once `last_access + ttl`
    /// lies strictly before `now`. An entry evaluated exactly at its deadline
    /// is still live.
    pub(crate) fn is_expired_at(&self, now: u64) -> bool {
        if self.never_expires() {
            return false;
        }
        self.last_access_ticks().saturating_add(duration_to_ticks(self.ttl)) < now
    }
}

// == Utility Functions ==
/// Converts a duration to nanosecond ticks, saturating at `u64::MAX`.
pub(crate) fn duration_to_ticks(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
