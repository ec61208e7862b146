//! Cache Module
//!
//! Provides an in-memory key/value cache with per-entry TTL expiration.

mod clock;
mod entry;
mod stats;
pub(crate) mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::TtlCache;

// == Public Constants ==
/// TTL value meaning "never expires"
pub const NO_EXPIRY: std::time::Duration = std::time::Duration::ZERO;
