//! TTL Cache - An in-process concurrent key/value cache
//!
//! Entries carry a time-to-live and expire lazily on lookup; an optional
//! background sweep reclaims entries that are never read again.
//!
//! ```
//! use std::time::Duration;
//! use ttl_cache::{CacheError, TtlCache};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache: TtlCache<String, u32> = TtlCache::new();
//! let sweeper = cache.spawn_sweeper().expect("sweeper starts once");
//!
//! cache.set("answer".to_string(), 42, Duration::from_secs(30));
//! assert_eq!(cache.get("answer"), Ok(42));
//! assert_eq!(cache.get("question"), Err(CacheError::KeyNotFound));
//!
//! sweeper.stop().await;
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheEntry, CacheStats, TtlCache, NO_EXPIRY};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::SweepHandle;
