//! Error types for the cache
//!
//! Provides the lookup error taxonomy using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors returned by [`TtlCache::get`](crate::cache::TtlCache::get).
///
/// Both variants are recoverable in the same way: compute the value and
/// `set` it again. No other operation on the cache can fail.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// The key was never set, or has already been removed
    #[error("key not found")]
    KeyNotFound,

    /// The key existed but its TTL had elapsed; the entry is gone after this call
    #[error("key timed out")]
    TimedOut,
}

impl CacheError {
    /// Returns true for either kind of cache miss.
    ///
    /// Callers that do not care why a lookup failed can use this instead of
    /// matching both variants.
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::KeyNotFound | CacheError::TimedOut)
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache lookups.
pub type Result<T> = std::result::Result<T, CacheError>;
