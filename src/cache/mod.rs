//! Entity Cache Module
//!
//! Bounded, TTL-based cache sitting in front of storage reads. Absorbs read
//! pressure from both the expiry scheduler and interactive handlers, and
//! coalesces concurrent fetches for the same key into a single in-flight call.

mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::EntityCache;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
