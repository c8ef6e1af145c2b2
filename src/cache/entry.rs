//! Cache Entry Module
//!
//! Defines the structure of individual cache entries with TTL support.
//!
//! Entries are stamped with `tokio::time::Instant` rather than wall-clock
//! time so TTL behavior is driven by the runtime clock and can be tested
//! under paused time.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// A single cached value with its insertion time and time-to-live.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The stored value
    pub value: T,
    /// When the entry was inserted
    pub inserted_at: Instant,
    /// How long the entry stays fresh
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// Creates a new cache entry stamped with the current runtime time.
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired once the current time is
    /// greater than or equal to `inserted_at + ttl`, so a read exactly at
    /// the TTL boundary is treated as a miss.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.inserted_at + self.ttl
    }

    /// Returns the remaining freshness window, zero if already expired.
    pub fn ttl_remaining(&self) -> Duration {
        (self.inserted_at + self.ttl).saturating_duration_since(Instant::now())
    }
}
