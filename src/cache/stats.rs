//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! coalesced fetches.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of reads served from a fresh entry
    pub hits: u64,
    /// Number of reads that triggered a fetch (absent or expired)
    pub misses: u64,
    /// Number of entries evicted by the capacity bound
    pub evictions: u64,
    /// Number of callers that piggybacked on an in-flight fetch
    pub coalesced: u64,
    /// Current number of entries
    pub size: usize,
    /// Rough memory footprint of the stored entries in bytes
    pub approx_bytes: usize,
}

impl CacheStats {
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the cache hit rate: hits / (hits + misses), 0.0 when idle.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_coalesced(&mut self) {
        self.coalesced += 1;
    }
}
