//! Cache Store Module
//!
//! The main cache engine: a bounded map with TTL expiry, deterministic
//! least-recently-inserted eviction, and single-flight fetch coalescing.
//!
//! `get_or_fetch` is the only read path. A hit returns the cached value with
//! no I/O; a miss (absent or expired) runs the supplied fetcher exactly once
//! per key, no matter how many callers race on it, and every coalesced
//! caller observes the same outcome. A failed fetch stores nothing, so the
//! next access retries.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};

use crate::cache::{CacheEntry, CacheStats, MAX_KEY_LENGTH};
use crate::error::{CoreError, Result};

// == Entity Cache ==
/// Bounded TTL cache with fetch coalescing.
///
/// Cheap to clone; clones share the same underlying store.
#[derive(Debug, Clone)]
pub struct EntityCache<T: Clone + Send + 'static> {
    inner: Arc<Mutex<CacheInner<T>>>,
}

#[derive(Debug)]
struct CacheInner<T: Clone> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<T>>,
    /// Insertion order, front = oldest (next eviction candidate)
    order: VecDeque<String>,
    /// In-flight fetches; waiters subscribe to the sender for the outcome
    pending: HashMap<String, broadcast::Sender<std::result::Result<T, String>>>,
    /// Performance counters
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl<T: Clone + Send + 'static> EntityCache<T> {
    // == Constructor ==
    /// Creates a new cache holding at most `max_entries` values.
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                pending: HashMap::new(),
                stats: CacheStats::new(),
                max_entries,
            })),
        }
    }

    // == Get Or Fetch ==
    /// Returns the cached value for `key`, fetching it on a miss.
    ///
    /// On a hit (entry exists and is unexpired) the cached value is returned
    /// without calling `fetch`. On a miss the fetcher runs and its result is
    /// stored with a fresh insertion time. Concurrent callers for the same
    /// key do not trigger duplicate fetches; they wait on the in-flight one
    /// and share its result. If the fetcher fails, nothing is stored and the
    /// error is propagated to every waiting caller.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if key.len() > MAX_KEY_LENGTH {
            return Err(CoreError::Internal(format!(
                "cache key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        {
            let mut inner = self.inner.lock().await;

            let fresh = match inner.entries.get(key) {
                Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
                Some(_) => None,
                None => None,
            };
            if let Some(value) = fresh {
                inner.stats.record_hit();
                return Ok(value);
            }

            // Expired entries are dropped up front so a failed refetch
            // cannot leave stale data behind.
            if inner.entries.contains_key(key) {
                inner.remove(key);
            }

            if let Some(tx) = inner.pending.get(key) {
                let mut rx = tx.subscribe();
                inner.stats.record_coalesced();
                drop(inner);

                return match rx.recv().await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(message)) => Err(CoreError::Fetch(message)),
                    Err(_) => Err(CoreError::Internal(
                        "in-flight fetch dropped without a result".to_string(),
                    )),
                };
            }

            inner.stats.record_miss();
            let (tx, _) = broadcast::channel(1);
            inner.pending.insert(key.to_string(), tx);
        }

        let outcome = fetch().await;

        let mut inner = self.inner.lock().await;
        let waiters = inner.pending.remove(key);

        match outcome {
            Ok(value) => {
                inner.insert(key.to_string(), value.clone(), ttl);
                if let Some(tx) = waiters {
                    let _ = tx.send(Ok(value.clone()));
                }
                Ok(value)
            }
            Err(error) => {
                if let Some(tx) = waiters {
                    let _ = tx.send(Err(error.to_string()));
                }
                Err(error)
            }
        }
    }

    // == Invalidate ==
    /// Drops the entry for `key`, if present.
    pub async fn invalidate(&self, key: &str) {
        let mut inner = self.inner.lock().await;
        inner.remove(key);
    }

    // == Clear ==
    /// Drops every entry. Pending fetches are unaffected.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.order.clear();
    }

    // == Purge Expired ==
    /// Removes all expired entries, returning how many were dropped.
    ///
    /// Called by the scheduler's cleanup task.
    pub async fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock().await;

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }

        expired.len()
    }

    // == Length ==
    /// Current number of entries.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    // == Stats ==
    /// Snapshot of current statistics including size and approximate memory.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        let mut stats = inner.stats.clone();
        stats.size = inner.entries.len();
        stats.approx_bytes = inner
            .entries
            .keys()
            .map(|k| k.len() + mem::size_of::<CacheEntry<T>>())
            .sum();
        stats
    }
}

impl<T: Clone> CacheInner<T> {
    /// Inserts a value, evicting the least-recently-inserted entry when the
    /// capacity bound would be exceeded. Overwriting counts as re-insertion.
    /// A zero capacity stores nothing; every read becomes a fetch.
    fn insert(&mut self, key: String, value: T, ttl: Duration) {
        if self.max_entries == 0 {
            return;
        }

        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        } else if self.entries.len() >= self.max_entries {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                self.stats.record_eviction();
            }
        }

        self.entries.insert(key.clone(), CacheEntry::new(value, ttl));
        self.order.push_back(key);
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}
