//! Property-Based Tests for the Entity Cache
//!
//! Uses proptest to verify the capacity bound, eviction determinism, and
//! statistics accuracy over arbitrary operation sequences.

use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

use crate::cache::EntityCache;

// == Test Configuration ==
const TEST_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
/// Generates valid cache keys (non-empty, within length limit)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_:]{1,64}"
}

/// A sequence of cache operations for model testing
#[derive(Debug, Clone)]
enum CacheOp {
    Fetch { key: String, value: u32 },
    Invalidate { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), any::<u32>())
            .prop_map(|(key, value)| CacheOp::Fetch { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Invalidate { key }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // The number of entries never exceeds the configured capacity, no
    // matter what sequence of fetches and invalidations runs.
    #[test]
    fn prop_capacity_enforcement(ops in prop::collection::vec(cache_op_strategy(), 1..100)) {
        let rt = runtime();
        rt.block_on(async {
            let max_entries = 20;
            let cache: EntityCache<u32> = EntityCache::new(max_entries);

            for op in ops {
                match op {
                    CacheOp::Fetch { key, value } => {
                        let _ = cache
                            .get_or_fetch(&key, TEST_TTL, || async move { Ok(value) })
                            .await;
                    }
                    CacheOp::Invalidate { key } => cache.invalidate(&key).await,
                }
                prop_assert!(
                    cache.len().await <= max_entries,
                    "cache size {} exceeds capacity {}",
                    cache.len().await,
                    max_entries
                );
            }
            Ok(())
        })?;
    }

    // A fetched value reads back unchanged until it is invalidated.
    #[test]
    fn prop_roundtrip(key in valid_key_strategy(), value in any::<u32>()) {
        let rt = runtime();
        rt.block_on(async {
            let cache: EntityCache<u32> = EntityCache::new(50);

            let stored = cache
                .get_or_fetch(&key, TEST_TTL, || async move { Ok(value) })
                .await
                .unwrap();
            prop_assert_eq!(stored, value);

            // A second read must not consult the fetcher.
            let reread = cache
                .get_or_fetch(&key, TEST_TTL, || async move { Ok(value.wrapping_add(1)) })
                .await
                .unwrap();
            prop_assert_eq!(reread, value);
            Ok(())
        })?;
    }

    // Filling the cache past capacity always evicts the oldest insertion.
    #[test]
    fn prop_eviction_order(
        initial_keys in prop::collection::vec(valid_key_strategy(), 3..10),
        new_key in valid_key_strategy(),
    ) {
        let unique_keys: Vec<String> = initial_keys
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        prop_assume!(unique_keys.len() >= 2);
        prop_assume!(!unique_keys.contains(&new_key));

        let rt = runtime();
        rt.block_on(async {
            let capacity = unique_keys.len();
            let cache: EntityCache<u32> = EntityCache::new(capacity);

            for (i, key) in unique_keys.iter().enumerate() {
                let value = i as u32;
                cache
                    .get_or_fetch(key, TEST_TTL, || async move { Ok(value) })
                    .await
                    .unwrap();
            }
            prop_assert_eq!(cache.len().await, capacity);

            // One more insertion evicts the first key inserted.
            cache
                .get_or_fetch(&new_key, TEST_TTL, || async { Ok(999) })
                .await
                .unwrap();
            prop_assert_eq!(cache.len().await, capacity);

            let oldest = &unique_keys[0];
            let refetched = cache
                .get_or_fetch(oldest, TEST_TTL, || async { Ok(12345) })
                .await
                .unwrap();
            prop_assert_eq!(refetched, 12345, "oldest key should have been evicted");

            // Every other original key survived the first eviction. The
            // refetch above may itself have evicted exactly one more key.
            let stats = cache.stats().await;
            prop_assert_eq!(stats.evictions, 2);
            Ok(())
        })?;
    }

    // Hit and miss counters reflect exactly the observed outcomes.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let rt = runtime();
        rt.block_on(async {
            // Capacity large enough that eviction never skews the model.
            let cache: EntityCache<u32> = EntityCache::new(1000);
            let mut model: HashSet<String> = HashSet::new();
            let mut expected_hits = 0u64;
            let mut expected_misses = 0u64;

            for op in ops {
                match op {
                    CacheOp::Fetch { key, value } => {
                        if model.contains(&key) {
                            expected_hits += 1;
                        } else {
                            expected_misses += 1;
                            model.insert(key.clone());
                        }
                        let _ = cache
                            .get_or_fetch(&key, TEST_TTL, || async move { Ok(value) })
                            .await;
                    }
                    CacheOp::Invalidate { key } => {
                        model.remove(&key);
                        cache.invalidate(&key).await;
                    }
                }
            }

            let stats = cache.stats().await;
            prop_assert_eq!(stats.hits, expected_hits, "hits mismatch");
            prop_assert_eq!(stats.misses, expected_misses, "misses mismatch");
            prop_assert_eq!(stats.size, model.len(), "size mismatch");
            Ok(())
        })?;
    }
}
