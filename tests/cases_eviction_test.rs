//! Capacity-bounded eviction under each policy (spec.md §8 seed cases,
//! components F-J).

use corecache::{Cache, Config, EvictionPolicy};

fn small_cfg(policy: EvictionPolicy) -> Config {
    Config {
        shard_count: 4,
        max_entries: 8,
        cleanup_interval_ms: 0,
        eviction_policy: policy,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_lru_eviction_keeps_the_cache_at_or_below_capacity() {
    let cache: std::sync::Arc<Cache<Vec<u8>>> = Cache::new(small_cfg(EvictionPolicy::Lru)).unwrap();
    for i in 0..200 {
        cache.set(&format!("k{i}"), vec![0u8; 4], None).unwrap();
    }
    assert!(cache.len() <= 8);
}

#[tokio::test]
async fn test_lru_evicts_the_least_recently_used_key_first() {
    let cache: std::sync::Arc<Cache<Vec<u8>>> = Cache::new(Config {
        shard_count: 1,
        max_entries: 2,
        cleanup_interval_ms: 0,
        eviction_policy: EvictionPolicy::Lru,
        ..Config::default()
    })
    .unwrap();

    cache.set("a", vec![1], None).unwrap();
    cache.set("b", vec![2], None).unwrap();
    // Touch "a" so "b" becomes the least recently used.
    assert_eq!(cache.get("a").unwrap(), Some(vec![1]));
    cache.set("c", vec![3], None).unwrap();

    assert_eq!(cache.get("b").unwrap(), None, "b should have been evicted as the LRU entry");
    assert_eq!(cache.get("a").unwrap(), Some(vec![1]));
    assert_eq!(cache.get("c").unwrap(), Some(vec![3]));
}

#[tokio::test]
async fn test_lfu_bucket_eviction_keeps_the_cache_at_or_below_capacity() {
    let cache: std::sync::Arc<Cache<Vec<u8>>> = Cache::new(small_cfg(EvictionPolicy::Lfu)).unwrap();
    for i in 0..200 {
        cache.set(&format!("k{i}"), vec![0u8; 4], None).unwrap();
    }
    assert!(cache.len() <= 8);
}

#[tokio::test]
async fn test_lfu_bucket_prefers_evicting_a_never_accessed_key_over_a_hot_one() {
    let cache: std::sync::Arc<Cache<Vec<u8>>> = Cache::new(Config {
        shard_count: 1,
        max_entries: 2,
        cleanup_interval_ms: 0,
        eviction_policy: EvictionPolicy::Lfu,
        ..Config::default()
    })
    .unwrap();

    cache.set("hot", vec![1], None).unwrap();
    cache.set("cold", vec![2], None).unwrap();
    for _ in 0..10 {
        assert_eq!(cache.get("hot").unwrap(), Some(vec![1]));
    }
    cache.set("new", vec![3], None).unwrap();

    assert_eq!(cache.get("hot").unwrap(), Some(vec![1]), "a frequently hit key should survive");
}

#[tokio::test]
async fn test_lfu_heap_eviction_keeps_the_cache_at_or_below_capacity() {
    let cache: std::sync::Arc<Cache<Vec<u8>>> = Cache::new(small_cfg(EvictionPolicy::LfuHeap)).unwrap();
    for i in 0..200 {
        cache.set(&format!("k{i}"), vec![0u8; 4], None).unwrap();
    }
    assert!(cache.len() <= 8);
}

#[tokio::test]
async fn test_sampled_lfu_eviction_keeps_the_cache_at_or_below_capacity() {
    let cache: std::sync::Arc<Cache<Vec<u8>>> = Cache::new(Config {
        sample_size: 3,
        ..small_cfg(EvictionPolicy::SampledLfu)
    })
    .unwrap();
    for i in 0..200 {
        cache.set(&format!("k{i}"), vec![0u8; 4], None).unwrap();
    }
    assert!(cache.len() <= 8);
}

#[tokio::test]
async fn test_w_tiny_lfu_eviction_keeps_the_cache_at_or_below_capacity() {
    let cache: std::sync::Arc<Cache<Vec<u8>>> = Cache::new(small_cfg(EvictionPolicy::WTinyLfu)).unwrap();
    for i in 0..500 {
        cache.set(&format!("k{i}"), vec![0u8; 4], None).unwrap();
    }
    assert!(cache.len() <= 8);
}

#[tokio::test]
async fn test_w_tiny_lfu_resists_a_single_pass_scan_of_cold_keys() {
    // A cache warmed with a hot set that leaves headroom below capacity,
    // then hammered by a one-shot scan of many distinct cold keys, should
    // still answer hits for most of the hot set (spec.md §8's
    // scan-resistance seed case for W-TinyLFU: capacity 100, window ratio
    // 0.01, 80 hot keys, 1000 cold keys, >= 70/80 hot survivors).
    let cache: std::sync::Arc<Cache<Vec<u8>>> = Cache::new(Config {
        shard_count: 4,
        max_entries: 100,
        cleanup_interval_ms: 0,
        eviction_policy: EvictionPolicy::WTinyLfu,
        window_ratio: 0.01,
        ..Config::default()
    })
    .unwrap();

    for i in 0..80 {
        cache.set(&format!("hot-{i}"), vec![1u8], None).unwrap();
    }
    // Re-access the hot set many times so the sketch records high frequency.
    for _ in 0..20 {
        for i in 0..80 {
            cache.get(&format!("hot-{i}")).unwrap();
        }
    }

    // One-shot scan: each cold key is seen exactly once, never again.
    for i in 0..1_000 {
        cache.set(&format!("cold-{i}"), vec![2u8], None).unwrap();
    }

    let hot_survivors = (0..80)
        .filter(|i| cache.get(&format!("hot-{i}")).unwrap().is_some())
        .count();
    assert!(
        hot_survivors >= 70,
        "expected at least 70/80 hot keys to survive a cold scan, got {hot_survivors}"
    );
}
