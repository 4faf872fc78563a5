//! Admission gate behaviour, independent of the eviction policy in use
//! (spec.md §8, the Count-Min-Sketch admission subsystem).

use corecache::{AdmissionPolicy, Cache, CacheError, Config, EvictionPolicy};

#[tokio::test]
async fn test_admission_policy_none_never_rejects_inserts() {
    let cache: std::sync::Arc<Cache<Vec<u8>>> = Cache::new(Config {
        shard_count: 4,
        max_entries: 4,
        cleanup_interval_ms: 0,
        admission_policy: AdmissionPolicy::None,
        ..Config::default()
    })
    .unwrap();
    for i in 0..50 {
        assert!(cache.set(&format!("k{i}"), vec![1], None).is_ok());
    }
    assert!(cache.len() <= 4);
}

#[tokio::test]
async fn test_count_min_admission_can_reject_a_cold_key_at_capacity() {
    let cache: std::sync::Arc<Cache<Vec<u8>>> = Cache::new(Config {
        shard_count: 1,
        max_entries: 4,
        cleanup_interval_ms: 0,
        eviction_policy: EvictionPolicy::Lfu,
        admission_policy: AdmissionPolicy::CountMin,
        sketch_depth: 4,
        sketch_width: 64,
        ..Config::default()
    })
    .unwrap();

    // Fill to capacity and make every resident key very hot.
    for i in 0..4 {
        cache.set(&format!("hot-{i}"), vec![1], None).unwrap();
    }
    for _ in 0..50 {
        for i in 0..4 {
            cache.get(&format!("hot-{i}")).unwrap();
        }
    }

    // A never-before-seen key challenges a hot resident and should lose.
    let result = cache.set("cold", vec![2], None);
    assert!(matches!(result, Err(CacheError::AdmissionDenied)));
    assert_eq!(cache.get("cold").unwrap(), None);
    // The resident set must be untouched by the rejected challenger.
    for i in 0..4 {
        assert_eq!(cache.get(&format!("hot-{i}")).unwrap(), Some(vec![1]));
    }
}

#[tokio::test]
async fn test_w_tiny_lfu_does_not_build_a_separate_admitter_on_top_of_its_own() {
    // When eviction_policy is WTinyLfu the façade must not double-gate
    // admission; inserts should still succeed freely below capacity.
    let cache: std::sync::Arc<Cache<Vec<u8>>> = Cache::new(Config {
        shard_count: 4,
        max_entries: 16,
        cleanup_interval_ms: 0,
        eviction_policy: EvictionPolicy::WTinyLfu,
        admission_policy: AdmissionPolicy::CountMin,
        ..Config::default()
    })
    .unwrap();
    for i in 0..10 {
        assert!(cache.set(&format!("k{i}"), vec![1], None).is_ok());
    }
    assert_eq!(cache.len(), 10);
}

#[tokio::test]
async fn test_overwriting_an_existing_key_never_runs_the_admission_contest() {
    let cache: std::sync::Arc<Cache<Vec<u8>>> = Cache::new(Config {
        shard_count: 1,
        max_entries: 1,
        cleanup_interval_ms: 0,
        eviction_policy: EvictionPolicy::Lfu,
        admission_policy: AdmissionPolicy::CountMin,
        ..Config::default()
    })
    .unwrap();
    cache.set("only", vec![1], None).unwrap();
    for _ in 0..20 {
        cache.get("only").unwrap();
    }
    // An overwrite of the sole resident key must always succeed, even
    // though the cache is "at capacity" by its own accounting.
    assert!(cache.set("only", vec![2], None).is_ok());
    assert_eq!(cache.get("only").unwrap(), Some(vec![2]));
}
