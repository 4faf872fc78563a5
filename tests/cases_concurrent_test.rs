//! Concurrent access across many shards and tasks (spec.md §8 seed case,
//! component D's per-shard locking).

use std::sync::Arc;

use corecache::{Cache, Config};

fn cfg() -> Config {
    Config {
        shard_count: 64,
        cleanup_interval_ms: 0,
        ..Config::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_sets_across_many_keys_all_land() {
    let cache: Arc<Cache<Vec<u8>>> = Cache::new(cfg()).unwrap();

    let mut handles = Vec::new();
    for t in 0..16 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..200 {
                let key = format!("t{t}-k{i}");
                cache.set(&key, vec![t as u8], None).unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(cache.len(), 16 * 200);
    for t in 0..16 {
        for i in 0..200 {
            assert_eq!(cache.get(&format!("t{t}-k{i}")).unwrap(), Some(vec![t as u8]));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_hits_on_the_same_key_are_all_consistent() {
    let cache: Arc<Cache<Vec<u8>>> = Cache::new(cfg()).unwrap();
    cache.set("shared", b"value".to_vec(), None).unwrap();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..100 {
                assert_eq!(cache.get("shared").unwrap(), Some(b"value".to_vec()));
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_set_and_delete_on_disjoint_keys_never_panics() {
    let cache: Arc<Cache<Vec<u8>>> = Cache::new(cfg()).unwrap();

    let setter = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for i in 0..1_000 {
                cache.set(&format!("k{i}"), vec![1], None).unwrap();
            }
        })
    };
    let deleter = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for i in 0..1_000 {
                let _ = cache.delete(&format!("k{i}"));
            }
        })
    };

    setter.await.unwrap();
    deleter.await.unwrap();
    // No assertion on final contents (order between the two tasks is
    // unspecified); the test's purpose is absence of a panic/deadlock.
}
