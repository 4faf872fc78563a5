use corecache::{Cache, Config};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_set_get(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = rt.block_on(async {
        Cache::<Vec<u8>>::new(Config {
            shard_count: 256,
            max_entries: 100_000,
            cleanup_interval_ms: 0,
            ..Config::default()
        })
        .unwrap()
    });

    c.bench_function("set 1000 sequential keys", |b| {
        b.iter(|| {
            for i in 0..1000u64 {
                let key = format!("key-{i}");
                cache.set(&key, black_box(vec![0u8; 64]), None).unwrap();
            }
        })
    });

    for i in 0..1000u64 {
        cache.set(&format!("key-{i}"), vec![0u8; 64], None).unwrap();
    }

    c.bench_function("get 1000 sequential keys", |b| {
        b.iter(|| {
            for i in 0..1000u64 {
                black_box(cache.get(&format!("key-{i}")).unwrap());
            }
        })
    });
}

fn bench_eviction_pressure(c: &mut Criterion) {
    let cache = Cache::<Vec<u8>>::new(Config {
        shard_count: 64,
        max_entries: 1_000,
        eviction_policy: corecache::EvictionPolicy::WTinyLfu,
        cleanup_interval_ms: 0,
        ..Config::default()
    })
    .unwrap();

    c.bench_function("insert under constant eviction pressure", |b| {
        b.iter(|| {
            for i in 0..5_000u64 {
                let key = format!("hot-{}", i % 2_000);
                cache.set(&key, black_box(vec![0u8; 32]), None).unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_set_get, bench_eviction_pressure);
criterion_main!(benches);
