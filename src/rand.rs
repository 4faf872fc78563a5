//! Lock-free, allocation-free random helpers for sampling-based eviction.
//!
//! Sampled LFU (policy I) and the sampling variant of the sharded store's
//! eviction path need cheap random draws without a global lock. Each
//! "shard" here is an independent SplitMix64 generator; callers round-robin
//! across them, so contention is spread the same way the sharded store
//! spreads key contention.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

struct Shard {
    state: AtomicU64,
}

struct Generators {
    shards: Vec<Shard>,
    mask: u32,
}

static GENERATORS: OnceLock<Generators> = OnceLock::new();
static NEXT_SHARD: AtomicU32 = AtomicU32::new(0);

fn mix(z: u64) -> u64 {
    let mut z = z;
    z ^= z >> 30;
    z = z.wrapping_mul(0xbf58476d1ce4e5b9);
    z ^= z >> 27;
    z = z.wrapping_mul(0x94d049bb133111eb);
    z ^= z >> 31;
    z
}

fn seed_from(seed: i64) -> u64 {
    let z = mix((seed as u64).wrapping_add(0x9e3779b97f4a7c15));
    if z == 0 {
        0x9e3779b97f4a7c15
    } else {
        z
    }
}

fn generators() -> &'static Generators {
    GENERATORS.get_or_init(|| {
        let n = (num_cpus::get() * 4).max(1).next_power_of_two();
        let mut seed = seed_from(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as i64,
        );
        let mut shards = Vec::with_capacity(n);
        for _ in 0..n {
            seed = mix(seed.wrapping_add(0x9e3779b97f4a7c15));
            let state = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
            shards.push(Shard {
                state: AtomicU64::new(state),
            });
        }
        Generators {
            shards,
            mask: (n - 1) as u32,
        }
    })
}

fn next_u64() -> u64 {
    let g = generators();
    let idx = (NEXT_SHARD.fetch_add(1, Ordering::Relaxed) & g.mask) as usize;
    let s = &g.shards[idx].state;
    loop {
        let old = s.load(Ordering::Relaxed);
        let x = old.wrapping_add(0x9e3779b97f4a7c15);
        if s.compare_exchange(old, x, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            return mix(x);
        }
    }
}

/// Uniform random float in `[0, 1)` using the top 53 random bits.
pub fn float64() -> f64 {
    const INV_2_53: f64 = 1.0 / 9_007_199_254_740_992.0;
    ((next_u64() >> 11) as f64) * INV_2_53
}

/// Uniform random index in `[0, n)`. Returns 0 when `n == 0`.
pub fn index(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    (next_u64() % n as u64) as usize
}

/// Draws `k` distinct indices from `[0, n)` via a Fisher-Yates partial
/// shuffle over a scratch buffer, without allocating beyond that buffer.
/// Used by sampled LFU (policy I) to pick eviction candidates uniformly.
pub fn sample_indices(n: usize, k: usize) -> Vec<usize> {
    let k = k.min(n);
    let mut pool: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = i + index(n - i);
        pool.swap(i, j);
    }
    pool.truncate(k);
    pool
}
