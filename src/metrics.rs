//! Metrics core (component L).
//!
//! Grounded on the teacher's `workers/evictor/counters.rs` and
//! `workers/lifetimer/counters.rs`: plain atomic-counter structs with a
//! `snapshot`-style read, not wired to an exporter. `metrics::MetricsLevel`
//! gates how much bookkeeping a hot-path call pays for, the way the
//! teacher's own metrics levels gate `metrics/meter.rs`'s named-counter
//! surface — reimplemented here as self-contained atomics since wire export
//! formats (Prometheus/OTel) are out of scope for this crate.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::config::MetricsLevel;

/// Logarithmically spaced latency histogram, 1 µs to 10 s by default.
struct Histogram {
    bounds_ns: Vec<i64>,
    buckets: Vec<AtomicU64>,
}

impl Histogram {
    fn new(bucket_count: usize) -> Self {
        let bucket_count = bucket_count.max(1);
        let low_ns = 1_000i64; // 1 microsecond
        let high_ns = 10_000_000_000i64; // 10 seconds
        let ratio = (high_ns as f64 / low_ns as f64).powf(1.0 / bucket_count as f64);

        let mut bounds_ns = Vec::with_capacity(bucket_count);
        let mut bound = low_ns as f64;
        for _ in 0..bucket_count {
            bounds_ns.push(bound.round() as i64);
            bound *= ratio;
        }

        Self {
            buckets: (0..=bucket_count).map(|_| AtomicU64::new(0)).collect(),
            bounds_ns,
        }
    }

    fn record(&self, latency_ns: i64) {
        let idx = match self.bounds_ns.binary_search(&latency_ns) {
            Ok(i) => i,
            Err(i) => i,
        };
        self.buckets[idx.min(self.buckets.len() - 1)].fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> Vec<(i64, u64)> {
        self.bounds_ns
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

struct MinMax {
    min: AtomicI64,
    max: AtomicI64,
}

impl MinMax {
    fn new() -> Self {
        Self {
            min: AtomicI64::new(i64::MAX),
            max: AtomicI64::new(i64::MIN),
        }
    }

    fn observe(&self, value: i64) {
        let mut cur = self.min.load(Ordering::Relaxed);
        while value < cur {
            match self
                .min
                .compare_exchange_weak(cur, value, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
        let mut cur = self.max.load(Ordering::Relaxed);
        while value > cur {
            match self
                .max
                .compare_exchange_weak(cur, value, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }

    fn snapshot(&self) -> (i64, i64) {
        (
            self.min.load(Ordering::Relaxed),
            self.max.load(Ordering::Relaxed),
        )
    }
}

#[derive(Default)]
struct ShardCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// A read-consistent view of the counters at one instant (spec.md §3 "stats
/// snapshot").
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub updates: u64,
    pub overwrites: u64,
    pub rejections: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entry_count: i64,
    pub byte_size: i64,
    pub dropped_access_events: u64,
    pub avg_get_latency_ns: f64,
    pub avg_set_latency_ns: f64,
    pub avg_delete_latency_ns: f64,
    pub per_shard_hits: Option<Vec<u64>>,
    pub per_shard_misses: Option<Vec<u64>>,
    pub latency_histogram_ns: Option<Vec<(i64, u64)>>,
}

/// Atomic counters plus optional detailed-level bookkeeping, gated by
/// `MetricsLevel`. Disabled level still accepts every `record_*` call (they
/// are cheap no-ops) so the façade never has to branch on the level itself.
pub struct Metrics {
    level: MetricsLevel,

    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    updates: AtomicU64,
    overwrites: AtomicU64,
    rejections: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,

    get_latency_sum_ns: AtomicI64,
    get_latency_count: AtomicU64,
    set_latency_sum_ns: AtomicI64,
    set_latency_count: AtomicU64,
    delete_latency_sum_ns: AtomicI64,
    delete_latency_count: AtomicU64,
    get_minmax: MinMax,

    histogram: Option<Histogram>,
    shard_counters: Option<Mutex<Vec<ShardCounters>>>,
}

impl Metrics {
    pub fn new(level: MetricsLevel, histogram_buckets: usize, shard_count: usize, enable_shard_metrics: bool) -> Self {
        let detailed = level == MetricsLevel::Detailed;
        Self {
            level,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            overwrites: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            get_latency_sum_ns: AtomicI64::new(0),
            get_latency_count: AtomicU64::new(0),
            set_latency_sum_ns: AtomicI64::new(0),
            set_latency_count: AtomicU64::new(0),
            delete_latency_sum_ns: AtomicI64::new(0),
            delete_latency_count: AtomicU64::new(0),
            get_minmax: MinMax::new(),
            histogram: detailed.then(|| Histogram::new(histogram_buckets)),
            shard_counters: (detailed && enable_shard_metrics)
                .then(|| Mutex::new((0..shard_count).map(|_| ShardCounters::default()).collect())),
        }
    }

    fn enabled(&self) -> bool {
        self.level != MetricsLevel::Disabled
    }

    pub fn record_hit(&self, shard_idx: usize, latency_ns: i64) {
        if !self.enabled() {
            return;
        }
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.get_latency_sum_ns.fetch_add(latency_ns, Ordering::Relaxed);
        self.get_latency_count.fetch_add(1, Ordering::Relaxed);
        self.get_minmax.observe(latency_ns);
        if let Some(h) = &self.histogram {
            h.record(latency_ns);
        }
        if let Some(shards) = &self.shard_counters {
            shards.lock().unwrap()[shard_idx].hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_miss(&self, shard_idx: usize, latency_ns: i64) {
        if !self.enabled() {
            return;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.get_latency_sum_ns.fetch_add(latency_ns, Ordering::Relaxed);
        self.get_latency_count.fetch_add(1, Ordering::Relaxed);
        if let Some(shards) = &self.shard_counters {
            shards.lock().unwrap()[shard_idx].misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_set(&self, overwrote: bool, latency_ns: i64) {
        if !self.enabled() {
            return;
        }
        self.sets.fetch_add(1, Ordering::Relaxed);
        if overwrote {
            self.overwrites.fetch_add(1, Ordering::Relaxed);
            self.updates.fetch_add(1, Ordering::Relaxed);
        }
        self.set_latency_sum_ns.fetch_add(latency_ns, Ordering::Relaxed);
        self.set_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self, latency_ns: i64) {
        if !self.enabled() {
            return;
        }
        self.delete_latency_sum_ns.fetch_add(latency_ns, Ordering::Relaxed);
        self.delete_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        if self.enabled() {
            self.rejections.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_eviction(&self) {
        if self.enabled() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_evictions(&self, n: u64) {
        if self.enabled() && n > 0 {
            self.evictions.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn record_expiration(&self) {
        if self.enabled() {
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_expirations(&self, n: u64) {
        if self.enabled() && n > 0 {
            self.expirations.fetch_add(n, Ordering::Relaxed);
        }
    }

    fn avg(sum: &AtomicI64, count: &AtomicU64) -> f64 {
        let c = count.load(Ordering::Relaxed);
        if c == 0 {
            0.0
        } else {
            sum.load(Ordering::Relaxed) as f64 / c as f64
        }
    }

    /// Takes a consistent snapshot of every counter. `entry_count`/`byte_size`
    /// come from the store, not from this struct, since they are already
    /// tracked there; the façade fills them in after calling this.
    pub fn snapshot(&self) -> StatsSnapshot {
        let (per_shard_hits, per_shard_misses) = match &self.shard_counters {
            Some(shards) => {
                let shards = shards.lock().unwrap();
                (
                    Some(shards.iter().map(|s| s.hits.load(Ordering::Relaxed)).collect()),
                    Some(shards.iter().map(|s| s.misses.load(Ordering::Relaxed)).collect()),
                )
            }
            None => (None, None),
        };

        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            overwrites: self.overwrites.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entry_count: 0,
            byte_size: 0,
            dropped_access_events: 0,
            avg_get_latency_ns: Self::avg(&self.get_latency_sum_ns, &self.get_latency_count),
            avg_set_latency_ns: Self::avg(&self.set_latency_sum_ns, &self.set_latency_count),
            avg_delete_latency_ns: Self::avg(&self.delete_latency_sum_ns, &self.delete_latency_count),
            per_shard_hits,
            per_shard_misses,
            latency_histogram_ns: self.histogram.as_ref().map(|h| h.snapshot()),
        }
    }
}
