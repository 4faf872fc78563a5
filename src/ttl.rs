//! TTL manager (component E).
//!
//! The teacher never builds an explicit expiry heap — it samples shards for
//! due entries (`storage/map/refresh.rs`). This heap-driven scavenger is new
//! code, but its background-task shape (fixed-interval tick,
//! `tokio::select!` against a shutdown token, atomic counters logged
//! periodically) is grounded on `workers/lifetimer/lifetimer.rs` and
//! `workers/lifetimer/counters.rs`, stripped of the governor-driven
//! dynamic-replica scaling those files layer on top (out of scope here).

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::heap::ExpiryHeap;
use crate::store::Store;

#[derive(Default)]
pub struct TtlCounters {
    pub scans_total: AtomicI64,
    pub scans_hit: AtomicI64,
    pub scans_miss: AtomicI64,
    pub expired_removed: AtomicI64,
    pub sweeps_total: AtomicI64,
}

impl TtlCounters {
    pub fn snapshot_and_reset(&self) -> (i64, i64, i64, i64, i64) {
        (
            self.scans_total.swap(0, Ordering::Relaxed),
            self.scans_hit.swap(0, Ordering::Relaxed),
            self.scans_miss.swap(0, Ordering::Relaxed),
            self.expired_removed.swap(0, Ordering::Relaxed),
            self.sweeps_total.swap(0, Ordering::Relaxed),
        )
    }
}

/// Minimum nanoseconds an expire-at must move by before a sliding-expiration
/// touch bothers pushing a new heap node, bounding heap growth under very
/// hot keys (spec.md §4.E "minimum update precision").
const DEFAULT_MIN_SLIDE_PRECISION_NS: i64 = 1_000_000_000; // 1s

pub struct TtlManager<V> {
    heap: Mutex<ExpiryHeap>,
    store: Arc<Store<V>>,
    counters: Arc<TtlCounters>,
    min_slide_precision_ns: i64,
}

impl<V> TtlManager<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(store: Arc<Store<V>>) -> Self {
        Self {
            heap: Mutex::new(ExpiryHeap::new()),
            store,
            counters: Arc::new(TtlCounters::default()),
            min_slide_precision_ns: DEFAULT_MIN_SLIDE_PRECISION_NS,
        }
    }

    pub fn with_min_slide_precision_ns(mut self, ns: i64) -> Self {
        self.min_slide_precision_ns = ns.max(0);
        self
    }

    pub fn counters(&self) -> Arc<TtlCounters> {
        self.counters.clone()
    }

    /// Registers an expire-at for a key. Called once per `set` with a TTL;
    /// stale nodes left behind by an overwritten expire-at are discarded as
    /// no-ops when the scavenger reaches them (the store's `expire_at_ns`
    /// is the single source of truth, not the heap node itself).
    pub fn schedule(&self, fingerprint: u64, expire_at_ns: i64) {
        self.heap.lock().push(fingerprint, expire_at_ns);
    }

    /// Bumps an entry's expire-at on access (sliding expiration), debounced
    /// by `min_slide_precision_ns` so hot keys don't flood the heap.
    pub fn slide(&self, fingerprint: u64, ttl_ns: i64, now_ns: i64) {
        let new_expire_at = now_ns + ttl_ns;
        let shard = self.store.shard(fingerprint);
        let current = match shard.expire_at_ns(fingerprint) {
            Some(Some(t)) => t,
            Some(None) => return,
            None => return,
        };
        if new_expire_at - current < self.min_slide_precision_ns {
            return;
        }
        shard.set_expire_at_ns(fingerprint, Some(new_expire_at));
        self.schedule(fingerprint, new_expire_at);
    }

    /// Drains due heap entries, removing at most `max_items` expired
    /// entries from the store. Returns the number removed.
    pub fn tick(&self, now_ns: i64, max_items: u64) -> u64 {
        let mut removed = 0u64;
        let mut heap = self.heap.lock();
        while removed < max_items {
            let node = match heap.peek() {
                Some(n) if n.expire_at_ns <= now_ns => heap.pop().unwrap(),
                _ => break,
            };
            self.counters.scans_total.fetch_add(1, Ordering::Relaxed);

            let shard = self.store.shard(node.fingerprint);
            match shard.expire_at_ns(node.fingerprint) {
                Some(Some(t)) if t <= now_ns => {
                    let (_, hit) = self.store.remove(node.fingerprint);
                    if hit {
                        removed += 1;
                        self.counters.scans_hit.fetch_add(1, Ordering::Relaxed);
                        self.counters.expired_removed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                _ => {
                    // Stale node: either already removed, or its expire-at
                    // moved past `now_ns` since this node was pushed.
                    self.counters.scans_miss.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        removed
    }

    /// Fallback full-table sweep for entries the heap never learned about
    /// (e.g. inserted through a path that bypassed `schedule`).
    pub fn full_sweep(&self, now_ns: i64) -> u64 {
        self.counters.sweeps_total.fetch_add(1, Ordering::Relaxed);
        let removed = self.store.delete_expired(now_ns);
        self.counters
            .expired_removed
            .fetch_add(removed as i64, Ordering::Relaxed);
        removed
    }

    pub fn heap_len(&self) -> usize {
        self.heap.lock().len()
    }
}

/// Spawns the scavenger background task. `sweep_every` ticks, a full sweep
/// runs in addition to the heap drain; pass `0` to disable the fallback
/// sweep entirely.
pub fn spawn_scavenger<V>(
    ttl: Arc<TtlManager<V>>,
    now_fn: impl Fn() -> i64 + Send + Sync + 'static,
    tick_interval: Duration,
    max_clean_items: u64,
    sweep_every: u32,
    token: CancellationToken,
) where
    V: Send + Sync + 'static,
{
    tokio::task::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut tick_count: u32 = 0;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = now_fn();
                    let removed = ttl.tick(now, max_clean_items);
                    if removed > 0 {
                        debug!(component = "ttl_scavenger", event = "tick", removed);
                    }

                    tick_count = tick_count.wrapping_add(1);
                    if sweep_every > 0 && tick_count % sweep_every == 0 {
                        let swept = ttl.full_sweep(now);
                        if swept > 0 {
                            debug!(component = "ttl_scavenger", event = "full_sweep", swept);
                        }
                    }
                }
                _ = token.cancelled() => {
                    info!(component = "ttl_scavenger", event = "stopped");
                    return;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;

    #[test]
    fn tick_removes_due_entries_only() {
        let store: Arc<Store<i32>> = Arc::new(Store::new(4));
        store.set(1, Entry::new(1, 1, 0, Some(100)));
        store.set(2, Entry::new(2, 1, 0, Some(1_000)));

        let ttl = TtlManager::new(store.clone());
        ttl.schedule(1, 100);
        ttl.schedule(2, 1_000);

        let removed = ttl.tick(500, 10);
        assert_eq!(removed, 1);
        assert_eq!(store.get(1), None);
        assert_eq!(store.get(2), Some(2));
    }

    #[test]
    fn tick_respects_max_items_cap() {
        let store: Arc<Store<i32>> = Arc::new(Store::new(4));
        let ttl = TtlManager::new(store.clone());
        for i in 0..10u64 {
            store.set(i, Entry::new(i as i32, 1, 0, Some(10)));
            ttl.schedule(i, 10);
        }
        let removed = ttl.tick(1_000, 3);
        assert_eq!(removed, 3);
        assert_eq!(store.len(), 7);
    }

    #[test]
    fn stale_node_after_overwrite_is_a_no_op() {
        let store: Arc<Store<i32>> = Arc::new(Store::new(4));
        store.set(1, Entry::new(1, 1, 0, Some(100)));
        let ttl = TtlManager::new(store.clone());
        ttl.schedule(1, 100);

        // Overwrite with a later expiry before the scavenger sees the key.
        store.shard(1).set_expire_at_ns(1, Some(10_000));
        ttl.schedule(1, 10_000);

        let removed = ttl.tick(500, 10);
        assert_eq!(removed, 0);
        assert_eq!(store.get(1), Some(1));
    }

    #[test]
    fn full_sweep_catches_entries_the_heap_never_learned_about() {
        let store: Arc<Store<i32>> = Arc::new(Store::new(4));
        store.set(1, Entry::new(1, 1, 0, Some(5)));
        let ttl = TtlManager::new(store.clone());
        let removed = ttl.full_sweep(1_000);
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn slide_is_debounced_below_min_precision() {
        let store: Arc<Store<i32>> = Arc::new(Store::new(4));
        store.set(1, Entry::new(1, 1, 0, Some(1_000_000_000)));
        let ttl = TtlManager::new(store.clone()).with_min_slide_precision_ns(1_000_000_000);

        ttl.slide(1, 1_000_000_000, 1); // new = 1_000_000_001, delta tiny
        assert_eq!(store.shard(1).expire_at_ns(1), Some(Some(1_000_000_000)));

        ttl.slide(1, 2_000_000_000, 0); // delta now crosses the threshold
        assert_eq!(store.shard(1).expire_at_ns(1), Some(Some(2_000_000_000)));
    }
}
