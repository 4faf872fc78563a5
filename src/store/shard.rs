//! A single shard: a lock-guarded hashmap plus its own byte/len counters.
//!
//! Grounded on the teacher's `storage/map/shard.rs` `Shard<V>` — same
//! `parking_lot::RwLock<HashMap<u64, V>>` plus atomic counters shape,
//! generalized to hold `Entry<V>` for an arbitrary `V` instead of the
//! teacher's HTTP-response `Entry`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;

use crate::entry::Entry;

pub struct Shard<V> {
    data: RwLock<HashMap<u64, Entry<V>>>,
    mem: AtomicI64,
    len: AtomicI64,
}

impl<V> Shard<V> {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            mem: AtomicI64::new(0),
            len: AtomicI64::new(0),
        }
    }

    pub fn len(&self) -> i64 {
        self.len.load(Ordering::Relaxed)
    }

    pub fn mem(&self) -> i64 {
        self.mem.load(Ordering::Relaxed)
    }

    /// Inserts or replaces an entry. Returns `(bytes_delta, len_delta)`.
    pub fn set(&self, fingerprint: u64, entry: Entry<V>) -> (i64, i64) {
        let mut data = self.data.write();
        let new_weight = entry.weight();
        if let Some(old) = data.insert(fingerprint, entry) {
            let delta = new_weight - old.weight();
            if delta != 0 {
                self.mem.fetch_add(delta, Ordering::Relaxed);
            }
            (delta, 0)
        } else {
            self.mem.fetch_add(new_weight, Ordering::Relaxed);
            self.len.fetch_add(1, Ordering::Relaxed);
            (new_weight, 1)
        }
    }

    pub fn get(&self, fingerprint: u64) -> Option<V>
    where
        V: Clone,
    {
        self.data.read().get(&fingerprint).map(|e| e.value().clone())
    }

    /// Looks up a value and touches its access time in one pass, avoiding a
    /// second lock acquisition on the synchronous-touch path.
    pub fn get_and_touch(&self, fingerprint: u64, now_ns: i64) -> Option<V>
    where
        V: Clone,
    {
        let data = self.data.read();
        let e = data.get(&fingerprint)?;
        e.touch(now_ns);
        Some(e.value().clone())
    }

    pub fn touch(&self, fingerprint: u64, now_ns: i64) -> bool {
        match self.data.read().get(&fingerprint) {
            Some(e) => {
                e.touch(now_ns);
                true
            }
            None => false,
        }
    }

    pub fn touched_at(&self, fingerprint: u64) -> Option<i64> {
        self.data.read().get(&fingerprint).map(|e| e.touched_at())
    }

    pub fn expire_at_ns(&self, fingerprint: u64) -> Option<Option<i64>> {
        self.data.read().get(&fingerprint).map(|e| e.expire_at_ns())
    }

    pub fn set_expire_at_ns(&self, fingerprint: u64, expire_at_ns: Option<i64>) -> bool {
        match self.data.read().get(&fingerprint) {
            Some(e) => {
                e.set_expire_at_ns(expire_at_ns);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, fingerprint: u64) -> bool {
        self.data.read().contains_key(&fingerprint)
    }

    /// Removes a key. Returns `(freed_bytes, hit)`.
    pub fn remove(&self, fingerprint: u64) -> (i64, bool) {
        let mut data = self.data.write();
        if let Some(old) = data.remove(&fingerprint) {
            let freed = old.weight();
            self.mem.fetch_sub(freed, Ordering::Relaxed);
            self.len.fetch_sub(1, Ordering::Relaxed);
            (freed, true)
        } else {
            (0, false)
        }
    }

    /// Removes and returns the whole entry, preserving its weight,
    /// touched-at, and expire-at — used by the shard rebalancer so a moved
    /// entry keeps its original bookkeeping instead of being reconstructed
    /// from scratch at the destination.
    pub fn take(&self, fingerprint: u64) -> Option<Entry<V>> {
        let mut data = self.data.write();
        let entry = data.remove(&fingerprint)?;
        self.mem.fetch_sub(entry.weight(), Ordering::Relaxed);
        self.len.fetch_sub(1, Ordering::Relaxed);
        Some(entry)
    }

    /// Clears the shard. Returns `(freed_bytes, items_removed)`.
    pub fn clear(&self) -> (i64, i64) {
        let mut data = self.data.write();
        let items = self.len.load(Ordering::Relaxed);
        let freed = self.mem.load(Ordering::Relaxed);
        data.clear();
        self.len.store(0, Ordering::Relaxed);
        self.mem.store(0, Ordering::Relaxed);
        (freed, items)
    }

    /// Walks all entries under a single read lock. `f` returns `false` to
    /// stop early.
    pub fn walk_r<F>(&self, mut f: F)
    where
        F: FnMut(u64, &V) -> bool,
    {
        let data = self.data.read();
        for (k, e) in data.iter() {
            if !f(*k, e.value()) {
                return;
            }
        }
    }

    /// Returns `(fingerprint, touched_at, weight)` for every live entry,
    /// for eviction-candidate sampling. Entries are cloned out from under
    /// the read lock so the caller can compare/sort without holding it.
    pub fn snapshot_metadata(&self) -> Vec<(u64, i64, i64)> {
        let data = self.data.read();
        data.iter()
            .map(|(k, e)| (*k, e.touched_at(), e.weight()))
            .collect()
    }
}

impl<V> Default for Shard<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(v: i32, w: i64) -> Entry<i32> {
        Entry::new(v, w, 0, None)
    }

    #[test]
    fn set_then_get_round_trips() {
        let s: Shard<i32> = Shard::new();
        s.set(1, entry(42, 8));
        assert_eq!(s.get(1), Some(42));
        assert_eq!(s.len(), 1);
        assert_eq!(s.mem(), 8);
    }

    #[test]
    fn set_existing_key_replaces_and_reports_delta() {
        let s: Shard<i32> = Shard::new();
        s.set(1, entry(1, 8));
        let (delta, len_delta) = s.set(1, entry(2, 12));
        assert_eq!(delta, 4);
        assert_eq!(len_delta, 0);
        assert_eq!(s.len(), 1);
        assert_eq!(s.mem(), 12);
    }

    #[test]
    fn remove_frees_bytes() {
        let s: Shard<i32> = Shard::new();
        s.set(1, entry(1, 10));
        let (freed, hit) = s.remove(1);
        assert!(hit);
        assert_eq!(freed, 10);
        assert_eq!(s.len(), 0);
        assert_eq!(s.mem(), 0);
    }

    #[test]
    fn clear_resets_counters() {
        let s: Shard<i32> = Shard::new();
        s.set(1, entry(1, 10));
        s.set(2, entry(2, 5));
        let (freed, items) = s.clear();
        assert_eq!(freed, 15);
        assert_eq!(items, 2);
        assert_eq!(s.len(), 0);
    }
}
