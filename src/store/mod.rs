//! Sharded store (component D).
//!
//! Grounded on the teacher's `storage/map::Map<V>`: a fixed `Vec<Shard<V>>`
//! addressed by the low bits of a key's fingerprint, with precise global
//! byte/len counters kept in lockstep with each shard's own counters.

mod access;
mod shard;

pub use access::{AccessMode, AccessPipeline};
pub use shard::Shard;

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::entry::Entry;
use crate::hash::{next_pow2, shard_index};

/// Owns every shard and the store-wide counters derived from them.
pub struct Store<V> {
    shards: Vec<Shard<V>>,
    shard_mask: u64,
    len: AtomicI64,
    mem: AtomicI64,
    iter: AtomicU64,
}

impl<V> Store<V> {
    /// `shard_count` is rounded up to the next power of two.
    pub fn new(shard_count: usize) -> Self {
        let shard_count = next_pow2(shard_count);
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(Shard::new());
        }
        Self {
            shards,
            shard_mask: shard_count as u64 - 1,
            len: AtomicI64::new(0),
            mem: AtomicI64::new(0),
            iter: AtomicU64::new(0),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn len(&self) -> i64 {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mem(&self) -> i64 {
        self.mem.load(Ordering::Relaxed)
    }

    pub fn shard(&self, fingerprint: u64) -> &Shard<V> {
        &self.shards[shard_index(fingerprint, self.shards.len())]
    }

    pub fn shards(&self) -> &[Shard<V>] {
        &self.shards
    }

    /// Round-robins across shards, used by sampling-based eviction and
    /// expired-entry scavenging so repeated scans spread across the table
    /// instead of always starting at shard 0.
    pub fn next_shard(&self) -> (usize, &Shard<V>) {
        let idx = (self.iter.fetch_add(1, Ordering::Relaxed) & self.shard_mask) as usize;
        (idx, &self.shards[idx])
    }

    pub fn set(&self, fingerprint: u64, entry: Entry<V>) {
        let (bytes_delta, len_delta) = self.shard(fingerprint).set(fingerprint, entry);
        if bytes_delta != 0 {
            self.mem.fetch_add(bytes_delta, Ordering::Relaxed);
        }
        if len_delta != 0 {
            self.len.fetch_add(len_delta, Ordering::Relaxed);
        }
    }

    pub fn get(&self, fingerprint: u64) -> Option<V>
    where
        V: Clone,
    {
        self.shard(fingerprint).get(fingerprint)
    }

    pub fn get_and_touch(&self, fingerprint: u64, now_ns: i64) -> Option<V>
    where
        V: Clone,
    {
        self.shard(fingerprint).get_and_touch(fingerprint, now_ns)
    }

    pub fn touch(&self, fingerprint: u64, now_ns: i64) -> bool {
        self.shard(fingerprint).touch(fingerprint, now_ns)
    }

    pub fn contains(&self, fingerprint: u64) -> bool {
        self.shard(fingerprint).contains(fingerprint)
    }

    pub fn remove(&self, fingerprint: u64) -> (i64, bool) {
        let (freed, hit) = self.shard(fingerprint).remove(fingerprint);
        if hit {
            self.len.fetch_sub(1, Ordering::Relaxed);
            self.mem.fetch_sub(freed, Ordering::Relaxed);
        }
        (freed, hit)
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            let (freed, items) = shard.clear();
            if freed != 0 {
                self.mem.fetch_sub(freed, Ordering::Relaxed);
            }
            if items != 0 {
                self.len.fetch_sub(items, Ordering::Relaxed);
            }
        }
    }

    /// Sequential ascending-index walk over every shard (§9 "Sharded lock
    /// ordering": multi-shard operations always iterate shards in a fixed
    /// ascending order to avoid lock-order inversions between threads).
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(u64, &V) -> bool,
    {
        for shard in &self.shards {
            let mut stop = false;
            shard.walk_r(|k, v| {
                if !f(k, v) {
                    stop = true;
                    return false;
                }
                true
            });
            if stop {
                return;
            }
        }
    }

    pub fn keys(&self) -> Vec<u64> {
        let mut out = Vec::new();
        for shard in &self.shards {
            shard.walk_r(|k, _| {
                out.push(k);
                true
            });
        }
        out
    }

    /// Removes every entry whose `expire_at_ns` is at or before `now_ns`.
    /// Returns the number of entries removed. This is the fallback
    /// full-sweep path; the TTL scavenger's heap-driven path is the
    /// primary one (component E).
    pub fn delete_expired(&self, now_ns: i64) -> u64 {
        let mut expired = Vec::new();
        for (idx, shard) in self.shards.iter().enumerate() {
            let snapshot = shard.snapshot_metadata();
            for (fp, _touched_at, _weight) in snapshot {
                if let Some(Some(expire_at)) = shard.expire_at_ns(fp) {
                    if now_ns >= expire_at {
                        expired.push((idx, fp));
                    }
                }
            }
        }
        let mut removed = 0u64;
        for (idx, fp) in expired {
            // The expire-at may have been updated (e.g. by sliding
            // expiration) between the read-lock scan above and this
            // write-lock removal; re-check before deleting.
            let still_expired = matches!(
                self.shards[idx].expire_at_ns(fp),
                Some(Some(expire_at)) if now_ns >= expire_at
            );
            if !still_expired {
                continue;
            }
            let (freed, hit) = self.shards[idx].remove(fp);
            if hit {
                self.len.fetch_sub(1, Ordering::Relaxed);
                self.mem.fetch_sub(freed, Ordering::Relaxed);
                removed += 1;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(v: i32, w: i64) -> Entry<i32> {
        Entry::new(v, w, 0, None)
    }

    #[test]
    fn shard_count_rounds_up() {
        let s: Store<i32> = Store::new(5);
        assert_eq!(s.shard_count(), 8);
    }

    #[test]
    fn set_get_remove_round_trip() {
        let s: Store<i32> = Store::new(4);
        s.set(100, entry(7, 16));
        assert_eq!(s.get(100), Some(7));
        assert_eq!(s.len(), 1);
        assert_eq!(s.mem(), 16);
        let (freed, hit) = s.remove(100);
        assert!(hit);
        assert_eq!(freed, 16);
        assert_eq!(s.len(), 0);
    }

    #[test]
    fn for_each_visits_all_entries() {
        let s: Store<i32> = Store::new(4);
        for i in 0..20u64 {
            s.set(i, entry(i as i32, 1));
        }
        let mut seen = 0;
        s.for_each(|_, _| {
            seen += 1;
            true
        });
        assert_eq!(seen, 20);
    }

    #[test]
    fn delete_expired_removes_only_due_entries() {
        let s: Store<i32> = Store::new(4);
        s.set(1, Entry::new(1, 1, 0, Some(10)));
        s.set(2, Entry::new(2, 1, 0, Some(1_000)));
        let removed = s.delete_expired(10);
        assert_eq!(removed, 1);
        assert_eq!(s.len(), 1);
        assert_eq!(s.get(1), None);
        assert_eq!(s.get(2), Some(2));
    }

    #[test]
    fn delete_expired_re_checks_before_removing_a_slid_entry() {
        // Simulates the race in spec.md §4.D: an entry's expire-at is
        // pushed out (e.g. by sliding expiration) after it was captured as
        // a candidate but before the removal actually runs. `delete_expired`
        // must not delete it once that slide has landed.
        let s: Store<i32> = Store::new(1);
        s.set(1, Entry::new(1, 1, 0, Some(10)));
        // Extend the deadline past `now_ns`, as a concurrent slide would.
        s.shard(1).set_expire_at_ns(1, Some(1_000));

        let removed = s.delete_expired(10);
        assert_eq!(removed, 0);
        assert_eq!(s.get(1), Some(1));
    }

    #[test]
    fn clear_empties_every_shard() {
        let s: Store<i32> = Store::new(4);
        for i in 0..10u64 {
            s.set(i, entry(i as i32, 2));
        }
        s.clear();
        assert_eq!(s.len(), 0);
        assert_eq!(s.mem(), 0);
    }
}
