//! Classical LFU policy backed by frequency buckets (component G).
//!
//! New: the teacher has no standalone classical-LFU eviction policy (only
//! TinyLFU admission). Grounded on the frequency-bucket technique from
//! `other_examples/…wez-wezterm__lfucache-src-lib.rs.rs` and
//! `other_examples/…vanyastaff-nebula…lfu.rs`, reimplemented with the
//! teacher's own collection and locking idiom — `BTreeMap` for the
//! frequency-ordered bucket list, `VecDeque` per bucket for insertion-order
//! tie-breaking, a single `parking_lot::Mutex` — rather than the
//! `intrusive_collections`/`ahash` stack those examples reach for.

use std::collections::{BTreeMap, HashMap, VecDeque};

use parking_lot::Mutex;

use super::Policy;

struct Inner {
    buckets: BTreeMap<u32, VecDeque<u64>>,
    freq_of: HashMap<u64, u32>,
}

impl Inner {
    fn new() -> Self {
        Self {
            buckets: BTreeMap::new(),
            freq_of: HashMap::new(),
        }
    }

    fn remove_from_bucket(&mut self, freq: u32, fingerprint: u64) {
        if let Some(bucket) = self.buckets.get_mut(&freq) {
            if let Some(pos) = bucket.iter().position(|&k| k == fingerprint) {
                bucket.remove(pos);
            }
            if bucket.is_empty() {
                self.buckets.remove(&freq);
            }
        }
    }

    fn bump(&mut self, fingerprint: u64) {
        let old_freq = self.freq_of.get(&fingerprint).copied().unwrap_or(0);
        if old_freq > 0 {
            self.remove_from_bucket(old_freq, fingerprint);
        }
        let new_freq = old_freq + 1;
        self.freq_of.insert(fingerprint, new_freq);
        self.buckets.entry(new_freq).or_default().push_back(fingerprint);
    }
}

pub struct LfuBucketPolicy {
    inner: Mutex<Inner>,
}

impl LfuBucketPolicy {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }
}

impl Default for LfuBucketPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for LfuBucketPolicy {
    fn add(&self, fingerprint: u64, _weight: i64, _now_ns: i64) {
        self.inner.lock().bump(fingerprint);
    }

    fn on_access(&self, fingerprint: u64, _now_ns: i64) {
        self.inner.lock().bump(fingerprint);
    }

    fn remove(&self, fingerprint: u64) {
        let mut inner = self.inner.lock();
        if let Some(freq) = inner.freq_of.remove(&fingerprint) {
            inner.remove_from_bucket(freq, fingerprint);
        }
    }

    fn evict_one(&self) -> Option<u64> {
        let mut inner = self.inner.lock();
        let lowest_freq = *inner.buckets.keys().next()?;
        let bucket = inner.buckets.get_mut(&lowest_freq)?;
        let fingerprint = bucket.pop_front()?;
        if bucket.is_empty() {
            inner.buckets.remove(&lowest_freq);
        }
        inner.freq_of.remove(&fingerprint);
        Some(fingerprint)
    }

    fn len(&self) -> usize {
        self.inner.lock().freq_of.len()
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.buckets.clear();
        inner.freq_of.clear();
    }
}
