//! LRU policy (component F).
//!
//! Grounded directly on the teacher's `storage/map/lru.rs` `LRUList`: an
//! order `Vec<u64>` plus a `HashMap<u64, usize>` index, accepting the
//! O(n)-shift cost of `Vec::remove`/`Vec::insert` rather than reaching for
//! an intrusive doubly linked list — the teacher makes the same trade for
//! its approximate LRU.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::Policy;

struct Inner {
    order: Vec<u64>,
    indices: HashMap<u64, usize>,
}

impl Inner {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            indices: HashMap::new(),
        }
    }

    fn reindex_from(&mut self, start: usize) {
        for i in start..self.order.len() {
            self.indices.insert(self.order[i], i);
        }
    }

    fn move_to_front(&mut self, fingerprint: u64) {
        if let Some(&idx) = self.indices.get(&fingerprint) {
            if idx == 0 {
                return;
            }
            self.order.remove(idx);
            self.order.insert(0, fingerprint);
            self.reindex_from(0);
        } else {
            self.order.insert(0, fingerprint);
            self.reindex_from(0);
        }
    }

    fn remove(&mut self, fingerprint: u64) {
        if let Some(idx) = self.indices.remove(&fingerprint) {
            self.order.remove(idx);
            self.reindex_from(idx);
        }
    }

    fn pop_tail(&mut self) -> Option<u64> {
        let fp = self.order.pop()?;
        self.indices.remove(&fp);
        Some(fp)
    }

    fn push_tail(&mut self, fingerprint: u64) {
        if self.indices.contains_key(&fingerprint) {
            return;
        }
        self.indices.insert(fingerprint, self.order.len());
        self.order.push(fingerprint);
    }
}

/// Recency-ordered policy: `add`/`on_access` both move the key to the head;
/// `evict_one` pops the tail.
pub struct LruPolicy {
    inner: Mutex<Inner>,
}

impl LruPolicy {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }
}

impl Default for LruPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for LruPolicy {
    fn add(&self, fingerprint: u64, _weight: i64, _now_ns: i64) {
        self.inner.lock().move_to_front(fingerprint);
    }

    fn on_access(&self, fingerprint: u64, _now_ns: i64) {
        self.inner.lock().move_to_front(fingerprint);
    }

    fn remove(&self, fingerprint: u64) {
        self.inner.lock().remove(fingerprint);
    }

    fn evict_one(&self) -> Option<u64> {
        self.inner.lock().pop_tail()
    }

    /// Puts a just-evicted fingerprint back at the cold end instead of the
    /// front `add` would use, since it was the least-recently-used entry a
    /// moment ago and losing the admission contest doesn't make it recent.
    fn restore(&self, fingerprint: u64, _weight: i64, _now_ns: i64) {
        self.inner.lock().push_tail(fingerprint);
    }

    fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.order.clear();
        inner.indices.clear();
    }
}
