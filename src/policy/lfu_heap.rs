//! Heap-ordered LFU policy (component H).
//!
//! New: grounded on the generic min-heap utility's shape (component N) and
//! the index-tracking technique from
//! `other_examples/…godaddy-asherah…tlfu.rs` (a `HashMap` from key to heap
//! position, kept in sync on every swap). The shared `heap.rs::MinHeap<T>`
//! cannot support this directly — swaps it performs are invisible to an
//! external position map — so this policy keeps its own small swap-aware
//! heap rather than adapting `MinHeap` to call back out on every move.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::Policy;

#[derive(Clone, Copy)]
struct Node {
    fingerprint: u64,
    frequency: u32,
    access_time_ns: i64,
}

fn less(a: &Node, b: &Node) -> bool {
    (a.frequency, a.access_time_ns) < (b.frequency, b.access_time_ns)
}

struct Inner {
    nodes: Vec<Node>,
    index: HashMap<u64, usize>,
}

impl Inner {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.nodes.swap(a, b);
        self.index.insert(self.nodes[a].fingerprint, a);
        self.index.insert(self.nodes[b].fingerprint, b);
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if less(&self.nodes[idx], &self.nodes[parent]) {
                self.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let n = self.nodes.len();
        loop {
            let left = 2 * idx + 1;
            let right = 2 * idx + 2;
            let mut smallest = idx;
            if left < n && less(&self.nodes[left], &self.nodes[smallest]) {
                smallest = left;
            }
            if right < n && less(&self.nodes[right], &self.nodes[smallest]) {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.swap(idx, smallest);
            idx = smallest;
        }
    }

    fn fix(&mut self, idx: usize) {
        let fingerprint = self.nodes[idx].fingerprint;
        self.sift_down(idx);
        if let Some(&new_idx) = self.index.get(&fingerprint) {
            self.sift_up(new_idx);
        }
    }

    fn push(&mut self, node: Node) {
        self.nodes.push(node);
        let idx = self.nodes.len() - 1;
        self.index.insert(node.fingerprint, idx);
        self.sift_up(idx);
    }

    fn remove_at(&mut self, idx: usize) -> Node {
        let last = self.nodes.len() - 1;
        self.swap(idx, last);
        let node = self.nodes.pop().unwrap();
        self.index.remove(&node.fingerprint);
        if idx < self.nodes.len() {
            let moved_fingerprint = self.nodes[idx].fingerprint;
            self.sift_down(idx);
            if let Some(&new_idx) = self.index.get(&moved_fingerprint) {
                self.sift_up(new_idx);
            }
        }
        node
    }

    fn bump(&mut self, fingerprint: u64, now_ns: i64) {
        if let Some(&idx) = self.index.get(&fingerprint) {
            self.nodes[idx].frequency += 1;
            self.nodes[idx].access_time_ns = now_ns;
            self.fix(idx);
        } else {
            self.push(Node {
                fingerprint,
                frequency: 1,
                access_time_ns: now_ns,
            });
        }
    }
}

/// Binary min-heap keyed on `(frequency, access_time_ns)`: lowest frequency
/// first, oldest access breaks ties.
pub struct LfuHeapPolicy {
    inner: Mutex<Inner>,
}

impl LfuHeapPolicy {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }
}

impl Default for LfuHeapPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for LfuHeapPolicy {
    fn add(&self, fingerprint: u64, _weight: i64, now_ns: i64) {
        self.inner.lock().bump(fingerprint, now_ns);
    }

    fn on_access(&self, fingerprint: u64, now_ns: i64) {
        self.inner.lock().bump(fingerprint, now_ns);
    }

    fn remove(&self, fingerprint: u64) {
        let mut inner = self.inner.lock();
        if let Some(idx) = inner.index.get(&fingerprint).copied() {
            inner.remove_at(idx);
        }
    }

    fn evict_one(&self) -> Option<u64> {
        let mut inner = self.inner.lock();
        if inner.nodes.is_empty() {
            return None;
        }
        Some(inner.remove_at(0).fingerprint)
    }

    fn len(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.nodes.clear();
        inner.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_lowest_frequency() {
        let p = LfuHeapPolicy::new();
        p.add(1, 1, 0);
        p.add(2, 1, 0);
        p.add(3, 1, 0);
        p.on_access(2, 1);
        p.on_access(2, 2);
        p.on_access(3, 3);
        // freq: 1 -> 1, 2 -> 3, 3 -> 2
        assert_eq!(p.evict_one(), Some(1));
        assert_eq!(p.evict_one(), Some(3));
        assert_eq!(p.evict_one(), Some(2));
    }

    #[test]
    fn ties_broken_by_oldest_access() {
        let p = LfuHeapPolicy::new();
        p.add(1, 1, 10);
        p.add(2, 1, 5);
        // Both frequency 1; key 2 is older.
        assert_eq!(p.evict_one(), Some(2));
        assert_eq!(p.evict_one(), Some(1));
    }

    #[test]
    fn remove_maintains_heap_invariant() {
        let p = LfuHeapPolicy::new();
        for i in 0..20u64 {
            p.add(i, 1, i as i64);
        }
        p.remove(10);
        let mut out = Vec::new();
        while let Some(fp) = p.evict_one() {
            out.push(fp);
        }
        assert_eq!(out.len(), 19);
        assert!(!out.contains(&10));
        let mut sorted = out.clone();
        sorted.sort();
        assert_eq!(out, sorted);
    }
}
