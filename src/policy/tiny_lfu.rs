//! Window TinyLFU policy (component J).
//!
//! Grounded on the teacher's `storage/lfu/tiny_lfu.rs::ShardedAdmitter`
//! (record/allow over a sketch+doorkeeper pair) for the admission half, and
//! on `lru.rs`/`lfu_heap.rs` for the two tiers it arbitrates between. Unlike
//! the teacher, whose admitter only gates *whether* a value enters the
//! cache at all, this policy also owns the window/main split itself, since
//! here the policy is the only component that knows which tier a
//! fingerprint currently lives in.
//!
//! spec.md §9 warns that peeking a victim, deciding admission, and then
//! mutating two tiers can deadlock if the peek and the mutation are taken
//! under separate locks in inconsistent order. This implementation sides
//! around that entirely by keeping window, main, membership, and the
//! pending-eviction queue under one `Mutex`: the peek-decide-mutate
//! sequence never releases the lock between steps, so there is no second
//! lock to order against.
//!
//! Rebalancing is paced internally by `add`, not by `evict_one`: a window
//! arrival that pushes the window over its capacity immediately contests
//! admission into main (or, while main still has room, is simply promoted).
//! The losing fingerprint of that contest is queued; `evict_one` drains the
//! queue first and only forces an immediate eviction from a live tier when
//! the queue is empty, which happens before the cache has ever filled main.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::doorkeeper::Doorkeeper;
use crate::sketch::Sketch;

use super::Policy;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Tier {
    Window,
    Main,
}

struct WindowTier {
    order: Vec<u64>,
    index: HashMap<u64, usize>,
}

impl WindowTier {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn reindex_from(&mut self, start: usize) {
        for i in start..self.order.len() {
            self.index.insert(self.order[i], i);
        }
    }

    fn push_front(&mut self, fp: u64) {
        self.order.insert(0, fp);
        self.reindex_from(0);
    }

    fn move_to_front(&mut self, fp: u64) {
        if let Some(&idx) = self.index.get(&fp) {
            if idx == 0 {
                return;
            }
            self.order.remove(idx);
            self.push_front(fp);
        }
    }

    fn remove(&mut self, fp: u64) {
        if let Some(idx) = self.index.remove(&fp) {
            self.order.remove(idx);
            self.reindex_from(idx);
        }
    }

    fn pop_tail(&mut self) -> Option<u64> {
        let fp = self.order.pop()?;
        self.index.remove(&fp);
        Some(fp)
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

struct MainTier {
    nodes: Vec<(u64, u32, i64)>, // (fingerprint, frequency, access_time_ns)
    index: HashMap<u64, usize>,
}

impl MainTier {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn less(a: (u32, i64), b: (u32, i64)) -> bool {
        a < b
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.nodes.swap(a, b);
        self.index.insert(self.nodes[a].0, a);
        self.index.insert(self.nodes[b].0, b);
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if Self::less(
                (self.nodes[idx].1, self.nodes[idx].2),
                (self.nodes[parent].1, self.nodes[parent].2),
            ) {
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
            if left < n
                && Self::less(
                    (self.nodes[left].1, self.nodes[left].2),
                    (self.nodes[smallest].1, self.nodes[smallest].2),
                )
            {
                smallest = left;
            }
            if right < n
                && Self::less(
                    (self.nodes[right].1, self.nodes[right].2),
                    (self.nodes[smallest].1, self.nodes[smallest].2),
                )
            {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.swap(idx, smallest);
            idx = smallest;
        }
    }

    fn push(&mut self, fp: u64, frequency: u32, access_time_ns: i64) {
        self.nodes.push((fp, frequency, access_time_ns));
        let idx = self.nodes.len() - 1;
        self.index.insert(fp, idx);
        self.sift_up(idx);
    }

    fn bump(&mut self, fp: u64, now_ns: i64) {
        if let Some(&idx) = self.index.get(&fp) {
            self.nodes[idx].1 += 1;
            self.nodes[idx].2 = now_ns;
            // Both frequency and access_time only increase here, so the key
            // can only get larger: a min-heap can require sifting down in
            // that case but never up.
            self.sift_down(idx);
        }
    }

    fn remove_at(&mut self, idx: usize) -> (u64, u32, i64) {
        let last = self.nodes.len() - 1;
        self.swap(idx, last);
        let node = self.nodes.pop().unwrap();
        self.index.remove(&node.0);
        if idx < self.nodes.len() {
            let moved_fp = self.nodes[idx].0;
            self.sift_down(idx);
            if let Some(&new_idx) = self.index.get(&moved_fp) {
                self.sift_up(new_idx);
            }
        }
        node
    }

    fn remove_fp(&mut self, fp: u64) {
        if let Some(idx) = self.index.get(&fp).copied() {
            self.remove_at(idx);
        }
    }

    fn peek_worst(&self) -> Option<u64> {
        self.nodes.first().map(|n| n.0)
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

struct Admitter {
    sketch: Sketch,
    door: Option<Doorkeeper>,
}

impl Admitter {
    fn new(depth: u32, width: u32, reset_after: u64, enable_doorkeeper: bool) -> Self {
        Self {
            sketch: Sketch::new(depth, width, reset_after),
            door: enable_doorkeeper.then(|| Doorkeeper::new(width * depth.max(1))),
        }
    }

    fn record(&self, fp: u64) {
        match &self.door {
            Some(door) => {
                if door.seen_or_add(fp) {
                    self.sketch.increment(fp);
                }
            }
            None => self.sketch.increment(fp),
        }
    }

    /// Returns `true` if `candidate` should displace `victim`.
    fn allow(&self, candidate: u64, victim: u64) -> bool {
        self.sketch.estimate(candidate) > self.sketch.estimate(victim)
    }
}

struct State {
    window: WindowTier,
    main: MainTier,
    membership: HashMap<u64, Tier>,
    evicted: VecDeque<u64>,
    window_capacity: usize,
    main_capacity: usize,
}

impl State {
    /// Admits `candidate` (already removed from the window) into main:
    /// directly if main has room, otherwise by contesting main's current
    /// worst entry. The loser of a full-main contest is queued for
    /// eviction.
    fn promote_to_main(&mut self, candidate: u64, admitter: &Admitter, now_ns: i64) {
        if self.main.len() < self.main_capacity {
            self.main.push(candidate, 1, now_ns);
            self.membership.insert(candidate, Tier::Main);
            return;
        }

        let victim = match self.main.peek_worst() {
            Some(v) => v,
            None => {
                self.main.push(candidate, 1, now_ns);
                self.membership.insert(candidate, Tier::Main);
                return;
            }
        };

        if admitter.allow(candidate, victim) {
            self.main.remove_fp(victim);
            self.membership.remove(&victim);
            self.main.push(candidate, 1, now_ns);
            self.membership.insert(candidate, Tier::Main);
            self.evicted.push_back(victim);
        } else {
            self.evicted.push_back(candidate);
        }
    }

    /// Moves the window tail into main, or queues an eviction if main is
    /// already full and the contest goes against the candidate.
    fn rebalance(&mut self, admitter: &Admitter, now_ns: i64) {
        while self.window.len() > self.window_capacity {
            let Some(candidate) = self.window.pop_tail() else {
                break;
            };
            self.membership.remove(&candidate);
            self.promote_to_main(candidate, admitter, now_ns);
        }
    }
}

/// Window TinyLFU: recent arrivals live in a small LRU window; once the
/// window overflows, its tail contests admission into the larger
/// frequency-ordered main tier against main's current worst entry. The
/// loser of that contest is what `evict_one` returns.
pub struct TinyLfuPolicy {
    state: Mutex<State>,
    admitter: Admitter,
}

impl TinyLfuPolicy {
    pub fn new(
        estimated_capacity: usize,
        window_ratio: f64,
        sketch_depth: u32,
        sketch_width: u32,
        reset_after: u64,
        enable_doorkeeper: bool,
    ) -> Self {
        let window_capacity = ((estimated_capacity as f64 * window_ratio).ceil() as usize).max(1);
        let main_capacity = estimated_capacity.saturating_sub(window_capacity).max(1);
        Self {
            state: Mutex::new(State {
                window: WindowTier::new(),
                main: MainTier::new(),
                membership: HashMap::new(),
                evicted: VecDeque::new(),
                window_capacity,
                main_capacity,
            }),
            admitter: Admitter::new(sketch_depth, sketch_width, reset_after, enable_doorkeeper),
        }
    }
}

impl Policy for TinyLfuPolicy {
    fn add(&self, fingerprint: u64, _weight: i64, now_ns: i64) {
        self.admitter.record(fingerprint);
        let mut state = self.state.lock();
        if state.membership.contains_key(&fingerprint) {
            return;
        }
        state.window.push_front(fingerprint);
        state.membership.insert(fingerprint, Tier::Window);
        state.rebalance(&self.admitter, now_ns);
    }

    fn on_access(&self, fingerprint: u64, now_ns: i64) {
        self.admitter.record(fingerprint);
        let mut state = self.state.lock();
        match state.membership.get(&fingerprint).copied() {
            // Get on a window hit promotes straight to main rather than
            // just reordering the window (spec: "consult window; if
            // present, promote to main").
            Some(Tier::Window) => {
                state.window.remove(fingerprint);
                state.membership.remove(&fingerprint);
                state.promote_to_main(fingerprint, &self.admitter, now_ns);
            }
            Some(Tier::Main) => state.main.bump(fingerprint, now_ns),
            None => {}
        }
    }

    fn remove(&self, fingerprint: u64) {
        let mut state = self.state.lock();
        match state.membership.remove(&fingerprint) {
            Some(Tier::Window) => state.window.remove(fingerprint),
            Some(Tier::Main) => state.main.remove_fp(fingerprint),
            None => {
                if let Some(pos) = state.evicted.iter().position(|&k| k == fingerprint) {
                    state.evicted.remove(pos);
                }
            }
        }
    }

    fn evict_one(&self) -> Option<u64> {
        let mut state = self.state.lock();

        if let Some(fp) = state.evicted.pop_front() {
            return Some(fp);
        }

        if let Some(victim) = state.main.peek_worst() {
            state.main.remove_fp(victim);
            state.membership.remove(&victim);
            return Some(victim);
        }

        let victim = state.window.pop_tail()?;
        state.membership.remove(&victim);
        Some(victim)
    }

    fn len(&self) -> usize {
        let state = self.state.lock();
        state.window.len() + state.main.len() + state.evicted.len()
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.window = WindowTier::new();
        state.main = MainTier::new();
        state.membership.clear();
        state.evicted.clear();
    }
}
