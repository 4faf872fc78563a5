//! Sampled LFU policy (component I).
//!
//! Grounded on the teacher's `storage/map/eviction.rs::pick_victim_by_sample`:
//! rather than maintaining an exact global order, draw a small uniform
//! sample of candidates and evict the worst one found. This policy samples
//! over its own frequency/access-time map using `crate::rand::sample_indices`
//! in place of the teacher's shard-then-key double sample, since this policy
//! is not itself sharded.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::Policy;

const DEFAULT_SAMPLE_SIZE: usize = 5;

struct Candidate {
    fingerprint: u64,
    frequency: u32,
    access_time_ns: i64,
}

struct Inner {
    stats: HashMap<u64, (u32, i64)>,
    order: Vec<u64>,
    sample_size: usize,
}

impl Inner {
    fn new(sample_size: usize) -> Self {
        Self {
            stats: HashMap::new(),
            order: Vec::new(),
            sample_size: sample_size.max(1),
        }
    }

    fn bump(&mut self, fingerprint: u64, now_ns: i64) {
        match self.stats.get_mut(&fingerprint) {
            Some((freq, at)) => {
                *freq += 1;
                *at = now_ns;
            }
            None => {
                self.stats.insert(fingerprint, (1, now_ns));
                self.order.push(fingerprint);
            }
        }
    }

    fn remove(&mut self, fingerprint: u64) {
        if self.stats.remove(&fingerprint).is_some() {
            if let Some(pos) = self.order.iter().position(|&k| k == fingerprint) {
                self.order.swap_remove(pos);
            }
        }
    }

    /// Samples `sample_size` live candidates and returns the one with the
    /// lowest frequency, oldest access time breaking ties. Lazily drops
    /// stale order entries whose stats were already removed.
    fn sample_worst(&mut self) -> Option<u64> {
        while let Some(&last) = self.order.last() {
            if self.stats.contains_key(&last) {
                break;
            }
            self.order.pop();
        }
        if self.order.is_empty() {
            return None;
        }

        let indices = crate::rand::sample_indices(self.order.len(), self.sample_size);
        let mut worst: Option<Candidate> = None;
        for idx in indices {
            let fingerprint = self.order[idx];
            let Some(&(frequency, access_time_ns)) = self.stats.get(&fingerprint) else {
                continue;
            };
            let candidate = Candidate {
                fingerprint,
                frequency,
                access_time_ns,
            };
            let replace = match &worst {
                None => true,
                Some(w) => {
                    (candidate.frequency, candidate.access_time_ns)
                        < (w.frequency, w.access_time_ns)
                }
            };
            if replace {
                worst = Some(candidate);
            }
        }
        worst.map(|c| c.fingerprint)
    }
}

pub struct SampledLfuPolicy {
    inner: Mutex<Inner>,
}

impl SampledLfuPolicy {
    pub fn new() -> Self {
        Self::with_sample_size(DEFAULT_SAMPLE_SIZE)
    }

    pub fn with_sample_size(sample_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::new(sample_size)),
        }
    }
}

impl Default for SampledLfuPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for SampledLfuPolicy {
    fn add(&self, fingerprint: u64, _weight: i64, now_ns: i64) {
        self.inner.lock().bump(fingerprint, now_ns);
    }

    fn on_access(&self, fingerprint: u64, now_ns: i64) {
        self.inner.lock().bump(fingerprint, now_ns);
    }

    fn remove(&self, fingerprint: u64) {
        self.inner.lock().remove(fingerprint);
    }

    fn evict_one(&self) -> Option<u64> {
        let mut inner = self.inner.lock();
        let victim = inner.sample_worst()?;
        inner.remove(victim);
        Some(victim)
    }

    fn len(&self) -> usize {
        self.inner.lock().stats.len()
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.stats.clear();
        inner.order.clear();
    }
}
