//! Admission gate shared by the cache façade (component K) for the
//! `admission-policy` knob, independent of which eviction policy (F-J) is
//! in use. W-TinyLFU (policy J) carries its own internal copy of this same
//! record/allow shape since its admission contest is paced by the policy
//! itself rather than by the façade.
//!
//! Grounded on the teacher's `storage/lfu/tiny_lfu.rs::ShardedAdmitter`.

use crate::doorkeeper::Doorkeeper;
use crate::sketch::Sketch;

/// Gates whether a new key should displace the current eviction victim,
/// using a Count-Min Sketch frequency estimate and an optional doorkeeper.
pub struct Admitter {
    sketch: Sketch,
    door: Option<Doorkeeper>,
}

impl Admitter {
    pub fn new(depth: u32, width: u32, reset_after: u64, enable_doorkeeper: bool) -> Self {
        Self {
            sketch: Sketch::new(depth, width, reset_after),
            door: enable_doorkeeper.then(|| Doorkeeper::new(width * depth.max(1))),
        }
    }

    /// Records an access/insert for frequency estimation purposes.
    pub fn record(&self, fingerprint: u64) {
        match &self.door {
            Some(door) => {
                if door.seen_or_add(fingerprint) {
                    self.sketch.increment(fingerprint);
                }
            }
            None => self.sketch.increment(fingerprint),
        }
    }

    /// Returns `true` if `candidate` should be admitted over `victim`.
    /// With no current victim (empty cache edge case), admission is free.
    pub fn allow(&self, candidate: u64, victim: Option<u64>) -> bool {
        match victim {
            Some(victim) => self.sketch.estimate(candidate) > self.sketch.estimate(victim),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_frequent_candidate_beats_a_cold_victim() {
        let a = Admitter::new(4, 64, 1_000_000, false);
        for _ in 0..10 {
            a.record(1);
        }
        a.record(2);
        assert!(a.allow(1, Some(2)));
        assert!(!a.allow(2, Some(1)));
    }

    #[test]
    fn admission_is_free_with_no_victim() {
        let a = Admitter::new(4, 64, 1_000_000, false);
        assert!(a.allow(1, None));
    }

    #[test]
    fn doorkeeper_suppresses_the_first_sighting() {
        let a = Admitter::new(4, 64, 1_000_000, true);
        a.record(1); // first sighting: doorkeeper absorbs it, sketch untouched
        a.record(2);
        a.record(2); // second sighting: promoted into the sketch
        assert!(a.allow(2, Some(1)));
    }
}
