//! Count-Min Sketch frequency estimator (component B).
//!
//! Packs four 16-bit saturating counters per `AtomicU64` word, same packed-
//! atomic-word technique as the teacher's nibble sketch but widened lanes so
//! a single estimate saturates at `u16::MAX` instead of 15. `depth` rows each
//! get an independent index derived from one seed via repeated `mix64`
//! diffusion, so a single hash produces all `depth` probes without a
//! dedicated hasher per row.

use std::hint;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

const LANE_MASK: u64 = 0xFFFF;
const LANES_PER_WORD: u32 = 4;

const MAX_CAS_TRIES: usize = 64;
const YIELD_EVERY_TRIES: usize = 8;
const SLEEP_AFTER_TRIES: usize = 32;

fn mix64(x: u64) -> u64 {
    const INC: u64 = 0x9E37_79B9_7F4A_7C15;
    const MUL1: u64 = 0xBF58_476D_1CE4_E5B9;
    const MUL2: u64 = 0x94D0_49BB_1331_11EB;

    let mut x = x.wrapping_add(INC);
    x = (x ^ (x >> 30)).wrapping_mul(MUL1);
    x = (x ^ (x >> 27)).wrapping_mul(MUL2);
    x ^ (x >> 31)
}

fn next_pow2(x: u32) -> u32 {
    (x.max(1) as usize).next_power_of_two() as u32
}

/// A `depth`-row by `width`-column matrix of saturating 16-bit counters.
pub struct Sketch {
    words: Vec<AtomicU64>,
    width_mask: u32,
    depth: u32,
    adds: AtomicU64,
    reset_at: u64,
    aging_active: AtomicU32,
}

impl Sketch {
    /// `width` need not be a power of two on input; it is rounded up.
    /// `reset_after` bounds how many increments accumulate before the whole
    /// table is halved (spec.md's periodic aging).
    pub fn new(depth: u32, width: u32, reset_after: u64) -> Self {
        let depth = depth.max(1);
        let width_pow2 = next_pow2(width);
        let lanes_total = width_pow2 as u64 * depth as u64;
        let word_count = ((lanes_total + (LANES_PER_WORD as u64 - 1)) / LANES_PER_WORD as u64).max(1);

        let words: Vec<AtomicU64> = (0..word_count).map(|_| AtomicU64::new(0)).collect();

        let reset_at = if reset_after == 0 {
            (width_pow2 as u64 * depth as u64).max(1) * 10
        } else {
            reset_after
        };

        Self {
            words,
            width_mask: width_pow2 - 1,
            depth,
            adds: AtomicU64::new(0),
            reset_at,
            aging_active: AtomicU32::new(0),
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn width(&self) -> u32 {
        self.width_mask + 1
    }

    /// Increments the `depth` counters addressed by `seed`, then checks
    /// whether the aging threshold has been crossed.
    pub fn increment(&self, seed: u64) {
        self.maybe_reset();
        let mut h = seed;
        for row in 0..self.depth {
            let col = (h as u32) & self.width_mask;
            self.inc_lane(self.lane_index(row, col));
            h = mix64(h);
        }
        self.adds.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the minimum of the `depth` counters addressed by `seed`.
    pub fn estimate(&self, seed: u64) -> u16 {
        let mut h = seed;
        let mut min = u16::MAX;
        for row in 0..self.depth {
            let col = (h as u32) & self.width_mask;
            let v = self.get_lane(self.lane_index(row, col));
            if v < min {
                min = v;
            }
            h = mix64(h);
        }
        min
    }

    /// Halves every counter, discarding the remainder bit (spec.md's aging
    /// rule: `new = old >> 1`).
    pub fn reset(&self) {
        for word in &self.words {
            for tries in 1..=MAX_CAS_TRIES {
                let old = word.load(Ordering::Relaxed);
                let halved = halve_word(old);
                if word
                    .compare_exchange(old, halved, Ordering::SeqCst, Ordering::Relaxed)
                    .is_ok()
                {
                    break;
                }
                backoff(tries);
            }
        }
        self.adds.store(0, Ordering::Relaxed);
    }

    fn maybe_reset(&self) {
        if self.adds.load(Ordering::Relaxed) < self.reset_at {
            return;
        }
        if self
            .aging_active
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            if self.adds.load(Ordering::Relaxed) >= self.reset_at {
                self.reset();
            }
            self.aging_active.store(0, Ordering::Relaxed);
        }
    }

    fn lane_index(&self, row: u32, col: u32) -> u64 {
        row as u64 * self.width() as u64 + col as u64
    }

    fn word_shift(idx: u64) -> (usize, u32) {
        ((idx / LANES_PER_WORD as u64) as usize, (idx % LANES_PER_WORD as u64) as u32 * 16)
    }

    fn get_lane(&self, idx: u64) -> u16 {
        let (w, sh) = Self::word_shift(idx);
        let val = self.words[w].load(Ordering::Relaxed);
        ((val >> sh) & LANE_MASK) as u16
    }

    fn inc_lane(&self, idx: u64) {
        let (w, sh) = Self::word_shift(idx);
        let ptr = &self.words[w];
        for tries in 1..=MAX_CAS_TRIES {
            let old = ptr.load(Ordering::Relaxed);
            let n = (old >> sh) & LANE_MASK;
            if n == LANE_MASK {
                return;
            }
            let neu = old + (1 << sh);
            if ptr
                .compare_exchange(old, neu, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            backoff(tries);
        }
    }
}

fn halve_word(word: u64) -> u64 {
    let mut out = 0u64;
    for lane in 0..LANES_PER_WORD {
        let sh = lane * 16;
        let v = (word >> sh) & LANE_MASK;
        out |= (v >> 1) << sh;
    }
    out
}

fn backoff(tries: usize) {
    if tries % YIELD_EVERY_TRIES == 0 {
        hint::spin_loop();
        if tries >= SLEEP_AFTER_TRIES {
            std::thread::yield_now();
        }
    }
}
