//! Eviction policy set (components F–J).
//!
//! Grounded on spec.md §9's "Dynamic dispatch among policies": the façade
//! sees one abstract capability set regardless of which concrete policy
//! backs it. Policies never own the cached value — the store (component D)
//! is the single owner — they hold only a fingerprint plus whatever
//! ordering/frequency bookkeeping their strategy needs, matching §9's
//! "back-references without cycles" note.

pub mod lfu_bucket;
pub mod lfu_heap;
pub mod lru;
pub mod sampled_lfu;
pub mod tiny_lfu;

pub use lfu_bucket::LfuBucketPolicy;
pub use lfu_heap::LfuHeapPolicy;
pub use lru::LruPolicy;
pub use sampled_lfu::SampledLfuPolicy;
pub use tiny_lfu::TinyLfuPolicy;

/// The common capability set every eviction policy exposes to the façade.
pub trait Policy: Send + Sync {
    /// Registers a newly inserted fingerprint with its weight.
    fn add(&self, fingerprint: u64, weight: i64, now_ns: i64);

    /// Records an access, updating whatever ordering/frequency state the
    /// policy tracks for `fingerprint`. No-op if the fingerprint is
    /// unknown to this policy.
    fn on_access(&self, fingerprint: u64, now_ns: i64);

    /// Drops bookkeeping for a fingerprint (on delete or expiry). No-op if
    /// unknown.
    fn remove(&self, fingerprint: u64);

    /// Selects and removes the next victim, returning its fingerprint.
    /// Returns `None` if the policy holds no entries.
    fn evict_one(&self) -> Option<u64>;

    /// Re-registers a fingerprint that `evict_one` just selected, after the
    /// caller decided to keep it rather than actually evict it (the
    /// candidate lost the admission contest). Must not treat this as a
    /// fresh access: the fingerprint was the coldest entry a moment ago and
    /// should go back to the cold end, not jump to the front. Policies for
    /// which `add` already has no such effect can rely on the default.
    fn restore(&self, fingerprint: u64, weight: i64, now_ns: i64) {
        self.add(fingerprint, weight, now_ns);
    }

    fn len(&self) -> usize;

    fn clear(&self);
}
