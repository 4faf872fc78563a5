//! Generic stored entry, keyed by fingerprint and carrying the access-time
//! metadata eviction policies and the TTL manager read.
//!
//! Grounded on the teacher's `model::Entry` — atomics for fields mutated
//! without holding the shard's write lock — generalized from an HTTP
//! response payload to an arbitrary `V`.

use std::sync::atomic::{AtomicI64, Ordering};

/// Computes the accounting weight (spec.md §3 "size-bytes"/"cost", collapsed
/// here into one field) a value contributes towards `max-memory-bytes`.
/// Implemented for the common byte-ish value types; callers storing anything
/// else should wrap it in a type that implements this.
pub trait Weigh {
    fn weigh(&self) -> i64;
}

impl Weigh for Vec<u8> {
    fn weigh(&self) -> i64 {
        self.len() as i64
    }
}

impl Weigh for String {
    fn weigh(&self) -> i64 {
        self.len() as i64
    }
}

impl<T: Weigh> Weigh for std::sync::Arc<T> {
    fn weigh(&self) -> i64 {
        self.as_ref().weigh()
    }
}

/// A weighed, timestamped slot holding one cached value.
///
/// `touched_at` and `expire_at_ns` are atomics so the async access-time
/// pipeline and the TTL scavenger can update them without taking the
/// shard's write lock.
pub struct Entry<V> {
    pub(crate) value: V,
    weight: i64,
    touched_at: AtomicI64,
    inserted_at: i64,
    expire_at_ns: AtomicI64,
}

/// Sentinel meaning "no expiry" stored in `expire_at_ns`.
pub const NO_EXPIRY: i64 = i64::MAX;

impl<V> Entry<V> {
    pub fn new(value: V, weight: i64, now_ns: i64, expire_at_ns: Option<i64>) -> Self {
        Self {
            value,
            weight,
            touched_at: AtomicI64::new(now_ns),
            inserted_at: now_ns,
            expire_at_ns: AtomicI64::new(expire_at_ns.unwrap_or(NO_EXPIRY)),
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn weight(&self) -> i64 {
        self.weight
    }

    pub fn inserted_at(&self) -> i64 {
        self.inserted_at
    }

    pub fn touched_at(&self) -> i64 {
        self.touched_at.load(Ordering::Relaxed)
    }

    pub fn touch(&self, now_ns: i64) {
        self.touched_at.store(now_ns, Ordering::Relaxed);
    }

    pub fn expire_at_ns(&self) -> Option<i64> {
        let v = self.expire_at_ns.load(Ordering::Relaxed);
        if v == NO_EXPIRY {
            None
        } else {
            Some(v)
        }
    }

    pub fn set_expire_at_ns(&self, expire_at_ns: Option<i64>) {
        self.expire_at_ns
            .store(expire_at_ns.unwrap_or(NO_EXPIRY), Ordering::Relaxed);
    }

    pub fn is_expired(&self, now_ns: i64) -> bool {
        match self.expire_at_ns() {
            Some(t) => now_ns >= t,
            None => false,
        }
    }
}

impl<V: Clone> Clone for Entry<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            weight: self.weight,
            touched_at: AtomicI64::new(self.touched_at()),
            inserted_at: self.inserted_at,
            expire_at_ns: AtomicI64::new(self.expire_at_ns.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_expiry_by_default() {
        let e: Entry<&str> = Entry::new("v", 1, 1_000, None);
        assert!(!e.is_expired(i64::MAX - 1));
        assert_eq!(e.expire_at_ns(), None);
    }

    #[test]
    fn expires_at_or_after_deadline() {
        let e: Entry<&str> = Entry::new("v", 1, 0, Some(100));
        assert!(!e.is_expired(99));
        assert!(e.is_expired(100));
        assert!(e.is_expired(101));
    }

    #[test]
    fn touch_updates_touched_at() {
        let e: Entry<&str> = Entry::new("v", 1, 0, None);
        assert_eq!(e.touched_at(), 0);
        e.touch(42);
        assert_eq!(e.touched_at(), 42);
    }
}
