//! Named lock (component N): a string-keyed, reference-counted mutex map
//! for per-key critical sections.
//!
//! Grounded on the teacher's `shared/dedlog` pattern of a lazily-populated,
//! mutex-guarded side map keyed by string. Built but not wired into
//! `Cache::get_or_load`'s miss path — loader coalescing is an explicit
//! non-goal (spec.md §1, §9) — so this exists as a standalone utility an
//! embedder can reach for directly.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Hands out a per-key `Arc<Mutex<()>>`, evicting entries whose only
/// remaining owner is the map itself once the caller's guard is dropped.
pub struct KeyLock {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLock {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the mutex for `key`, creating it if this is the first caller
    /// to ask for it.
    pub fn slot(&self, key: &str) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock();
        if let Some(existing) = slots.get(key) {
            return existing.clone();
        }
        let fresh = Arc::new(Mutex::new(()));
        slots.insert(key.to_string(), fresh.clone());
        fresh
    }

    /// Drops slots nobody else holds a reference to, so the map doesn't
    /// grow without bound across the key space over the process lifetime.
    pub fn compact(&self) {
        let mut slots = self.slots.lock();
        slots.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KeyLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_returns_the_same_mutex() {
        let locks = KeyLock::new();
        let a = locks.slot("x");
        let b = locks.slot("x");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_keys_get_distinct_mutexes() {
        let locks = KeyLock::new();
        let a = locks.slot("x");
        let b = locks.slot("y");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn compact_drops_unreferenced_slots() {
        let locks = KeyLock::new();
        {
            let _a = locks.slot("x");
            assert_eq!(locks.len(), 1);
        }
        locks.compact();
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn compact_keeps_slots_still_held() {
        let locks = KeyLock::new();
        let _held = locks.slot("x");
        locks.compact();
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn a_locked_slot_blocks_a_second_critical_section() {
        let locks = KeyLock::new();
        let slot = locks.slot("x");
        let _guard = slot.lock();
        assert!(slot.try_lock().is_none());
    }
}
