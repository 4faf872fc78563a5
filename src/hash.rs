//! Key fingerprinting and shard-index selection (component A).

use xxhash_rust::xxh3::xxh3_64;

/// Produces the 64-bit fingerprint of a key. Two distinct keys may collide
/// on their fingerprint; the sharded store treats the fingerprint itself as
/// the stored identity (spec.md §4.A).
pub fn fingerprint(key: &[u8]) -> u64 {
    xxh3_64(key)
}

/// Rounds `n` up to the next power of two, with a floor of 1.
pub fn next_pow2(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// Selects a shard index from a fingerprint given a power-of-two shard
/// count. `shard_count` must already be a power of two; callers validate
/// this once at construction (see `Config::validate`).
#[inline]
pub fn shard_index(fp: u64, shard_count: usize) -> usize {
    debug_assert!(shard_count.is_power_of_two());
    (fp & (shard_count as u64 - 1)) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_within_process() {
        let a = fingerprint(b"alpha");
        let b = fingerprint(b"alpha");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_for_distinct_keys_in_practice() {
        assert_ne!(fingerprint(b"alpha"), fingerprint(b"beta"));
    }

    #[test]
    fn next_pow2_rounds_up() {
        assert_eq!(next_pow2(0), 1);
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(5), 8);
        assert_eq!(next_pow2(256), 256);
    }

    #[test]
    fn shard_index_is_low_bits() {
        assert_eq!(shard_index(0b1010, 8), 0b010);
        assert_eq!(shard_index(0xFFFF_FFFF_FFFF_FFFF, 16), 15);
    }
}
