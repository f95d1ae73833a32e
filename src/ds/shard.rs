//! Shard selection for pre-hashed keys.
//!
//! Sharded structures split their state across independent lock domains
//! and route every operation by key hash. The selector here works on
//! already-hashed 64-bit keys, so routing is a single mask: the shard
//! count is rounded up to a power of two at construction and the low
//! bits of the hash pick the shard.
//!
//! ```text
//!   key_hash ──► hash & (shard_count - 1) ──► shard index
//! ```
//!
//! Properties
//! ──────────
//! • Deterministic: the same hash always routes to the same shard
//! • Uniform: low bits of a well-mixed 64-bit hash spread evenly
//! • Cheap: one AND, no re-hashing on the lookup path
//!
//! ## Example Usage
//!
//! ```
//! use ttlkit::ds::ShardSelector;
//!
//! let selector = ShardSelector::new(6); // rounded up to 8
//! assert_eq!(selector.shard_count(), 8);
//!
//! let shard = selector.shard_for_hash(0xDEAD_BEEF);
//! assert!(shard < 8);
//! assert_eq!(selector.shard_for_hash(0xDEAD_BEEF), shard);
//! ```

/// Routes 64-bit key hashes to a power-of-two number of shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSelector {
    mask: u64,
}

impl ShardSelector {
    /// Creates a selector for at least `shards` shards.
    ///
    /// The count is clamped to at least 1 and rounded up to the next
    /// power of two so selection stays a single mask.
    pub fn new(shards: usize) -> Self {
        let count = shards.max(1).next_power_of_two();
        Self {
            mask: count as u64 - 1,
        }
    }

    /// Selector sized for the host: 2 x logical CPUs, rounded up.
    pub fn for_host() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        Self::new(2 * cpus)
    }

    /// Returns the number of shards (a power of two).
    pub fn shard_count(&self) -> usize {
        (self.mask + 1) as usize
    }

    /// Maps a pre-hashed key to a shard index in `[0, shard_count)`.
    #[inline]
    pub fn shard_for_hash(&self, key_hash: u64) -> usize {
        (key_hash & self.mask) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_selector_rounds_up_to_power_of_two() {
        assert_eq!(ShardSelector::new(0).shard_count(), 1);
        assert_eq!(ShardSelector::new(1).shard_count(), 1);
        assert_eq!(ShardSelector::new(3).shard_count(), 4);
        assert_eq!(ShardSelector::new(8).shard_count(), 8);
        assert_eq!(ShardSelector::new(9).shard_count(), 16);
    }

    #[test]
    fn shard_selector_is_deterministic() {
        let selector = ShardSelector::new(8);
        let a = selector.shard_for_hash(0x1234_5678_9ABC_DEF0);
        let b = selector.shard_for_hash(0x1234_5678_9ABC_DEF0);
        assert_eq!(a, b);
        assert!(a < selector.shard_count());
    }

    #[test]
    fn for_host_is_at_least_two_shards() {
        assert!(ShardSelector::for_host().shard_count() >= 2);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: selection always lands inside the shard range.
        #[test]
        fn prop_shard_in_range(
            shards in 1usize..512,
            hash in any::<u64>()
        ) {
            let selector = ShardSelector::new(shards);
            prop_assert!(selector.shard_for_hash(hash) < selector.shard_count());
        }

        /// Property: the rounded count is a power of two covering the request.
        #[test]
        fn prop_count_is_power_of_two(shards in 0usize..4096) {
            let count = ShardSelector::new(shards).shard_count();
            prop_assert!(count.is_power_of_two());
            prop_assert!(count >= shards.max(1));
            prop_assert!(count < 2 * shards.max(1).next_power_of_two() + 1);
        }

        /// Property: a single shard swallows every hash.
        #[test]
        fn prop_single_shard_returns_zero(hash in any::<u64>()) {
            prop_assert_eq!(ShardSelector::new(1).shard_for_hash(hash), 0);
        }
    }
}
