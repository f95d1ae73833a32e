/// Point-in-time view of the cache eviction counters.
///
/// Counters are monotonic (until [`Cache::reset`](crate::cache::Cache::reset))
/// and diagnostic: updates race with cache traffic and may undercount.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    pub evict_called: u64,
    pub evict_expired: u64,
    pub evict_force: u64,
    pub evict_not_expired: u64,
    /// Ring head referenced a key absent from its shard table (orphan
    /// produced by `evict_by_ref`), silently dropped.
    pub evict_lookup_failed: u64,
    /// Ring was empty when evict peeked.
    pub evict_peek_failed: u64,
    /// High-water mark of live entries.
    pub max_occupancy: u64,

    /// Per-shard table counters, aggregated over all shards.
    pub table: TableStats,
}

/// Probe-table operation counters.
///
/// `*_collisions` count occupied-but-mismatching slots walked during
/// probing; `max_collisions` is the longest chain any operation walked.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub store_calls: u64,
    pub store_success: u64,
    pub store_collisions: u64,

    pub load_calls: u64,
    pub load_success: u64,

    pub remove_calls: u64,
    pub remove_success: u64,

    /// Collisions walked by the shared probe loop (load + remove).
    pub find_collisions: u64,
    pub max_collisions: u64,
}

impl TableStats {
    /// Folds another shard's counters into this snapshot.
    pub(crate) fn merge(&mut self, other: &TableStats) {
        self.store_calls += other.store_calls;
        self.store_success += other.store_success;
        self.store_collisions += other.store_collisions;
        self.load_calls += other.load_calls;
        self.load_success += other.load_success;
        self.remove_calls += other.remove_calls;
        self.remove_success += other.remove_success;
        self.find_collisions += other.find_collisions;
        self.max_collisions = self.max_collisions.max(other.max_collisions);
    }
}

/// Block-pool counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// CAS retries observed by `alloc_sync`.
    pub alloc_congested: u64,
    /// CAS retries observed by `free_sync`.
    pub free_congested: u64,
    /// Frees rejected for an out-of-range or unaligned address.
    pub free_bad_address: u64,
    /// Low-water mark of available blocks.
    pub min_availability: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_stats_merge_sums_and_maxes() {
        let mut a = TableStats {
            store_calls: 2,
            store_success: 2,
            store_collisions: 1,
            load_calls: 4,
            load_success: 3,
            remove_calls: 1,
            remove_success: 1,
            find_collisions: 2,
            max_collisions: 3,
        };
        let b = TableStats {
            store_calls: 1,
            max_collisions: 5,
            ..TableStats::default()
        };
        a.merge(&b);
        assert_eq!(a.store_calls, 3);
        assert_eq!(a.load_calls, 4);
        assert_eq!(a.max_collisions, 5);
    }
}
