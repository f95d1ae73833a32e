// ==============================================
// END-TO-END CACHE SCENARIOS (integration)
// ==============================================
//
// Full store → expire → evict lifecycles through the public API,
// including the block-pool payload convention and the deferred ring
// cleanup after targeted removal.

use ttlkit::cache::{key_hash, Cache, Config};
use ttlkit::ds::{BlockPool, XorShift64Star};

fn single_shard(size: usize, ttl_ms: i32) -> Cache {
    Cache::new(Config {
        size,
        shards: 1,
        ttl_ms,
        load_factor: 100,
        ..Config::default()
    })
}

// ==============================================
// Natural expiry
// ==============================================

#[test]
fn single_entry_expires_naturally() {
    let cache = single_shard(1, 10);

    assert!(cache.store(0, 0, 0));
    assert_eq!(cache.evict(0, false), None);
    assert_eq!(cache.evict(11, false), Some(0));
    assert!(cache.load(0).is_none());
}

// ==============================================
// Duplicate rejection
// ==============================================

#[test]
fn duplicate_store_fails_on_size_one_cache() {
    let cache = single_shard(1, 10);

    assert!(cache.store(0, 0, 0));
    assert!(!cache.store(0, 0, 0));
}

// ==============================================
// Pool round-trip through the cache
// ==============================================
//
// The payload convention: allocate a block, store its offset from the
// pool base, recover the block from the evicted payload.

#[test]
fn pool_block_round_trips_through_the_cache() {
    let ttl = 10;
    let cache = single_shard(1, ttl);
    let mut pool = BlockPool::new(16, 1);

    let block = pool.alloc().expect("pool has a block");

    // SAFETY: the block is lent to us until freed; 16 bytes are valid.
    unsafe {
        let ints = block.as_ptr() as *mut u32;
        ints.write(1);
        ints.add(1).write(2);
    }

    let offset = (block.as_ptr() as usize - pool.base() as usize) as u32;
    assert!(cache.store(0, offset, 0));

    let payload = cache.evict(ttl + 1, false).expect("entry expired");
    assert_eq!(payload, offset);

    let recovered = unsafe { pool.base().add(payload as usize) };
    assert!(pool.belongs(recovered));
    let ints = recovered as *const u32;
    unsafe {
        assert_eq!(ints.read(), 1);
        assert_eq!(ints.add(1).read(), 2);
    }

    assert!(pool.free(recovered));
    assert!(!pool.free(&pool as *const BlockPool as *const u8));
    assert!(!pool.free(std::ptr::null()));
}

// ==============================================
// Targeted removal and deferred ring cleanup
// ==============================================

#[test]
fn evict_by_ref_then_evict_cleans_the_ring() {
    let cache = single_shard(4, 1_000);
    let key = key_hash(b"stale.example.com.");

    assert!(cache.store(key, 42, 0));
    let (_, item) = cache.load(key).expect("entry is live");

    cache.evict_by_ref(item);
    assert!(cache.load(key).is_none());

    let before = cache.statistics().evict_lookup_failed;
    assert_eq!(cache.evict(0, false), None);
    assert_eq!(cache.statistics().evict_lookup_failed, before + 1);
}

// ==============================================
// Forced eviction
// ==============================================

#[test]
fn force_eviction_removes_a_live_entry() {
    let cache = single_shard(4, 1_000);
    let key = key_hash(b"fresh.example.com.");

    assert!(cache.store(key, 7, 0));
    assert_eq!(cache.evict(0, true), Some(7));
    assert!(cache.load(key).is_none());
}

// ==============================================
// High-water occupancy
// ==============================================

#[test]
fn filling_the_cache_records_the_high_water_mark() {
    let size = 64;
    let cache = Cache::new(Config {
        size,
        shards: 2,
        ttl_ms: 100,
        ..Config::default()
    });

    let mut rng = XorShift64Star::new(1);
    let mut keys = Vec::with_capacity(size);
    while keys.len() < size {
        let key = rng.next();
        if cache.store(key, keys.len() as u32, 0) {
            keys.push(key);
        }
    }

    assert_eq!(cache.len(), size);
    assert_eq!(cache.statistics().max_occupancy, size as u64);

    // Ring is full: one more distinct key must be rejected.
    assert!(!cache.store(rng.next(), 0, 0));

    // Drain restores emptiness in insertion order.
    for expected in 0..size as u32 {
        assert_eq!(cache.evict(1_000, false), Some(expected));
    }
    assert!(cache.is_empty());
}

// ==============================================
// Occupancy bookkeeping
// ==============================================

#[test]
fn len_moves_by_one_per_store_and_evict() {
    let cache = single_shard(8, 50);

    for key in 0..5u64 {
        assert!(cache.store(key, key as u32, 0));
        assert_eq!(cache.len(), key as usize + 1);
    }
    assert!(cache.len() <= cache.size());

    for remaining in (0..5usize).rev() {
        assert!(cache.evict(100, false).is_some());
        assert_eq!(cache.len(), remaining);
    }
}

// ==============================================
// Reset
// ==============================================

#[test]
fn reset_clears_entries_ring_and_statistics() {
    let mut cache = single_shard(8, 50);
    for key in 0..5u64 {
        assert!(cache.store(key, key as u32, 0));
    }
    let _ = cache.evict(0, true);

    cache.reset();
    assert!(cache.is_empty());
    for key in 0..5u64 {
        assert!(cache.load(key).is_none());
    }
    let stats = cache.statistics();
    assert_eq!(stats.evict_called, 0);
    assert_eq!(stats.max_occupancy, 0);
    assert_eq!(stats.table.store_calls, 0);
}
