//! Sharded, bounded, expiration-only cache.
//!
//! The façade composes the probe tables, the expiration ring and a
//! caller-supplied clock into Store/Load/Evict/EvictByRef for
//! DNS-style workloads: short pre-hashed keys, opaque 32-bit payloads,
//! read-mostly traffic, zero heap allocation on the hot paths.
//!
//! ## Architecture
//!
//! ```text
//!                         Cache
//!   ┌─────────────────────────────────────────────────────────┐
//!   │  ShardSelector: key_id & (shard_count - 1)              │
//!   │                                                         │
//!   │  ┌─ Shard 0 ───────────┐   ┌─ Shard 1 ───────────┐      │
//!   │  │ RwLock<ProbeTable>  │   │ RwLock<ProbeTable>  │  …   │
//!   │  └─────────────────────┘   └─────────────────────┘      │
//!   │                                                         │
//!   │  ExpiryRing (global, insertion order = expiry order)    │
//!   │  EvictionCounters (relaxed atomics)                     │
//!   └─────────────────────────────────────────────────────────┘
//!
//!   store(key_id, payload, now):
//!     shard write lock → table.store → ring.add
//!   load(key_id):
//!     shard read lock → table.load → (payload, ItemRef)
//!   evict(now, force):
//!     ring.peek → shard write lock → expiry test → remove + ring.pop
//! ```
//!
//! ## Entry lifecycle
//!
//! NotStored → `store` → Stored → `evict` (expired or forced) or
//! `evict_by_ref` → NotStored. Entries are immutable once stored;
//! a duplicate `store` is rejected. `evict` removes at most one entry
//! per call, so flush loops call it until it reports nothing expired.
//!
//! ## Values
//!
//! An entry value packs `(expiration_ms << 32) | payload`. The payload
//! is opaque to the cache; the intended convention is a block offset
//! from [`BlockPool::base`](crate::ds::BlockPool::base). The cache never
//! dereferences payloads.
//!
//! ## Concurrency
//!
//! Operations on one shard are linearizable under its RwLock. The ring
//! is shared across shards and only best-effort FIFO: store moves its
//! tail under one shard's lock while evict moves its head under
//! another's. The benign outcomes of that race (stale peek, zero id)
//! are absorbed by the evict lookup-failed path.

use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHasher;

use crate::clock::TimeMs;
use crate::ds::{ExpiryRing, ShardSelector};
use crate::error::ConfigError;
use crate::metrics::Statistics;
use crate::store::{ProbeTable, SlotRef};

/// Probe budget used when [`Config::collisions`] is zero.
pub const DEFAULT_COLLISIONS: usize = 64;

/// Load-factor percent used when [`Config::load_factor`] is zero.
pub const DEFAULT_LOAD_FACTOR: usize = 50;

/// Hashes raw key bytes (e.g. a domain name) to the 64-bit key id the
/// cache consumes. Callers with pre-hashed keys skip this entirely.
pub fn key_hash(key: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(key);
    hasher.finish()
}

/// Cache construction parameters. Zero means "use the default" for
/// every field except `size` and `ttl_ms`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    /// Target maximum number of live entries.
    pub size: usize,
    /// Shard count; 0 selects 2 x logical CPUs. Rounded up to a power
    /// of two either way.
    pub shards: usize,
    /// Uniform expiration delta applied at store time.
    pub ttl_ms: TimeMs,
    /// Per-operation probe budget; 0 selects [`DEFAULT_COLLISIONS`].
    pub collisions: usize,
    /// Table load factor in percent; 0 selects [`DEFAULT_LOAD_FACTOR`].
    pub load_factor: usize,
}

impl Config {
    pub fn new(size: usize, ttl_ms: TimeMs) -> Self {
        Self {
            size,
            ttl_ms,
            ..Self::default()
        }
    }
}

/// Opaque handle to a stored entry: shard index plus in-shard slot
/// reference. Lets the owner delete the exact entry in O(1) via
/// [`Cache::evict_by_ref`] without re-probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRef {
    shard: u32,
    slot: SlotRef,
}

#[derive(Debug)]
struct Shard {
    table: RwLock<ProbeTable>,
}

#[derive(Debug, Default)]
struct EvictionCounters {
    evict_called: AtomicU64,
    evict_expired: AtomicU64,
    evict_force: AtomicU64,
    evict_not_expired: AtomicU64,
    evict_lookup_failed: AtomicU64,
    evict_peek_failed: AtomicU64,
    max_occupancy: AtomicU64,
}

impl EvictionCounters {
    fn snapshot(&self) -> Statistics {
        Statistics {
            evict_called: self.evict_called.load(Ordering::Relaxed),
            evict_expired: self.evict_expired.load(Ordering::Relaxed),
            evict_force: self.evict_force.load(Ordering::Relaxed),
            evict_not_expired: self.evict_not_expired.load(Ordering::Relaxed),
            evict_lookup_failed: self.evict_lookup_failed.load(Ordering::Relaxed),
            evict_peek_failed: self.evict_peek_failed.load(Ordering::Relaxed),
            max_occupancy: self.max_occupancy.load(Ordering::Relaxed),
            ..Statistics::default()
        }
    }

    fn reset(&self) {
        self.evict_called.store(0, Ordering::Relaxed);
        self.evict_expired.store(0, Ordering::Relaxed);
        self.evict_force.store(0, Ordering::Relaxed);
        self.evict_not_expired.store(0, Ordering::Relaxed);
        self.evict_lookup_failed.store(0, Ordering::Relaxed);
        self.evict_peek_failed.store(0, Ordering::Relaxed);
        self.max_occupancy.store(0, Ordering::Relaxed);
    }
}

/// Bounded-capacity, expiration-only cache over pre-hashed 64-bit keys.
#[derive(Debug)]
pub struct Cache {
    shards: Box<[Shard]>,
    selector: ShardSelector,
    ring: ExpiryRing,
    ttl_ms: TimeMs,
    size: usize,
    counters: EvictionCounters,
}

impl Cache {
    /// Builds a cache, validating user-supplied parameters.
    pub fn try_new(config: Config) -> Result<Self, ConfigError> {
        if config.size == 0 {
            return Err(ConfigError::new("cache size must be > 0"));
        }
        if config.load_factor > 100 {
            return Err(ConfigError::new("load factor is a percentage <= 100"));
        }

        let selector = if config.shards == 0 {
            ShardSelector::for_host()
        } else {
            ShardSelector::new(config.shards)
        };
        let collisions = if config.collisions == 0 {
            DEFAULT_COLLISIONS
        } else {
            config.collisions
        };
        let load_factor = if config.load_factor == 0 {
            DEFAULT_LOAD_FACTOR
        } else {
            config.load_factor
        };

        let shard_count = selector.shard_count();
        let per_shard = (config.size * 100 / load_factor / shard_count).max(1);
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(Shard {
                table: RwLock::new(ProbeTable::new(per_shard, collisions)),
            });
        }

        Ok(Self {
            shards: shards.into_boxed_slice(),
            selector,
            ring: ExpiryRing::new(config.size),
            ttl_ms: config.ttl_ms,
            size: config.size,
            counters: EvictionCounters::default(),
        })
    }

    /// Builds a cache, clamping out-of-range parameters instead of
    /// failing: a zero size becomes 1 and a load factor above 100 is
    /// treated as 100.
    pub fn new(config: Config) -> Self {
        let config = Config {
            size: config.size.max(1),
            load_factor: config.load_factor.min(100),
            ..config
        };
        Self::try_new(config).expect("clamped config is valid")
    }

    /// Adds an entry expiring `ttl_ms` after `now_ms`.
    ///
    /// `false` when the key is already present, its probe chain is
    /// saturated, or the expiration ring is full. Entries are never
    /// updated in place; evict first to replace one.
    pub fn store(&self, key_id: u64, payload: u32, now_ms: TimeMs) -> bool {
        let expiration = now_ms.wrapping_add(self.ttl_ms);
        let value = ((expiration as u32 as u64) << 32) | payload as u64;

        let shard = &self.shards[self.selector.shard_for_hash(key_id)];
        let mut table = shard.table.write();
        if !table.store(key_id, key_id, value) {
            return false;
        }
        let ring_ok = self.ring.add(key_id);
        let occupancy = self.ring.len() as u64;
        drop(table);

        self.counters
            .max_occupancy
            .fetch_max(occupancy, Ordering::Relaxed);
        ring_ok
    }

    /// Looks up an entry, returning its payload and a handle for O(1)
    /// targeted removal.
    pub fn load(&self, key_id: u64) -> Option<(u32, ItemRef)> {
        let shard_index = self.selector.shard_for_hash(key_id);
        let (value, slot) = self.shards[shard_index]
            .table
            .read()
            .load(key_id, key_id)?;
        Some((
            (value & 0xFFFF_FFFF) as u32,
            ItemRef {
                shard: shard_index as u32,
                slot,
            },
        ))
    }

    /// Removes the oldest entry if it has expired by `now_ms` (or
    /// unconditionally with `force`), returning its payload.
    ///
    /// Expiry compares `(expiration_ms - now_ms) <= 0` in wrapping
    /// signed arithmetic, tolerating ~24 days of forward wrap. Removes
    /// at most one entry; loop until `None` to drain. An orphan ring
    /// head (left by [`Cache::evict_by_ref`]) is dropped silently and
    /// reported as `None`.
    pub fn evict(&self, now_ms: TimeMs, force: bool) -> Option<u32> {
        self.counters.evict_called.fetch_add(1, Ordering::Relaxed);

        let Some(key_id) = self.ring.peek() else {
            self.counters
                .evict_peek_failed
                .fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let shard = &self.shards[self.selector.shard_for_hash(key_id)];
        let mut table = shard.table.write();

        let Some((value, slot)) = table.load(key_id, key_id) else {
            // Entry is in the ring but not in the table: evict_by_ref
            // orphaned it, or a racing store has not landed yet.
            self.ring.pop();
            drop(table);
            self.counters
                .evict_lookup_failed
                .fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let expiration = (value >> 32) as u32 as TimeMs;
        let expired = expiration.wrapping_sub(now_ms) <= 0;
        if expired || force {
            self.ring.pop();
            table.remove_by_ref(slot);
            drop(table);
            self.counters.evict_expired.fetch_add(1, Ordering::Relaxed);
            if !expired {
                self.counters.evict_force.fetch_add(1, Ordering::Relaxed);
            }
            Some((value & 0xFFFF_FFFF) as u32)
        } else {
            drop(table);
            self.counters
                .evict_not_expired
                .fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Removes one specific entry in O(1).
    ///
    /// The expiration ring is not touched: the stale ring entry is
    /// observed and dropped by a later [`Cache::evict`], which counts it
    /// as a lookup failure.
    pub fn evict_by_ref(&self, item: ItemRef) {
        if let Some(shard) = self.shards.get(item.shard as usize) {
            shard.table.write().remove_by_ref(item.slot);
        }
    }

    /// Current occupancy (queued ring entries).
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn ttl_ms(&self) -> TimeMs {
        self.ttl_ms
    }

    pub fn shard_count(&self) -> usize {
        self.selector.shard_count()
    }

    /// Destroys all entries and clears statistics. Not thread-safe.
    pub fn reset(&mut self) {
        for shard in self.shards.iter_mut() {
            shard.table.get_mut().reset();
        }
        self.ring.reset();
        self.counters.reset();
    }

    /// Best-effort snapshot of the eviction counters plus the table
    /// counters aggregated over all shards.
    pub fn statistics(&self) -> Statistics {
        let mut stats = self.counters.snapshot();
        for shard in self.shards.iter() {
            stats.table.merge(&shard.table.read().statistics());
        }
        stats
    }
}
