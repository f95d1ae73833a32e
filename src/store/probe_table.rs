//! Open-addressed, linear-probing table with a fixed collision budget.
//!
//! The table maps a 64-bit caller identity (`key_id`) plus its 64-bit
//! hash (`key_hash`) to an opaque 64-bit value. It allocates once at
//! construction and never again: no resize, no rehash, no tombstones.
//! Exceeding the collision budget is a store failure, not a growth
//! trigger.
//!
//! ## Architecture
//!
//! ```text
//!   slots: [Slot; prime + budget]        Slot (24 bytes)
//!                                        ┌──────────────────────────┐
//!   index = modulo(key_hash)             │ key_hash: u64 (bit 63 =  │
//!       │                                │           IN-USE flag,   │
//!       ▼                                │           63-bit hash)   │
//!   ┌─────┬─────┬─────┬─────┬─────┐      │ key_id:   u64            │
//!   │  A  │  B  │     │  C  │     │      │ value:    u64            │
//!   └─────┴─────┴─────┴─────┴─────┘      └──────────────────────────┘
//!    walk ──────────────────► at most `budget` slots, no wrap
//! ```
//!
//! The capacity is rounded up to a prime from [`crate::ds::primes`] and
//! the slot array carries `budget` extra slots so the last chain can run
//! to completion without wrapping. Slot selection divides by the prime
//! through a per-prime specialized function.
//!
//! ## Probe discipline
//!
//! `store` claims the first free slot of the chain. `load` and `remove`
//! walk the full budget and never stop early at a free slot: a removal
//! leaves a hole in its chain (no backshift), and entries displaced past
//! the hole must stay reachable. The flip side is that a miss always
//! costs `budget` probes; the intended workloads are hit-heavy.
//!
//! ## Performance Characteristics
//!
//! | Operation       | Time            | Notes                            |
//! |-----------------|-----------------|----------------------------------|
//! | `store`         | O(budget) worst | stops at first free slot         |
//! | `load`          | O(budget)       | full walk, bounded               |
//! | `remove`        | O(budget)       | clears slot, leaves hole         |
//! | `remove_by_ref` | O(1)            | direct slot clear                |
//! | `next_occupied` | O(n)            | maintenance scans only           |
//!
//! Not thread-safe: shards wrap the table in an RwLock and synchronize
//! externally. Counters on `&self` paths use [`StatCell`] under that
//! same contract.

use std::mem;

use crate::ds::primes::{modulo_fn, prime_at_least, ModuloFn};
use crate::metrics::{StatCell, TableStats};

const IN_USE: u64 = 1 << 63;
const HASH_MASK: u64 = !IN_USE;

/// One table slot. Exactly 24 bytes, alignment-friendly.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    key_hash: u64,
    key_id: u64,
    value: u64,
}

const SLOT_BYTES: usize = mem::size_of::<Slot>();

impl Slot {
    #[inline]
    fn in_use(&self) -> bool {
        self.key_hash & IN_USE != 0
    }
}

/// In-table reference: byte offset of a slot from the slot-array base.
///
/// Lets a caller re-enter the table and delete in O(1) without
/// re-probing. 32 bits bound the addressable slot array to 4 GiB, far
/// beyond any practical in-memory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef(u32);

impl SlotRef {
    /// Byte offset from the slot-array base.
    pub fn offset(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Default)]
struct TableCounters {
    store_calls: StatCell,
    store_success: StatCell,
    store_collisions: StatCell,
    load_calls: StatCell,
    load_success: StatCell,
    remove_calls: StatCell,
    remove_success: StatCell,
    find_collisions: StatCell,
    max_collisions: StatCell,
}

impl TableCounters {
    fn snapshot(&self) -> TableStats {
        TableStats {
            store_calls: self.store_calls.get(),
            store_success: self.store_success.get(),
            store_collisions: self.store_collisions.get(),
            load_calls: self.load_calls.get(),
            load_success: self.load_success.get(),
            remove_calls: self.remove_calls.get(),
            remove_success: self.remove_success.get(),
            find_collisions: self.find_collisions.get(),
            max_collisions: self.max_collisions.get(),
        }
    }

    fn reset(&self) {
        self.store_calls.reset();
        self.store_success.reset();
        self.store_collisions.reset();
        self.load_calls.reset();
        self.load_success.reset();
        self.remove_calls.reset();
        self.remove_success.reset();
        self.find_collisions.reset();
        self.max_collisions.reset();
    }
}

/// Bounded-probe associative map from `(key_id, key_hash)` to a 64-bit
/// value.
#[derive(Debug)]
pub struct ProbeTable {
    slots: Box<[Slot]>,
    prime: u64,
    modulo: ModuloFn,
    collision_budget: usize,
    len: usize,
    counters: TableCounters,
}

impl ProbeTable {
    /// Builds a table for at least `capacity` entries with the given
    /// probe budget (clamped to at least 1).
    pub fn new(capacity: usize, collision_budget: usize) -> Self {
        let collision_budget = collision_budget.max(1);
        let prime = prime_at_least(capacity.max(1) as u64);
        let modulo = modulo_fn(prime).expect("selected prime has a specialized modulo");
        let slots = vec![Slot::default(); prime as usize + collision_budget];
        Self {
            slots: slots.into_boxed_slice(),
            prime,
            modulo,
            collision_budget,
            len: 0,
            counters: TableCounters::default(),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Chosen prime size (slot count minus the probe headroom).
    pub fn size(&self) -> usize {
        self.prime as usize
    }

    pub fn collision_budget(&self) -> usize {
        self.collision_budget
    }

    /// Inserts `(key_id, key_hash) -> value`.
    ///
    /// `false` on a duplicate key or when the probe budget is exhausted.
    /// Existing entries are never overwritten.
    pub fn store(&mut self, key_id: u64, key_hash: u64, value: u64) -> bool {
        self.counters.store_calls.incr();
        let tagged = key_hash | IN_USE;
        let mut index = (self.modulo)(key_hash & HASH_MASK);
        let mut walked = 0u64;
        loop {
            let slot = &mut self.slots[index];
            if !slot.in_use() {
                *slot = Slot {
                    key_hash: tagged,
                    key_id,
                    value,
                };
                self.len += 1;
                self.counters.store_success.incr();
                self.counters.max_collisions.raise_to(walked);
                return true;
            }
            if slot.key_hash == tagged && slot.key_id == key_id {
                self.counters.max_collisions.raise_to(walked);
                return false;
            }
            self.counters.store_collisions.incr();
            walked += 1;
            if walked as usize == self.collision_budget {
                self.counters.max_collisions.raise_to(walked);
                return false;
            }
            index += 1;
        }
    }

    /// Shared probe walk: full budget, no early exit on free slots, so
    /// entries displaced past a removal hole stay reachable.
    fn probe(&self, key_id: u64, key_hash: u64) -> Option<usize> {
        let tagged = key_hash | IN_USE;
        let mut index = (self.modulo)(key_hash & HASH_MASK);
        let mut walked = 0u64;
        loop {
            let slot = &self.slots[index];
            if slot.key_hash == tagged && slot.key_id == key_id {
                self.counters.max_collisions.raise_to(walked);
                return Some(index);
            }
            if slot.in_use() {
                self.counters.find_collisions.incr();
            }
            walked += 1;
            if walked as usize == self.collision_budget {
                self.counters.max_collisions.raise_to(walked);
                return None;
            }
            index += 1;
        }
    }

    /// Looks up a key; the returned [`SlotRef`] re-enters the table in
    /// O(1) for [`ProbeTable::remove_by_ref`].
    pub fn load(&self, key_id: u64, key_hash: u64) -> Option<(u64, SlotRef)> {
        self.counters.load_calls.incr();
        let index = self.probe(key_id, key_hash)?;
        self.counters.load_success.incr();
        Some((
            self.slots[index].value,
            SlotRef((index * SLOT_BYTES) as u32),
        ))
    }

    /// Removes a key and returns its value. Leaves a probe hole; no
    /// tombstones, no backshift.
    pub fn remove(&mut self, key_id: u64, key_hash: u64) -> Option<u64> {
        self.counters.remove_calls.incr();
        let index = self.probe(key_id, key_hash)?;
        let value = self.slots[index].value;
        self.slots[index] = Slot::default();
        self.len -= 1;
        self.counters.remove_success.incr();
        Some(value)
    }

    /// Clears the referenced slot unconditionally.
    pub fn remove_by_ref(&mut self, slot_ref: SlotRef) {
        let index = slot_ref.0 as usize / SLOT_BYTES;
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.in_use() {
                self.len -= 1;
            }
            *slot = Slot::default();
        }
    }

    /// First in-use slot at or after `index`, as
    /// `(slot_index, key_id, value)`. Maintenance scans resume from
    /// `slot_index + 1`.
    pub fn next_occupied(&self, index: usize) -> Option<(usize, u64, u64)> {
        self.slots
            .iter()
            .enumerate()
            .skip(index)
            .find(|(_, slot)| slot.in_use())
            .map(|(idx, slot)| (idx, slot.key_id, slot.value))
    }

    /// Zeroes every slot and clears statistics.
    pub fn reset(&mut self) {
        self.slots.fill(Slot::default());
        self.len = 0;
        self.counters.reset();
    }

    pub fn statistics(&self) -> TableStats {
        self.counters.snapshot()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let live = self.slots.iter().filter(|slot| slot.in_use()).count();
        assert_eq!(self.len, live);
        assert_eq!(self.slots.len(), self.prime as usize + self.collision_budget);
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use rustc_hash::FxHashMap;

    #[derive(Debug, Clone)]
    enum Op {
        Store(u64, u64),
        Load(u64),
        Remove(u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let key = 0u64..64;
        prop_oneof![
            3 => (key.clone(), any::<u64>()).prop_map(|(k, v)| Op::Store(k, v)),
            2 => key.clone().prop_map(Op::Load),
            1 => key.prop_map(Op::Remove),
        ]
    }

    fn spread(key: u64) -> u64 {
        key.wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }

    proptest! {
        /// Property: every successfully stored entry stays loadable with
        /// its exact value until removed, and absent keys never load,
        /// regardless of the holes removals punch into probe chains.
        #[test]
        fn prop_matches_map_model(
            ops in prop::collection::vec(op_strategy(), 0..300)
        ) {
            let mut table = ProbeTable::new(128, 16);
            let mut model: FxHashMap<u64, u64> = FxHashMap::default();

            for op in ops {
                match op {
                    Op::Store(key, value) => {
                        let ok = table.store(key, spread(key), value);
                        if model.contains_key(&key) {
                            // Duplicates must be rejected.
                            prop_assert!(!ok);
                        } else if ok {
                            model.insert(key, value);
                        }
                    },
                    Op::Load(key) => {
                        let got = table.load(key, spread(key)).map(|(v, _)| v);
                        prop_assert_eq!(got, model.get(&key).copied());
                    },
                    Op::Remove(key) => {
                        let got = table.remove(key, spread(key));
                        prop_assert_eq!(got, model.remove(&key));
                    },
                }
                prop_assert_eq!(table.len(), model.len());
            }
            table.debug_validate_invariants();
        }
    }
}
