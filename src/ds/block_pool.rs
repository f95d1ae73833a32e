//! Fixed-size raw block pool.
//!
//! Lends equally sized raw memory blocks out of one contiguous arena in
//! O(1) with no heap traffic after construction. Callers own the block
//! contents between `alloc` and `free`; the pool itself never
//! dereferences a lent block. Because the arena is contiguous, a block
//! address compresses to a 32-bit offset from [`BlockPool::base`], which
//! is the payload format the cache stores.
//!
//! ## Architecture
//!
//! ```text
//!   arena: block_size * capacity bytes (one allocation)
//!   ┌────────┬────────┬────────┬────────┐
//!   │ blk 0  │ blk 1  │ blk 2  │ blk 3  │
//!   └────────┴────────┴────────┴────────┘
//!
//!   stack: [addr3, addr2, addr1, addr0]     free addresses
//!                                   ▲
//!                                  top
//!
//!   alloc: top -= 1, hand out stack[top]
//!   free:  validate addr, stack[top] = addr, top += 1
//! ```
//!
//! ## Variants
//!
//! - `alloc` / `free` take `&mut self` and touch nothing atomic.
//! - `alloc_sync` / `free_sync` move `top` with a compare-and-swap loop
//!   and count retries as congestion. The CAS protects the cursor, not
//!   the slot write: a `free_sync` racing an `alloc_sync` on the same
//!   slot can hand out the slot's previous occupant. Multi-writer
//!   lock-free correctness is explicitly not a goal; pair the sync
//!   variants as single-producer/single-consumer or fence externally.
//!
//! ## Failure semantics
//!
//! `alloc` on an empty pool returns `None`. `free` of an address outside
//! the arena, or not on a block boundary, returns `false` and bumps
//! `free_bad_address`. An interior double free is not detected; a double
//! free that would overflow the stack is rejected.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::metrics::PoolStats;

const BLOCK_ALIGN: usize = 8;

#[derive(Debug, Default)]
struct PoolCounters {
    alloc_congested: AtomicU64,
    free_congested: AtomicU64,
    free_bad_address: AtomicU64,
    min_availability: AtomicU64,
}

impl PoolCounters {
    fn snapshot(&self) -> PoolStats {
        PoolStats {
            alloc_congested: self.alloc_congested.load(Ordering::Relaxed),
            free_congested: self.free_congested.load(Ordering::Relaxed),
            free_bad_address: self.free_bad_address.load(Ordering::Relaxed),
            min_availability: self.min_availability.load(Ordering::Relaxed),
        }
    }

    fn note_availability(&self, available: usize) {
        self.min_availability
            .fetch_min(available as u64, Ordering::Relaxed);
    }

    fn reset(&self, capacity: usize) {
        self.alloc_congested.store(0, Ordering::Relaxed);
        self.free_congested.store(0, Ordering::Relaxed);
        self.free_bad_address.store(0, Ordering::Relaxed);
        self.min_availability.store(capacity as u64, Ordering::Relaxed);
    }
}

/// Pool of `capacity` raw blocks of `block_size` bytes each.
#[derive(Debug)]
pub struct BlockPool {
    arena: NonNull<u8>,
    layout: Layout,
    stack: Box<[AtomicUsize]>,
    top: AtomicUsize,
    block_size: usize,
    capacity: usize,
    counters: PoolCounters,
}

// SAFETY:
// The arena pointer is owned exclusively by the pool and only handed out
// as raw block addresses that the pool never dereferences. All interior
// mutability goes through atomics.
unsafe impl Send for BlockPool {}
unsafe impl Sync for BlockPool {}

impl BlockPool {
    /// Allocates the arena and free stack. Both parameters are clamped
    /// to at least 1.
    pub fn new(block_size: usize, capacity: usize) -> Self {
        let block_size = block_size.max(1);
        let capacity = capacity.max(1);
        let layout = Layout::from_size_align(block_size * capacity, BLOCK_ALIGN)
            .expect("pool arena layout is valid");
        // SAFETY: layout has non-zero size (both factors are >= 1).
        let arena = unsafe { alloc_zeroed(layout) };
        let arena = NonNull::new(arena).expect("pool arena allocation failed");

        let mut stack = Vec::with_capacity(capacity);
        stack.resize_with(capacity, || AtomicUsize::new(0));

        let mut pool = Self {
            arena,
            layout,
            stack: stack.into_boxed_slice(),
            top: AtomicUsize::new(0),
            block_size,
            capacity,
            counters: PoolCounters::default(),
        };
        pool.reset();
        pool
    }

    #[inline]
    fn min_addr(&self) -> usize {
        self.arena.as_ptr() as usize
    }

    #[inline]
    fn max_addr(&self) -> usize {
        self.min_addr() + self.block_size * (self.capacity - 1)
    }

    /// Arena start; block addresses are `base + k * block_size`.
    pub fn base(&self) -> *mut u8 {
        self.arena.as_ptr()
    }

    /// Maximum number of blocks in the pool.
    pub fn size(&self) -> usize {
        self.capacity
    }

    /// Bytes owned by the pool (arena plus free stack).
    pub fn size_bytes(&self) -> usize {
        self.layout.size() + self.stack.len() * std::mem::size_of::<AtomicUsize>()
    }

    /// Blocks currently available for allocation.
    pub fn availability(&self) -> usize {
        self.top.load(Ordering::Relaxed)
    }

    /// Range-and-alignment membership test.
    pub fn belongs(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        addr >= self.min_addr()
            && addr <= self.max_addr()
            && (addr - self.min_addr()) % self.block_size == 0
    }

    /// Pops a free block. Not thread-safe; see [`BlockPool::alloc_sync`].
    pub fn alloc(&mut self) -> Option<NonNull<u8>> {
        let top = *self.top.get_mut();
        if top == 0 {
            return None;
        }
        *self.top.get_mut() = top - 1;
        let addr = *self.stack[top - 1].get_mut();
        self.counters.note_availability(top - 1);
        NonNull::new(addr as *mut u8)
    }

    /// Returns a block to the pool. Not thread-safe.
    pub fn free(&mut self, ptr: *const u8) -> bool {
        if !self.belongs(ptr) {
            self.counters.free_bad_address.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let top = *self.top.get_mut();
        if top == self.capacity {
            self.counters.free_bad_address.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        *self.stack[top].get_mut() = ptr as usize;
        *self.top.get_mut() = top + 1;
        true
    }

    /// Pops a free block with a CAS on the stack cursor.
    pub fn alloc_sync(&self) -> Option<NonNull<u8>> {
        loop {
            let top = self.top.load(Ordering::Acquire);
            if top == 0 {
                return None;
            }
            match self.top.compare_exchange_weak(
                top,
                top - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let addr = self.stack[top - 1].load(Ordering::Acquire);
                    self.counters.note_availability(top - 1);
                    return NonNull::new(addr as *mut u8);
                },
                Err(_) => {
                    self.counters.alloc_congested.fetch_add(1, Ordering::Relaxed);
                },
            }
        }
    }

    /// Returns a block with a CAS on the stack cursor.
    pub fn free_sync(&self, ptr: *const u8) -> bool {
        if !self.belongs(ptr) {
            self.counters.free_bad_address.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        loop {
            let top = self.top.load(Ordering::Acquire);
            if top == self.capacity {
                self.counters.free_bad_address.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            match self.top.compare_exchange_weak(
                top,
                top + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.stack[top].store(ptr as usize, Ordering::Release);
                    return true;
                },
                Err(_) => {
                    self.counters.free_congested.fetch_add(1, Ordering::Relaxed);
                },
            }
        }
    }

    /// Restores full availability and clears statistics. Not thread-safe.
    pub fn reset(&mut self) {
        for (index, slot) in self.stack.iter_mut().enumerate() {
            *slot.get_mut() = self.arena.as_ptr() as usize + index * self.block_size;
        }
        *self.top.get_mut() = self.capacity;
        self.counters.reset(self.capacity);
    }

    pub fn statistics(&self) -> PoolStats {
        self.counters.snapshot()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let top = self.top.load(Ordering::Relaxed);
        assert!(top <= self.capacity);

        let mut seen = std::collections::HashSet::new();
        for slot in self.stack.iter().take(top) {
            let addr = slot.load(Ordering::Relaxed) as *const u8;
            assert!(self.belongs(addr));
            assert!(seen.insert(addr as usize));
        }
    }
}

impl Drop for BlockPool {
    fn drop(&mut self) {
        // SAFETY: arena was allocated with exactly this layout and is
        // freed once, here.
        unsafe { dealloc(self.arena.as_ptr(), self.layout) };
    }
}
