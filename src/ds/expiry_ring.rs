//! Insertion-ordered ring of key ids backing time-based eviction.
//!
//! A fixed-capacity single-in/single-out queue: stores append key ids at
//! the tail, eviction inspects and pops at the head. Order equals
//! insertion order, which for a uniform TTL equals expiration order.
//!
//! ## Architecture
//!
//! ```text
//!   data: [AtomicU64; capacity + 1]
//!
//!           head                      tail
//!            │                         │
//!            ▼                         ▼
//!   ┌─────┬─────┬─────┬─────┬─────┬─────┐
//!   │ id3 │ id4 │ id5 │ id6 │     │     │
//!   └─────┴─────┴─────┴─────┴─────┴─────┘
//!
//!   head == tail            → empty
//!   inc(tail) == head       → full (one slot is always sacrificed)
//! ```
//!
//! ## Concurrency
//!
//! The ring is best-effort FIFO, not linearizable. `tail` is only moved
//! by stores and `head` only by eviction, but the two run under
//! *different* shard locks, so head and tail mutations race each other.
//! Slots and cursors are atomics, which pins the failure modes down to
//! the benign ones:
//!
//! - a racing `peek` may observe a stale head (the next call catches up)
//! - a `peek` overlapping an in-flight `add` may observe a slot before
//!   its id is written, yielding a zero/stale id that the cache drops
//!   through its lookup-failed path
//! - two `add`s racing from different shards can overwrite one
//!   another's slot; the losing entry never expires on its own (the
//!   same leak class as a full ring) and is reclaimed by targeted
//!   removal or reset
//!
//! No torn values, no crashes, no resurrection of popped entries.
//! Under a single thread the FIFO order is exact.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Fixed-capacity insertion-ordered queue of 64-bit key ids.
#[derive(Debug)]
pub struct ExpiryRing {
    data: Box<[AtomicU64]>,
    head: AtomicUsize,
    tail: AtomicUsize,
    capacity: usize,
}

impl ExpiryRing {
    /// Creates a ring holding at most `capacity` ids.
    pub fn new(capacity: usize) -> Self {
        let slots = capacity + 1;
        let mut data = Vec::with_capacity(slots);
        data.resize_with(slots, || AtomicU64::new(0));
        Self {
            data: data.into_boxed_slice(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            capacity,
        }
    }

    #[inline]
    fn inc(&self, cursor: usize) -> usize {
        if cursor < self.capacity {
            cursor + 1
        } else {
            0
        }
    }

    /// Appends `key_id`; `false` if the ring is full.
    pub fn add(&self, key_id: u64) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let new_tail = self.inc(tail);
        if new_tail == self.head.load(Ordering::Acquire) {
            return false;
        }
        self.data[tail].store(key_id, Ordering::Relaxed);
        self.tail.store(new_tail, Ordering::Release);
        true
    }

    /// Returns the oldest id without removing it.
    pub fn peek(&self) -> Option<u64> {
        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }
        Some(self.data[head].load(Ordering::Relaxed))
    }

    /// Removes and returns the oldest id.
    pub fn pop(&self) -> Option<u64> {
        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }
        let key_id = self.data[head].load(Ordering::Relaxed);
        self.head.store(self.inc(head), Ordering::Release);
        Some(key_id)
    }

    /// Number of queued ids. An estimate while writers race.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        let slots = self.capacity + 1;
        (tail + slots - head) % slots
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every queued id. Not thread-safe.
    pub fn reset(&mut self) {
        *self.head.get_mut() = 0;
        *self.tail.get_mut() = 0;
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let slots = self.capacity + 1;
        assert!(self.head.load(Ordering::Relaxed) < slots);
        assert!(self.tail.load(Ordering::Relaxed) < slots);
        assert!(self.len() <= self.capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_is_fifo() {
        let ring = ExpiryRing::new(4);
        assert!(ring.add(10));
        assert!(ring.add(20));
        assert!(ring.add(30));
        assert_eq!(ring.pop(), Some(10));
        assert_eq!(ring.pop(), Some(20));
        assert_eq!(ring.pop(), Some(30));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn ring_rejects_add_when_full() {
        let ring = ExpiryRing::new(2);
        assert!(ring.add(1));
        assert!(ring.add(2));
        assert!(!ring.add(3));
        assert_eq!(ring.len(), 2);

        // Popping one frees exactly one slot.
        assert_eq!(ring.pop(), Some(1));
        assert!(ring.add(3));
        assert!(!ring.add(4));
    }

    #[test]
    fn peek_does_not_advance() {
        let ring = ExpiryRing::new(2);
        assert_eq!(ring.peek(), None);
        ring.add(7);
        assert_eq!(ring.peek(), Some(7));
        assert_eq!(ring.peek(), Some(7));
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.pop(), Some(7));
        assert_eq!(ring.peek(), None);
    }

    #[test]
    fn len_tracks_wrapped_cursors() {
        let ring = ExpiryRing::new(3);
        for round in 0..10u64 {
            assert!(ring.add(round));
            assert_eq!(ring.len(), 1);
            assert_eq!(ring.pop(), Some(round));
            assert_eq!(ring.len(), 0);
            ring.debug_validate_invariants();
        }
    }

    #[test]
    fn reset_empties_the_ring() {
        let mut ring = ExpiryRing::new(4);
        ring.add(1);
        ring.add(2);
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.peek(), None);
        assert!(ring.add(3));
        assert_eq!(ring.pop(), Some(3));
    }

    #[test]
    fn zero_capacity_ring_is_always_full() {
        let ring = ExpiryRing::new(0);
        assert!(!ring.add(1));
        assert_eq!(ring.peek(), None);
        assert_eq!(ring.pop(), None);
        assert_eq!(ring.len(), 0);
    }
}
