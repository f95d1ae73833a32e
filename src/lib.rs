//! ttlkit: bounded, expiration-only cache primitives for DNS-style
//! lookup workloads.
//!
//! Pre-hashed 64-bit keys, opaque 32-bit payloads, fixed capacity, one
//! uniform TTL. No allocation on the hot paths, bounded probe work under
//! collisions, FIFO expiration through a global ring. See `DESIGN.md`
//! for the internal architecture and invariants.

pub mod cache;
pub mod clock;
pub mod ds;
pub mod error;
pub mod metrics;
pub mod store;

pub mod prelude;
