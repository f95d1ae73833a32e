//! Diagnostic counters and their public snapshots.
//!
//! Two recording styles, matching how each structure is synchronized:
//! counters behind a shard lock use [`StatCell`] (plain cell, no atomic
//! traffic on the hot path); counters updated without a lock use relaxed
//! atomics owned by the structure itself. Snapshots are plain `Copy`
//! structs taken best-effort.

pub mod cell;
pub mod snapshot;

pub use cell::StatCell;
pub use snapshot::{PoolStats, Statistics, TableStats};
