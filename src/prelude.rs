pub use crate::cache::{key_hash, Cache, Config, ItemRef};
pub use crate::clock::{MonotonicClock, StdClock, TimeMs};
pub use crate::ds::{BlockPool, ExpiryRing, ShardSelector, XorShift64Star};
pub use crate::error::ConfigError;
pub use crate::metrics::{PoolStats, Statistics, TableStats};
pub use crate::store::{ProbeTable, SlotRef};
