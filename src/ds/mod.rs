pub mod block_pool;
pub mod expiry_ring;
pub mod primes;
pub mod shard;
pub mod xorshift;

pub use block_pool::BlockPool;
pub use expiry_ring::ExpiryRing;
pub use primes::{modulo_fn, prime_at_least, ModuloFn, PRIMES};
pub use shard::ShardSelector;
pub use xorshift::XorShift64Star;
