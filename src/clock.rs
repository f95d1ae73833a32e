//! Monotonic millisecond time as an explicit capability.
//!
//! The cache never reads a clock on its own: every time-sensitive
//! operation takes a `now_ms` argument, and callers decide where ticks
//! come from. [`MonotonicClock`] is the seam for that decision;
//! [`StdClock`] is the obvious implementation over `std::time::Instant`.
//!
//! Ticks are 32-bit signed milliseconds computed modulo 2³². Expiration
//! comparisons use wrapping signed subtraction, which tolerates roughly
//! 24 days of forward wrap. The contract requires non-decreasing ticks;
//! a clock that jumps backward makes live entries look not-yet-expired
//! until time catches up again.

use std::time::Instant;

/// Millisecond tick, modulo 2³². Compared with wrapping signed
/// subtraction.
pub type TimeMs = i32;

/// Source of non-decreasing millisecond ticks.
///
/// No wall-clock semantics: tick zero is an arbitrary origin and only
/// differences are meaningful.
pub trait MonotonicClock {
    fn now_ms(&self) -> TimeMs;
}

/// Monotonic clock measuring from its own construction.
#[derive(Debug, Clone)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for StdClock {
    fn now_ms(&self) -> TimeMs {
        self.origin.elapsed().as_millis() as u32 as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn std_clock_is_non_decreasing() {
        let clock = StdClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b.wrapping_sub(a) >= 0);
    }

    #[test]
    fn std_clock_advances_with_real_time() {
        let clock = StdClock::new();
        let start = clock.now_ms();
        std::thread::sleep(Duration::from_millis(15));
        let later = clock.now_ms();
        assert!(later.wrapping_sub(start) >= 10);
    }
}
