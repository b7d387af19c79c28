//! Time sources for the scheduler.
//!
//! The drain loop measures continuation durations and the throughput quota
//! through a [`Clock`] so tests can drive it deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic millisecond time source.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_ms(&self) -> u64;
}

/// Production clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually driven clock.
///
/// Every read advances time by `step_ms`, which lets a test simulate slow
/// continuations without sleeping.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
    step_ms: u64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock that moves forward by `step_ms` on each read.
    pub fn ticking(step_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(0),
            step_ms,
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.fetch_add(self.step_ms, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticking_clock_advances_per_read() {
        let clock = ManualClock::ticking(30);
        assert_eq!(clock.now_ms(), 0);
        assert_eq!(clock.now_ms(), 30);
        clock.advance(100);
        assert_eq!(clock.now_ms(), 160);
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let first = clock.now_ms();
        assert!(clock.now_ms() >= first);
    }
}
