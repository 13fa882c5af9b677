//! Time sources for retry waits, deadlines and breaker cooldowns
//!
//! This module provides:
//! - `MonotonicClock`: `Instant`-anchored clock that really blocks on `sleep`
//! - `ManualClock`: hand-driven clock for tests and simulations

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Abstract time source used by the retry engine and the circuit breaker
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Get monotonic time in seconds (relative to clock creation)
    fn monotonic_time(&self) -> f64;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Wall-clock time source anchored on `Instant` (immune to NTP adjustments)
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start_time: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn monotonic_time(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

/// Clock that only moves when told to
///
/// `sleep` advances the clock by the requested duration instead of blocking,
/// which makes backoff schedules and cooldowns deterministic in tests.
///
/// # Example
///
/// ```rust
/// use retry_machines::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// clock.sleep(Duration::from_millis(1500));
/// clock.advance_secs(0.5);
/// assert_eq!(clock.monotonic_time(), 2.0);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Current time in seconds, stored as `f64` bits
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock starting at 0.0 seconds
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `seconds`
    pub fn advance_secs(&self, seconds: f64) {
        let mut current = self.now.load(Ordering::Acquire);
        loop {
            let next = (f64::from_bits(current) + seconds).to_bits();
            match self
                .now
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Jump to an absolute time in seconds
    pub fn set_secs(&self, seconds: f64) {
        self.now.store(seconds.to_bits(), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn monotonic_time(&self) -> f64 {
        f64::from_bits(self.now.load(Ordering::Acquire))
    }

    fn sleep(&self, duration: Duration) {
        self.advance_secs(duration.as_secs_f64());
    }
}
