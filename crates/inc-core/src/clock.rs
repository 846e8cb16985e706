//! Elapsed-time sources for the regulation loop.
//!
//! All timing logic consumes seconds since the engine started, never the
//! time of day. Production code uses [`MonotonicClock`]; tests drive a
//! [`ManualClock`] to hit exact phase and timer boundaries.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of elapsed seconds since some fixed start point.
pub trait Clock: Send {
    fn elapsed_s(&self) -> f64;
}

/// Wall-clock elapsed time measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    /// Start a clock at the current instant.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::start()
    }
}

impl Clock for MonotonicClock {
    fn elapsed_s(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Manually driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_s: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start_s.to_bits())),
        }
    }

    pub fn set(&self, t_s: f64) {
        self.bits.store(t_s.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, dt_s: f64) {
        self.set(self.now() + dt_s);
    }

    pub fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Clock for ManualClock {
    fn elapsed_s(&self) -> f64 {
        self.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_shared_between_clones() {
        let clock = ManualClock::new(0.0);
        let other = clock.clone();
        clock.advance(1.5);
        assert_eq!(other.elapsed_s(), 1.5);
        other.set(10.0);
        assert_eq!(clock.now(), 10.0);
    }

    #[test]
    fn monotonic_clock_never_negative() {
        let clock = MonotonicClock::start();
        let a = clock.elapsed_s();
        let b = clock.elapsed_s();
        assert!(a >= 0.0);
        assert!(b >= a);
    }
}
