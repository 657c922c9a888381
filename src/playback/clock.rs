//! Time sources for the scheduler and the control listener.
//!
//! Both sides must read the same timeline: the listener stamps the start reference with
//! `now()` and the scheduler subtracts it from its own `now()`.

use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic clock with a sleep primitive.
pub trait Clock {
    /// Seconds since an arbitrary, fixed epoch.
    fn now(&self) -> f64;

    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`Instant`]. Copies share the same epoch.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Simulated clock for deterministic tests. `sleep` advances time instantly.
#[derive(Debug, Default)]
pub struct ManualClock {
    current: Cell<f64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(seconds: f64) -> Self {
        Self {
            current: Cell::new(seconds),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.current.set(seconds);
    }

    pub fn advance(&self, seconds: f64) {
        self.current.set(self.current.get() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.current.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration.as_secs_f64());
    }
}
