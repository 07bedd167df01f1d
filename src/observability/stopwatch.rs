//! Monotonic elapsed-time measurement.

use std::time::Instant;

/// Measures elapsed seconds from a baseline on the monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    baseline: Instant,
}

impl Stopwatch {
    /// Create a stopwatch baselined at now.
    pub fn start() -> Self {
        Self {
            baseline: Instant::now(),
        }
    }

    /// Re-baseline to now.
    pub fn reset(&mut self) {
        self.baseline = Instant::now();
    }

    /// Seconds since the baseline. Does not reset it.
    pub fn stop(&self) -> f64 {
        self.baseline.elapsed().as_secs_f64()
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start()
    }
}
