//! ABOUTME: First-difference rate estimation over a cumulative counter
//! ABOUTME: Handles counter resets and duplicate or out-of-order timestamps

use std::time::Instant;
use tracing::debug;

/// Converts a monotonically increasing counter into a per-second rate.
///
/// The first observation only seeds the baseline. A decreasing counter is
/// taken to mean the source restarted and becomes the new baseline. This is a
/// heuristic: a wraparound on a very large counter looks the same.
#[derive(Debug, Clone, Default)]
pub struct RateEstimator {
    last_counter: Option<u64>,
    last_timestamp: Option<Instant>,
}

impl RateEstimator {
    /// Create an estimator with no baseline
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one counter reading taken at `timestamp` and return the rate per second
    ///
    /// # Examples
    ///
    /// ```
    /// use bd_series::RateEstimator;
    /// use std::time::{Duration, Instant};
    ///
    /// let t0 = Instant::now();
    /// let mut estimator = RateEstimator::new();
    /// assert_eq!(estimator.observe(100, t0), 0.0);
    /// assert_eq!(estimator.observe(150, t0 + Duration::from_secs(5)), 10.0);
    /// ```
    pub fn observe(&mut self, counter: u64, timestamp: Instant) -> f64 {
        let (last_counter, last_timestamp) = match (self.last_counter, self.last_timestamp) {
            (Some(c), Some(t)) => (c, t),
            _ => {
                self.seed(counter, timestamp);
                return 0.0;
            }
        };

        if counter < last_counter {
            debug!(
                previous = last_counter,
                current = counter,
                "Counter decreased, treating as restart"
            );
            self.seed(counter, timestamp);
            return 0.0;
        }

        let elapsed = match timestamp.checked_duration_since(last_timestamp) {
            Some(elapsed) if !elapsed.is_zero() => elapsed,
            // Duplicate or out-of-order tick: keep the old baseline
            _ => return 0.0,
        };

        self.seed(counter, timestamp);
        (counter - last_counter) as f64 / elapsed.as_secs_f64()
    }

    /// Current baseline, if one has been recorded
    pub fn baseline(&self) -> Option<(u64, Instant)> {
        self.last_counter.zip(self.last_timestamp)
    }

    fn seed(&mut self, counter: u64, timestamp: Instant) {
        self.last_counter = Some(counter);
        self.last_timestamp = Some(timestamp);
    }
}
