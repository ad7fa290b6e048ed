//! Exponential backoff calculator for retry delays

use std::time::Duration;

/// Exponential backoff strategy for batch retries.
///
/// Calculates delays that grow exponentially with each attempt,
/// up to a configurable maximum.
///
/// # Example
///
/// ```
/// use bsr_runner::retry::BackoffStrategy;
/// use std::time::Duration;
///
/// let backoff = BackoffStrategy::new(3_000, 60_000);
///
/// assert_eq!(backoff.calculate_delay(0), Duration::from_secs(3));
/// assert_eq!(backoff.calculate_delay(1), Duration::from_secs(6));
/// assert_eq!(backoff.calculate_delay(10), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffStrategy {
    /// Delay in milliseconds before the first retry
    initial_ms: u64,
    /// Cap for exponential growth
    max_ms: u64,
    /// Growth factor per attempt (default: 2.0)
    multiplier: f64,
}

impl BackoffStrategy {
    /// Create a new backoff strategy with the given initial and maximum delays.
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self {
            initial_ms,
            max_ms: max_ms.max(initial_ms),
            multiplier: 2.0,
        }
    }

    /// Set the multiplier for exponential growth.
    ///
    /// Values below 1.0 are clamped so delays never shrink.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Delay before the retry following zero-based `attempt`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = (self.initial_ms as f64) * self.multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.max_ms as f64) as u64;
        Duration::from_millis(capped_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl Default for BackoffStrategy {
    /// 3 seconds initial, 60 seconds max, 2x multiplier
    fn default() -> Self {
        Self::new(3_000, 60_000)
    }
}
