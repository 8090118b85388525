//! Randomised delay ranges and attempt-based backoff.
//!
//! Every retry in the system waits a uniformly random delay drawn from a
//! configured `[min, max]` window. A multiplier above 1.0 grows the window
//! with the attempt count, capped at `max_backoff_ms`.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive `[min_ms, max_ms]` delay window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// A window that always yields the same delay.
    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    pub fn is_valid(&self) -> bool {
        self.min_ms <= self.max_ms
    }

    /// Draw a delay from the window.
    pub fn sample(&self) -> Duration {
        self.sample_with(&mut rand::thread_rng())
    }

    /// Draw a delay using the given RNG.
    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (low, high) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };
        Duration::from_millis(rng.gen_range(low..=high))
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

/// Backoff as an explicit function of the attempt number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    range: DelayRange,
    multiplier: f64,
    cap_ms: u64,
}

impl BackoffPolicy {
    /// Flat policy: every attempt draws from `range`.
    pub fn flat(range: DelayRange) -> Self {
        Self {
            range,
            multiplier: 1.0,
            cap_ms: range.max_ms.max(range.min_ms),
        }
    }

    /// Growing policy: the window is scaled by `multiplier^(attempt-1)`.
    pub fn growing(range: DelayRange, multiplier: f64, cap_ms: u64) -> Self {
        Self {
            range,
            multiplier: if multiplier.is_finite() && multiplier >= 1.0 {
                multiplier
            } else {
                1.0
            },
            cap_ms: cap_ms.max(range.max_ms.max(range.min_ms)),
        }
    }

    /// The delay window for a 1-based attempt number.
    pub fn window(&self, attempt: u32) -> DelayRange {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.multiplier.powi(exponent);
        let scale = |ms: u64| -> u64 {
            let scaled = (ms as f64 * factor).round();
            if scaled >= self.cap_ms as f64 {
                self.cap_ms
            } else {
                scaled as u64
            }
        };
        DelayRange::new(scale(self.range.min_ms), scale(self.range.max_ms))
    }

    /// Draw the delay for a 1-based attempt number.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.window(attempt).sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_stays_in_range() {
        let range = DelayRange::new(10, 20);
        for _ in 0..200 {
            let d = range.sample();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_fixed_range() {
        let range = DelayRange::fixed(500);
        assert_eq!(range.sample(), Duration::from_millis(500));
        assert!(range.is_valid());
    }

    #[test]
    fn test_inverted_range_is_invalid_but_safe() {
        let range = DelayRange::new(30, 10);
        assert!(!range.is_valid());
        let d = range.sample();
        assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(30));
    }

    #[test]
    fn test_flat_policy_ignores_attempt() {
        let policy = BackoffPolicy::flat(DelayRange::new(1000, 3000));
        assert_eq!(policy.window(1), DelayRange::new(1000, 3000));
        assert_eq!(policy.window(7), DelayRange::new(1000, 3000));
    }

    #[test]
    fn test_growing_policy_scales_and_caps() {
        let policy = BackoffPolicy::growing(DelayRange::new(100, 200), 2.0, 1000);
        assert_eq!(policy.window(1), DelayRange::new(100, 200));
        assert_eq!(policy.window(2), DelayRange::new(200, 400));
        assert_eq!(policy.window(3), DelayRange::new(400, 800));
        assert_eq!(policy.window(4), DelayRange::new(800, 1000));
        assert_eq!(policy.window(50), DelayRange::new(1000, 1000));
    }

    #[test]
    fn test_growing_policy_rejects_shrinking_multiplier() {
        let policy = BackoffPolicy::growing(DelayRange::new(100, 200), 0.5, 1000);
        assert_eq!(policy.window(3), DelayRange::new(100, 200));
    }

    #[test]
    fn test_delay_within_window() {
        let policy = BackoffPolicy::growing(DelayRange::new(10, 20), 2.0, 100);
        let d = policy.delay(2);
        assert!(d >= Duration::from_millis(20) && d <= Duration::from_millis(40));
    }
}
