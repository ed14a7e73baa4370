//! Fixed-depth moving average over raw feedback samples.

use crate::config::{MAX_SMOOTH, MIN_SMOOTH};

/// Circular moving-average filter.
///
/// Invariant: `total` equals the sum of the first `window` buffer slots, and
/// slots not yet written hold 0. Before the window has been filled once the
/// output is the mean of the samples seen so far; callers gate readiness on
/// `is_primed()`.
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    readings: [u16; MAX_SMOOTH],
    window: usize,
    index: usize,
    total: u32,
    seen: usize,
}

impl SmoothingFilter {
    /// `window` is clamped to `MIN_SMOOTH..=MAX_SMOOTH`.
    pub fn new(window: usize) -> Self {
        Self {
            readings: [0; MAX_SMOOTH],
            window: window.clamp(MIN_SMOOTH, MAX_SMOOTH),
            index: 0,
            total: 0,
            seen: 0,
        }
    }

    /// Replace the oldest sample with `raw` and return the new average.
    pub fn push(&mut self, raw: u16) -> u16 {
        let slot = &mut self.readings[self.index];
        self.total -= u32::from(*slot);
        *slot = raw;
        self.total += u32::from(raw);
        self.index = (self.index + 1) % self.window;
        if self.seen < self.window {
            self.seen += 1;
        }
        self.value()
    }

    /// Current average (truncating), 0 before any sample.
    pub fn value(&self) -> u16 {
        if self.seen == 0 {
            return 0;
        }
        (self.total / self.seen as u32) as u16
    }

    /// True once a full window has been observed.
    pub fn is_primed(&self) -> bool {
        self.seen == self.window
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Running sum of the window (exposed for diagnostics).
    pub fn total(&self) -> u32 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_window_averages_samples_seen() {
        let mut f = SmoothingFilter::new(5);
        assert_eq!(f.value(), 0);
        assert_eq!(f.push(100), 100);
        assert_eq!(f.push(200), 150);
        assert!(!f.is_primed());
    }

    #[test]
    fn primes_after_exactly_one_window() {
        let mut f = SmoothingFilter::new(5);
        for _ in 0..4 {
            f.push(10);
        }
        assert!(!f.is_primed());
        f.push(10);
        assert!(f.is_primed());
    }

    #[test]
    fn overwrites_oldest_sample() {
        let mut f = SmoothingFilter::new(5);
        for v in [10, 20, 30, 40, 50] {
            f.push(v);
        }
        assert_eq!(f.value(), 30);
        // 10 drops out
        assert_eq!(f.push(60), 40);
        assert_eq!(f.total(), 20 + 30 + 40 + 50 + 60);
    }

    #[test]
    fn window_is_clamped() {
        assert_eq!(SmoothingFilter::new(1).window(), MIN_SMOOTH);
        assert_eq!(SmoothingFilter::new(500).window(), MAX_SMOOTH);
    }
}
