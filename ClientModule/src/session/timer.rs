//! Fixed-interval timer driven by elapsed tick time.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval: Duration,
    elapsed: Duration,
}

impl IntervalTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
        }
    }

    /// Accumulate `dt`; returns `true` at most once per call when the
    /// interval has elapsed. A long stall does not cause a burst.
    pub fn advance(&mut self, dt: Duration) -> bool {
        self.elapsed += dt;
        if self.elapsed < self.interval {
            return false;
        }
        self.elapsed -= self.interval;
        if self.elapsed >= self.interval {
            self.elapsed = Duration::ZERO;
        }
        true
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_interval() {
        let mut timer = IntervalTimer::new(Duration::from_millis(1500));
        let tick = Duration::from_millis(500);
        let fired: Vec<bool> = (0..6).map(|_| timer.advance(tick)).collect();
        assert_eq!(fired, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn stall_does_not_burst() {
        let mut timer = IntervalTimer::new(Duration::from_secs(1));
        assert!(timer.advance(Duration::from_secs(10)));
        assert!(!timer.advance(Duration::from_millis(10)));
    }
}
