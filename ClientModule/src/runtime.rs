//! # Tick Loop
//!
//! Everything in this crate advances from one cooperative tick. The helpers
//! here drive a [`Tick`] implementor from a tokio interval on the caller's
//! runtime; no task or thread is spawned.

use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::object::SpatialClient;
use crate::session::SessionManager;

/// A component advanced once per frame
pub trait Tick {
    fn tick(&mut self, dt: Duration);
}

impl Tick for SessionManager {
    fn tick(&mut self, dt: Duration) {
        SessionManager::tick(self, dt)
    }
}

impl Tick for SpatialClient {
    fn tick(&mut self, dt: Duration) {
        SpatialClient::tick(self, dt)
    }
}

/// Tick `target` every `period`, `ticks` times
pub async fn run_ticks<T: Tick + ?Sized>(target: &mut T, period: Duration, ticks: usize) {
    run_until(target, period, ticks, |_| false).await;
}

/// Tick `target` every `period` until `done` holds or `max_ticks` elapsed.
/// Returns whether `done` was reached.
pub async fn run_until<T, F>(target: &mut T, period: Duration, max_ticks: usize, mut done: F) -> bool
where
    T: Tick + ?Sized,
    F: FnMut(&T) -> bool,
{
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    for _ in 0..max_ticks {
        interval.tick().await;
        let now = Instant::now();
        target.tick(now - last);
        last = now;
        if done(target) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        ticks: usize,
        elapsed: Duration,
    }

    impl Tick for Counter {
        fn tick(&mut self, dt: Duration) {
            self.ticks += 1;
            self.elapsed += dt;
        }
    }

    #[tokio::test]
    async fn runs_the_requested_number_of_ticks() {
        let mut counter = Counter::default();
        run_ticks(&mut counter, Duration::from_millis(1), 5).await;
        assert_eq!(counter.ticks, 5);
    }

    #[tokio::test]
    async fn stops_once_done() {
        let mut counter = Counter::default();
        let reached = run_until(&mut counter, Duration::from_millis(1), 100, |c| c.ticks == 3).await;
        assert!(reached);
        assert_eq!(counter.ticks, 3);
    }
}
