//! The rate controller: turns a [`crate::load_pattern::LoadPattern`] into a
//! stream of release signals any number of concurrent callers can await.
//!
//! Paces with `sleep_until(next_fire)`, recomputing the cycle length from
//! the *current* target rate every iteration so the schedule self-corrects
//! instead of compounding drift. N callers share one atomic release
//! counter, so the whole engine tracks a single source of truth for "how
//! many iterations should have started by now."

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::time::sleep_until;

use crate::load_pattern::{LoadPattern, TotalDuration};

/// Shares one [`LoadPattern`] across every dispatching caller and hands out
/// monotonically increasing iteration indices at the pattern's prescribed
/// rate. Also the run's stop point: `stop()` makes every waiter return
/// `None` immediately, independent of the pattern's own `total_duration`,
/// so patterns with no natural end (`SineWave`/`Spike` built with
/// `total: None`, or `Adaptive` before it reaches its `Terminal` state)
/// can still be cancelled externally.
pub struct RateController {
    pattern: Arc<dyn LoadPattern>,
    start: Instant,
    released: AtomicU64,
    stopped: Arc<AtomicBool>,
    stop_signal: Notify,
}

impl RateController {
    pub fn new(pattern: Arc<dyn LoadPattern>) -> Self {
        Self {
            pattern,
            start: Instant::now(),
            released: AtomicU64::new(0),
            stopped: Arc::new(AtomicBool::new(false)),
            stop_signal: Notify::new(),
        }
    }

    /// Signal every current and future `wait_for_next` caller to stop
    /// releasing new iterations. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.stop_signal.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// The pattern's instantaneous target rate right now.
    pub fn current_tps(&self) -> f64 {
        self.pattern.tps_at(self.elapsed())
    }

    pub fn is_finished(&self) -> bool {
        match self.pattern.total_duration() {
            TotalDuration::Finite(total) => self.elapsed() >= total,
            TotalDuration::Infinite => false,
        }
    }

    /// Block until the next iteration should start, returning its index, or
    /// `None` once the pattern's total duration has elapsed. A missed
    /// deficit (the caller was too slow to keep up with the target rate) is
    /// forgiven at the next tick rather than released in a burst: the
    /// expected count is always `floor(rate(elapsed) * elapsed_s)`, a
    /// function of elapsed time alone, never an accumulating backlog.
    pub async fn wait_for_next(&self) -> Option<u64> {
        loop {
            if self.is_stopped() {
                return None;
            }

            let elapsed = self.elapsed();
            if let TotalDuration::Finite(total) = self.pattern.total_duration() {
                if elapsed >= total {
                    return None;
                }
            }

            let rate = self.pattern.tps_at(elapsed).max(0.0);
            let expected = (rate * elapsed.as_secs_f64()).floor().max(0.0) as u64;
            let released = self.released.load(Ordering::SeqCst);

            if released < expected {
                if self
                    .released
                    .compare_exchange(released, released + 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    return Some(released);
                }
                // Another caller claimed this slot first; immediately retry.
                continue;
            }

            let next_tick_secs = if rate > 0.0 {
                (expected as f64 + 1.0) / rate
            } else {
                // No throughput scheduled right now; poll for pattern changes.
                elapsed.as_secs_f64() + 0.05
            };
            let fire_at = self.start + Duration::from_secs_f64(next_tick_secs);
            tokio::select! {
                _ = sleep_until(tokio::time::Instant::from_std(fire_at)) => {}
                _ = self.stop_signal.notified() => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_pattern::Static;
    use std::time::Duration as StdDuration;

    #[tokio::test(flavor = "multi_thread")]
    async fn releases_stop_once_pattern_finishes() {
        let pattern = Arc::new(Static::new(1000.0, StdDuration::from_millis(50)).unwrap());
        let controller = RateController::new(pattern);
        let mut count = 0;
        while controller.wait_for_next().await.is_some() {
            count += 1;
            if count > 1000 {
                panic!("rate controller never finished");
            }
        }
        assert!(count > 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn indices_are_unique_across_concurrent_callers() {
        let pattern = Arc::new(Static::new(2000.0, StdDuration::from_millis(100)).unwrap());
        let controller = Arc::new(RateController::new(pattern));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let controller = Arc::clone(&controller);
            handles.push(tokio::spawn(async move {
                let mut indices = Vec::new();
                while let Some(i) = controller.wait_for_next().await {
                    indices.push(i);
                }
                indices
            }));
        }

        let mut all_indices = Vec::new();
        for handle in handles {
            all_indices.extend(handle.await.unwrap());
        }
        all_indices.sort_unstable();
        let mut deduped = all_indices.clone();
        deduped.dedup();
        assert_eq!(all_indices.len(), deduped.len(), "duplicate iteration index handed out");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_interrupts_an_infinite_pattern_immediately() {
        let pattern = Arc::new(
            crate::load_pattern::SineWave::new(100.0, 10.0, StdDuration::from_secs(60), None).unwrap(),
        );
        let controller = Arc::new(RateController::new(pattern));
        assert!(!controller.is_stopped());

        let waiter = Arc::clone(&controller);
        let handle = tokio::spawn(async move { waiter.wait_for_next().await });

        tokio::time::sleep(StdDuration::from_millis(10)).await;
        controller.stop();

        let result = tokio::time::timeout(StdDuration::from_secs(1), handle)
            .await
            .expect("stop() should make wait_for_next return promptly")
            .unwrap();
        assert!(result.is_none() || controller.is_stopped());
        assert!(controller.is_stopped());
    }

    #[test]
    fn current_tps_reflects_pattern() {
        let pattern = Arc::new(Static::new(42.0, StdDuration::from_secs(10)).unwrap());
        let controller = RateController::new(pattern);
        assert_eq!(controller.current_tps(), 42.0);
    }
}
