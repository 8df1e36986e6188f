//! The metrics collector: a striped, lock-sharded HDR histogram pair
//! (success/failure) plus plain atomic counters, instance-owned rather than
//! a process-wide global.
//!
//! Builds on the same `Arc<Mutex<Histogram<u64>>>` shape, with the same
//! 1µs-60s/3-significant-figure bounds, generalized from a single global
//! `Mutex<Histogram>` into `N` lock stripes so concurrent recorders from
//! different dispatch workers rarely contend on the same mutex. No hidden
//! globals: every `MetricsCollector` is built with `new()` and handed
//! explicitly to whoever needs it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::percentiles::{default_percentiles, Percentile};
use crate::task::{ExecutionRecord, Outcome};

const LOWEST_TRACKABLE_NANOS: u64 = 1_000; // 1 microsecond
const HIGHEST_TRACKABLE_NANOS: u64 = 60_000_000_000; // 60 seconds
const SIGNIFICANT_DIGITS: u8 = 3;

fn new_histogram() -> Histogram<u64> {
    Histogram::new_with_bounds(LOWEST_TRACKABLE_NANOS, HIGHEST_TRACKABLE_NANOS, SIGNIFICANT_DIGITS)
        .expect("hdrhistogram bounds are valid constants")
}

struct Stripe {
    success: Mutex<Histogram<u64>>,
    failure: Mutex<Histogram<u64>>,
}

impl Stripe {
    fn new() -> Self {
        Self {
            success: Mutex::new(new_histogram()),
            failure: Mutex::new(new_histogram()),
        }
    }
}

/// A point-in-time view of everything a [`MetricsCollector`] has recorded.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub run_id: Uuid,
    pub title: String,
    pub elapsed: Duration,
    pub total_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Success-latency percentiles, nanoseconds.
    pub latency_percentiles: Vec<(Percentile, u64)>,
    /// Failure-latency percentiles, nanoseconds — a failed execution still
    /// took time to fail, and callers diagnosing slow failures need this
    /// independent of the success histogram.
    pub failure_latency_percentiles: Vec<(Percentile, u64)>,
    pub success_rate_pct: f64,
    pub response_tps: f64,
    pub success_tps: f64,
    pub failure_tps: f64,
    pub auxiliary: HashMap<String, f64>,
}

impl MetricsSnapshot {
    pub fn success_percentile_ms(&self, percentile: f64) -> Option<f64> {
        Self::percentile_ms(&self.latency_percentiles, percentile)
    }

    pub fn failure_percentile_ms(&self, percentile: f64) -> Option<f64> {
        Self::percentile_ms(&self.failure_latency_percentiles, percentile)
    }

    fn percentile_ms(percentiles: &[(Percentile, u64)], percentile: f64) -> Option<f64> {
        percentiles
            .iter()
            .find(|(p, _)| (p.value() - percentile).abs() < f64::EPSILON)
            .map(|(_, nanos)| *nanos as f64 / 1_000_000.0)
    }
}

/// Instance-owned, explicitly-constructed metrics recorder. Not `Clone` —
/// share via `Arc<MetricsCollector>` across dispatch workers.
pub struct MetricsCollector {
    run_id: Uuid,
    title: String,
    started_at: Instant,
    stripes: Vec<Stripe>,
    stripe_mask: u64,
    total_count: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    auxiliary: Mutex<HashMap<String, f64>>,
    closed: AtomicBool,
}

impl MetricsCollector {
    /// `stripe_count` is rounded up to the next power of two so
    /// `iteration_index & (N - 1)` is a valid stripe selector. Pass
    /// `std::thread::available_parallelism()` in production; tests can pass
    /// `1` for determinism.
    pub fn new(run_id: Uuid, title: impl Into<String>, stripe_count: usize) -> Self {
        let n = stripe_count.max(1).next_power_of_two();
        let stripes = (0..n).map(|_| Stripe::new()).collect();
        Self {
            run_id,
            title: title.into(),
            started_at: Instant::now(),
            stripes,
            stripe_mask: (n as u64) - 1,
            total_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            auxiliary: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn stripe_for(&self, iteration_index: u64) -> &Stripe {
        &self.stripes[(iteration_index & self.stripe_mask) as usize]
    }

    /// Record one completed execution. `iteration_index` selects the
    /// stripe; latencies outside the histogram's trackable range are
    /// clamped, matching hdrhistogram's own saturating behavior.
    pub fn record(&self, record: &ExecutionRecord) {
        self.total_count.fetch_add(1, Ordering::Relaxed);
        let nanos = record.duration().as_nanos() as u64;
        let stripe = self.stripe_for(record.iteration_index);
        match &record.outcome {
            Outcome::Success(_) => {
                self.success_count.fetch_add(1, Ordering::Relaxed);
                let mut hist = stripe.success.lock().expect("histogram mutex poisoned");
                let _ = hist.saturating_record(nanos);
            }
            Outcome::Failure(_) => {
                self.failure_count.fetch_add(1, Ordering::Relaxed);
                let mut hist = stripe.failure.lock().expect("histogram mutex poisoned");
                let _ = hist.saturating_record(nanos);
            }
        }
    }

    /// Record a caller-supplied auxiliary gauge. Last write wins; never
    /// validated or consulted by engine control flow — purely advisory
    /// data a `Task` can attach to the run.
    pub fn record_auxiliary(&self, key: impl Into<String>, value: f64) {
        self.auxiliary
            .lock()
            .expect("auxiliary mutex poisoned")
            .insert(key.into(), value);
    }

    fn merge_histograms<'a>(iter: impl Iterator<Item = &'a Mutex<Histogram<u64>>>) -> Histogram<u64> {
        let mut merged = new_histogram();
        for mutex in iter {
            let hist = mutex.lock().expect("histogram mutex poisoned");
            merged
                .add(&*hist)
                .expect("stripe histograms share identical bounds");
        }
        merged
    }

    /// Merge every stripe and extract the requested percentiles plus
    /// derived counters/rates. `default_percentiles()` is used when `None`.
    pub fn snapshot(&self, percentiles: Option<&[Percentile]>) -> MetricsSnapshot {
        let elapsed = self.started_at.elapsed();
        let total = self.total_count.load(Ordering::Relaxed);
        let success = self.success_count.load(Ordering::Relaxed);
        let failure = self.failure_count.load(Ordering::Relaxed);

        let merged_success = Self::merge_histograms(self.stripes.iter().map(|s| &s.success));
        let merged_failure = Self::merge_histograms(self.stripes.iter().map(|s| &s.failure));

        let owned_default;
        let percentiles = match percentiles {
            Some(p) => p,
            None => {
                owned_default = default_percentiles();
                &owned_default
            }
        };
        let latency_percentiles = percentiles
            .iter()
            .map(|p| (*p, merged_success.value_at_percentile(p.value())))
            .collect();
        let failure_latency_percentiles = percentiles
            .iter()
            .map(|p| (*p, merged_failure.value_at_percentile(p.value())))
            .collect();

        let elapsed_secs = elapsed.as_secs_f64().max(f64::EPSILON);
        MetricsSnapshot {
            run_id: self.run_id,
            title: self.title.clone(),
            elapsed,
            total_count: total,
            success_count: success,
            failure_count: failure,
            latency_percentiles,
            failure_latency_percentiles,
            success_rate_pct: if total == 0 {
                0.0
            } else {
                (success as f64 / total as f64) * 100.0
            },
            response_tps: total as f64 / elapsed_secs,
            success_tps: success as f64 / elapsed_secs,
            failure_tps: failure as f64 / elapsed_secs,
            auxiliary: self.auxiliary.lock().expect("auxiliary mutex poisoned").clone(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Mark this collector closed. Idempotent — calling it more than once,
    /// including concurrently, is safe and has no further effect beyond the
    /// first call. Taking a final `snapshot()` before or after `close()` is
    /// unaffected; `close()` does not clear recorded data.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Validate a stripe count configuration value ahead of engine startup —
/// `0` is accepted (treated as 1 stripe) but negative or non-finite inputs
/// are rejected eagerly so the error surfaces at `build()`, not mid-run.
pub fn validate_stripe_count(requested: i64) -> Result<usize, EngineError> {
    if requested < 0 {
        return Err(EngineError::validation(format!(
            "metrics stripe count must be non-negative, got {requested}"
        )));
    }
    Ok(requested.max(1) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FailureCause;

    fn record(index: u64, nanos: u64, success: bool) -> ExecutionRecord {
        let outcome = if success {
            Outcome::success()
        } else {
            Outcome::Failure(FailureCause::new("synthetic failure"))
        };
        ExecutionRecord::new(index, 0, nanos, outcome)
    }

    #[test]
    fn snapshot_counts_success_and_failure_separately() {
        let collector = MetricsCollector::new(Uuid::nil(), "test", 1);
        collector.record(&record(0, 1_000_000, true));
        collector.record(&record(1, 2_000_000, false));
        let snapshot = collector.snapshot(None);
        assert_eq!(snapshot.total_count, 2);
        assert_eq!(snapshot.success_count, 1);
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.success_rate_pct, 50.0);
    }

    #[test]
    fn snapshot_with_no_executions_reports_zero_success_rate() {
        let collector = MetricsCollector::new(Uuid::nil(), "empty", 1);
        let snapshot = collector.snapshot(None);
        assert_eq!(snapshot.total_count, 0);
        assert_eq!(snapshot.success_rate_pct, 0.0);
    }

    #[test]
    fn percentiles_merge_across_stripes() {
        let collector = MetricsCollector::new(Uuid::nil(), "striped", 4);
        for i in 0..1000u64 {
            collector.record(&record(i, 1_000_000 + i * 1_000, true));
        }
        let snapshot = collector.snapshot(None);
        let p50 = snapshot.success_percentile_ms(Percentile::P50).unwrap();
        assert!(p50 > 1.0 && p50 < 2.0);
    }

    #[test]
    fn failure_percentiles_are_tracked_independently_of_success() {
        let collector = MetricsCollector::new(Uuid::nil(), "failures", 1);
        collector.record(&record(0, 1_000_000, true));
        collector.record(&record(1, 50_000_000, false));
        let snapshot = collector.snapshot(None);
        assert!(snapshot.success_percentile_ms(Percentile::P50).unwrap() < 10.0);
        assert!(snapshot.failure_percentile_ms(Percentile::P50).unwrap() > 40.0);
    }

    #[test]
    fn auxiliary_metrics_are_last_write_wins() {
        let collector = MetricsCollector::new(Uuid::nil(), "aux", 1);
        collector.record_auxiliary("connections_open", 10.0);
        collector.record_auxiliary("connections_open", 12.0);
        let snapshot = collector.snapshot(None);
        assert_eq!(snapshot.auxiliary.get("connections_open"), Some(&12.0));
    }

    #[test]
    fn stripe_count_rounds_up_to_power_of_two() {
        let collector = MetricsCollector::new(Uuid::nil(), "rounding", 3);
        assert_eq!(collector.stripes.len(), 4);
    }

    #[test]
    fn validate_stripe_count_rejects_negative() {
        assert!(validate_stripe_count(-1).is_err());
        assert_eq!(validate_stripe_count(0).unwrap(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let collector = MetricsCollector::new(Uuid::nil(), "close-test", 1);
        assert!(!collector.is_closed());
        collector.close();
        assert!(collector.is_closed());
        collector.close();
        assert!(collector.is_closed());
    }

    #[test]
    fn close_does_not_affect_snapshot_contents() {
        let collector = MetricsCollector::new(Uuid::nil(), "close-snapshot", 1);
        collector.record(&record(0, 1_000_000, true));
        collector.close();
        collector.close();
        let snapshot = collector.snapshot(None);
        assert_eq!(snapshot.total_count, 1);
    }
}
