//! Snapshot assertions: an optional, caller-invoked check of a final
//! [`crate::metrics::MetricsSnapshot`] against pass/fail thresholds. Never
//! consulted by the engine itself and never affects its exit code — purely
//! a convenience for callers (a CLI, a CI gate) who want a single boolean
//! verdict.
//!
//! An `Assertion` enum with a pass/fail result carrying actual/expected
//! display values, generalized from asserting on a single response to
//! asserting on an aggregated run snapshot.

use crate::metrics::MetricsSnapshot;
use crate::percentiles::Percentile;

/// A single threshold to check against a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapshotAssertion {
    MaxP95LatencyMs(f64),
    MinSuccessRatePct(f64),
    MaxFailureCount(u64),
    MinTotalExecutions(u64),
}

impl SnapshotAssertion {
    fn label(&self) -> &'static str {
        match self {
            SnapshotAssertion::MaxP95LatencyMs(_) => "max_p95_latency_ms",
            SnapshotAssertion::MinSuccessRatePct(_) => "min_success_rate_pct",
            SnapshotAssertion::MaxFailureCount(_) => "max_failure_count",
            SnapshotAssertion::MinTotalExecutions(_) => "min_total_executions",
        }
    }
}

/// The outcome of checking one [`SnapshotAssertion`] against a snapshot.
#[derive(Debug, Clone)]
pub struct AssertionResult {
    pub assertion: SnapshotAssertion,
    pub passed: bool,
    pub detail: String,
}

/// Check a single assertion.
pub fn evaluate(assertion: SnapshotAssertion, snapshot: &MetricsSnapshot) -> AssertionResult {
    let (passed, detail) = match assertion {
        SnapshotAssertion::MaxP95LatencyMs(max_ms) => {
            let actual = snapshot.success_percentile_ms(Percentile::P95).unwrap_or(0.0);
            (
                actual <= max_ms,
                format!("p95={actual:.2}ms, max={max_ms:.2}ms"),
            )
        }
        SnapshotAssertion::MinSuccessRatePct(min_pct) => (
            snapshot.success_rate_pct >= min_pct,
            format!(
                "success_rate={:.2}%, min={min_pct:.2}%",
                snapshot.success_rate_pct
            ),
        ),
        SnapshotAssertion::MaxFailureCount(max_count) => (
            snapshot.failure_count <= max_count,
            format!(
                "failure_count={}, max={max_count}",
                snapshot.failure_count
            ),
        ),
        SnapshotAssertion::MinTotalExecutions(min_count) => (
            snapshot.total_count >= min_count,
            format!(
                "total_count={}, min={min_count}",
                snapshot.total_count
            ),
        ),
    };
    AssertionResult {
        assertion,
        passed,
        detail,
    }
}

/// Check a whole batch, short-circuiting on nothing — every assertion runs
/// and reports independently so a caller sees every failure in one pass.
pub fn evaluate_all(assertions: &[SnapshotAssertion], snapshot: &MetricsSnapshot) -> Vec<AssertionResult> {
    assertions.iter().map(|a| evaluate(*a, snapshot)).collect()
}

pub fn all_passed(results: &[AssertionResult]) -> bool {
    results.iter().all(|r| r.passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn snapshot(success_rate_pct: f64, failure_count: u64, total_count: u64, p95_ms: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            run_id: Uuid::nil(),
            title: "test".into(),
            elapsed: Duration::from_secs(1),
            total_count,
            success_count: total_count - failure_count,
            failure_count,
            latency_percentiles: vec![(Percentile::new(95.0).unwrap(), (p95_ms * 1_000_000.0) as u64)],
            failure_latency_percentiles: vec![],
            success_rate_pct,
            response_tps: total_count as f64,
            success_tps: (total_count - failure_count) as f64,
            failure_tps: failure_count as f64,
            auxiliary: Default::default(),
        }
    }

    #[test]
    fn max_p95_latency_passes_when_under_threshold() {
        let snap = snapshot(100.0, 0, 100, 50.0);
        let result = evaluate(SnapshotAssertion::MaxP95LatencyMs(100.0), &snap);
        assert!(result.passed);
    }

    #[test]
    fn max_p95_latency_fails_when_over_threshold() {
        let snap = snapshot(100.0, 0, 100, 150.0);
        let result = evaluate(SnapshotAssertion::MaxP95LatencyMs(100.0), &snap);
        assert!(!result.passed);
    }

    #[test]
    fn min_success_rate_checks_boundary_inclusively() {
        let snap = snapshot(99.0, 1, 100, 10.0);
        let result = evaluate(SnapshotAssertion::MinSuccessRatePct(99.0), &snap);
        assert!(result.passed);
    }

    #[test]
    fn all_passed_is_false_if_any_assertion_fails() {
        let snap = snapshot(80.0, 20, 100, 10.0);
        let results = evaluate_all(
            &[
                SnapshotAssertion::MinSuccessRatePct(99.0),
                SnapshotAssertion::MinTotalExecutions(100),
            ],
            &snap,
        );
        assert!(!all_passed(&results));
        assert!(results[1].passed);
        assert!(!results[0].passed);
    }

    #[test]
    fn assertion_label_is_stable() {
        assert_eq!(
            SnapshotAssertion::MaxFailureCount(0).label(),
            "max_failure_count"
        );
    }
}
