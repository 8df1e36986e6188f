//! The `Percentile` key type and table-formatting helpers for
//! [`crate::metrics::MetricsSnapshot`].
//!
//! Keeps the same display shape and column layout as a `PercentileStats`/
//! `format_percentile_table` pairing, generalized from a hardcoded
//! p50/p90/p95/p99/p99.9 struct into an arbitrary `BTreeMap<Percentile, u64>`
//! so callers can request whatever percentile set they need instead of
//! being locked to a fixed five.

use std::fmt;

use crate::errors::EngineError;

/// A percentile in `(0.0, 100.0]`, ordered so a `BTreeMap<Percentile, _>` is
/// weakly monotonic by key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentile(f64);

impl Percentile {
    pub fn new(value: f64) -> Result<Self, EngineError> {
        if !(value > 0.0 && value <= 100.0) {
            return Err(EngineError::validation(format!(
                "percentile must be in (0.0, 100.0], got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub const P50: f64 = 50.0;
    pub const P90: f64 = 90.0;
    pub const P95: f64 = 95.0;
    pub const P99: f64 = 99.0;
    pub const P99_9: f64 = 99.9;
}

impl Eq for Percentile {}

impl PartialOrd for Percentile {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Percentile {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Percentile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// The default percentile set reported by [`crate::metrics::MetricsCollector::snapshot`].
pub fn default_percentiles() -> Vec<Percentile> {
    [
        Percentile::P50,
        Percentile::P90,
        Percentile::P95,
        Percentile::P99,
        Percentile::P99_9,
    ]
    .into_iter()
    .map(|v| Percentile::new(v).expect("constants are always valid"))
    .collect()
}

/// Format a latency value in nanoseconds as milliseconds with two decimals.
pub fn format_latency_ms(nanos: u64) -> String {
    format!("{:.2}", nanos as f64 / 1_000_000.0)
}

/// Render a compact table row: label, count, then one column per requested
/// percentile (milliseconds), in a fixed-width layout.
pub fn format_table_row(label: &str, count: u64, percentiles: &[(Percentile, u64)]) -> String {
    let mut row = format!("{label:<30} {count:>10}");
    for (p, nanos) in percentiles {
        row.push_str(&format!(" {:>10}={:>8}ms", p, format_latency_ms(*nanos)));
    }
    row
}
