//! Tracing subscriber initialization, with both the human-readable and
//! JSON output formats its `env-filter`/`json` feature set implies.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. `structured` selects JSON
/// output (for log aggregation) over the default human-readable format.
/// Reads `RUST_LOG` via [`EnvFilter`], defaulting to `info` when unset.
pub fn init(structured: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if structured {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
