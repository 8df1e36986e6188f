//! Error taxonomy for the execution engine.
//!
//! [`EngineError::Validation`] is raised eagerly at construction time and
//! never after a run starts. [`EngineError::Execution`] is fatal and aborts
//! a running engine. [`EngineError::Cancellation`] converts still-inflight
//! executions into failed outcomes and lets the engine return normally — it
//! is never returned to the caller of `run()`. Task failures are not an
//! error type at all: they are carried as [`crate::task::Outcome::Failure`]
//! data and never stop the engine.

use thiserror::Error;

/// Fatal or construction-time errors from the core engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Bad load-pattern parameters or bad engine configuration, raised at
    /// `build()` before any worker starts.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Engine-internal fatal failure (worker pool failure, collector
    /// corruption). Aborts the run; the collector still produces a final
    /// snapshot reflecting pre-abort state.
    #[error("execution failed: {0}")]
    Execution(String),

    /// Drain exceeded `force_timeout`; in-flight executions were cancelled.
    /// Not surfaced to `run()`'s caller — logged and absorbed internally.
    #[error("cancellation: {0}")]
    Cancellation(String),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    pub fn cancellation(message: impl Into<String>) -> Self {
        Self::Cancellation(message.into())
    }

    /// Engine exits non-zero on `Validation` or `Execution`; `Cancellation`
    /// is absorbed internally and never reaches a process exit code.
    pub fn is_fatal_exit(&self) -> bool {
        matches!(self, EngineError::Validation(_) | EngineError::Execution(_))
    }
}

/// Errors raised by an [`crate::pipeline::Exporter`]. Always logged and
/// swallowed by the pipeline — an exporter can never fail a run.
#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("exporter '{exporter}' failed: {message}")]
    ExportFailed { exporter: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_execution_are_fatal() {
        assert!(EngineError::validation("bad rate").is_fatal_exit());
        assert!(EngineError::execution("collector corrupted").is_fatal_exit());
    }

    #[test]
    fn cancellation_is_not_fatal_exit() {
        assert!(!EngineError::cancellation("drain exceeded").is_fatal_exit());
    }

    #[test]
    fn messages_are_descriptive() {
        let err = EngineError::validation("duration must be positive");
        assert!(err.to_string().contains("duration must be positive"));
    }
}
