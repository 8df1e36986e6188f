//! The `Task` contract: the unit of work an [`crate::engine::ExecutionEngine`]
//! dispatches at the rate a [`crate::load_pattern::LoadPattern`] prescribes.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::RunContext;

/// How the engine should dispatch iterations of a given task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStrategy {
    /// Dispatch on the async runtime directly (`tokio::spawn`). Appropriate
    /// for tasks that spend most of their time suspended awaiting I/O.
    Io,
    /// Dispatch via `spawn_blocking`, bounded by a semaphore sized to the
    /// available core count. Appropriate for CPU-bound work.
    Cpu,
    /// Let the engine decide — resolves to whatever `EngineBuilder`'s
    /// default thread strategy was configured with (`Io` unless overridden,
    /// e.g. by `execution.default_thread_pool` in the config file).
    Auto,
}

/// Opaque successful-execution payload a `Task` may hand back to callers
/// that downcast it to a concrete type they know about.
pub struct Payload(Box<dyn Any + Send + Sync>);

impl Payload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Payload(..)")
    }
}

/// Why a single execution failed. Carries a human-readable message and,
/// optionally, the underlying error for source-chaining — this is data, not
/// an `EngineError` variant, since task failures never stop the engine.
#[derive(Debug)]
pub struct FailureCause {
    pub message: String,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl FailureCause {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn from_error(err: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for FailureCause {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

/// The result of a single task execution.
#[derive(Debug)]
pub enum Outcome {
    Success(Option<Payload>),
    Failure(FailureCause),
}

impl Outcome {
    pub fn success() -> Self {
        Outcome::Success(None)
    }

    pub fn success_with(payload: Payload) -> Self {
        Outcome::Success(Some(payload))
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure(FailureCause::new(message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// A single dispatched iteration, timestamped and outcome-tagged. Cheap to
/// move, not `Copy` (an `Outcome::Success` may carry a heap payload).
#[derive(Debug)]
pub struct ExecutionRecord {
    pub iteration_index: u64,
    pub start_ns: u64,
    pub end_ns: u64,
    pub outcome: Outcome,
}

impl ExecutionRecord {
    pub fn new(iteration_index: u64, start_ns: u64, end_ns: u64, outcome: Outcome) -> Self {
        debug_assert!(end_ns >= start_ns, "execution end precedes start");
        Self {
            iteration_index,
            start_ns,
            end_ns,
            outcome,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.end_ns.saturating_sub(self.start_ns))
    }
}

/// The unit of work dispatched by the engine. Implementors are expected to
/// be cheap to clone (an `Arc<dyn Task>` is typical) since the same instance
/// is shared across every dispatched iteration.
#[async_trait]
pub trait Task: Send + Sync {
    /// Called once before the run starts. Default no-op.
    async fn init(&self, _ctx: &RunContext) -> Result<(), FailureCause> {
        Ok(())
    }

    /// Perform one iteration of work. `iteration_index` is a monotonically
    /// increasing counter across the whole run, unique per dispatched
    /// execution.
    async fn execute(&self, iteration_index: u64, ctx: &RunContext) -> Outcome;

    /// Called once after the run drains, win or lose. Default no-op.
    async fn teardown(&self, _ctx: &RunContext) {}

    /// How the engine should dispatch this task's iterations.
    fn thread_strategy(&self) -> ThreadStrategy {
        ThreadStrategy::Auto
    }
}
