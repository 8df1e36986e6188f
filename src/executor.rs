//! Generic task execution: runs a single [`crate::task::Task`] iteration,
//! times it, and records the outcome into a [`crate::metrics::MetricsCollector`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::FutureExt;
use tracing::{debug, warn};

use crate::context::RunContext;
use crate::metrics::MetricsCollector;
use crate::task::{ExecutionRecord, FailureCause, Outcome, Task};

/// Best-effort extraction of a panic payload's message, for the synthetic
/// `FailureCause` a caught panic becomes.
fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_nanos() as u64
}

/// Executes task iterations and feeds the result straight into a collector.
/// Stateless beyond the collector/task it's handed — many can run
/// concurrently over the same collector.
pub struct TaskExecutor {
    task: Arc<dyn Task>,
    metrics: Arc<MetricsCollector>,
}

impl TaskExecutor {
    pub fn new(task: Arc<dyn Task>, metrics: Arc<MetricsCollector>) -> Self {
        Self { task, metrics }
    }

    /// Run one iteration, recording an [`ExecutionRecord`] into the
    /// collector regardless of outcome — unless `should_record` is false, in
    /// which case the record is still returned but never reaches the
    /// collector (a warmup/cooldown window). Returns the record so callers
    /// (the engine's drain accounting, tests) can inspect it without a
    /// second read of the collector.
    pub async fn execute_with_metrics(
        &self,
        iteration_index: u64,
        ctx: &RunContext,
        should_record: bool,
    ) -> ExecutionRecord {
        let start_ns = now_ns();
        // A panicking task must never take the whole worker pool down with
        // it — caught and converted to a Failure outcome.
        let outcome = match AssertUnwindSafe(self.task.execute(iteration_index, ctx))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => Outcome::Failure(FailureCause::new(format!(
                "task execute panicked: {}",
                panic_message(&panic)
            ))),
        };
        let end_ns = now_ns();

        if let Outcome::Failure(cause) = &outcome {
            debug!(iteration_index, %cause, "task iteration failed");
        }

        let record = ExecutionRecord::new(iteration_index, start_ns, end_ns, outcome);
        if should_record {
            self.metrics.record(&record);
        }
        record
    }

    /// Run `init` once; logs and propagates failure so the engine can abort
    /// startup cleanly rather than dispatching against an unready task.
    pub async fn init(&self, ctx: &RunContext) -> Result<(), crate::task::FailureCause> {
        self.task.init(ctx).await
    }

    pub async fn teardown(&self, ctx: &RunContext) {
        self.task.teardown(ctx).await;
    }

    pub fn thread_strategy(&self) -> crate::task::ThreadStrategy {
        self.task.thread_strategy()
    }
}

/// Log a final summary of a run's close-out.
pub fn log_final_outcome(total: u64, success: u64, failure: u64) {
    if failure == 0 {
        debug!(total, success, "run completed with no failures");
    } else {
        warn!(total, success, failure, "run completed with failures");
    }
}
