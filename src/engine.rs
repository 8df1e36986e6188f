//! The execution engine: drives a [`Task`](crate::task::Task) at the rate a
//! [`LoadPattern`](crate::load_pattern::LoadPattern) prescribes, drains
//! in-flight work gracefully, and force-cancels anything still outstanding
//! past `force_timeout`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::context::RunContext;
use crate::errors::EngineError;
use crate::executor::TaskExecutor;
use crate::load_pattern::LoadPattern;
use crate::metrics::{validate_stripe_count, MetricsCollector, MetricsSnapshot};
use crate::rate_controller::RateController;
use crate::task::{Task, ThreadStrategy};

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_FORCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds an [`ExecutionEngine`], validating everything eagerly so bad
/// configuration never makes it past construction into a running engine.
pub struct EngineBuilder {
    task: Option<Arc<dyn Task>>,
    pattern: Option<Arc<dyn LoadPattern>>,
    context: Option<RunContext>,
    metrics_stripes: i64,
    drain_timeout: Duration,
    force_timeout: Duration,
    platform_thread_pool_size: Option<usize>,
    default_thread_strategy: ThreadStrategy,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            task: None,
            pattern: None,
            context: None,
            metrics_stripes: std::thread::available_parallelism()
                .map(|n| n.get() as i64)
                .unwrap_or(1),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            force_timeout: DEFAULT_FORCE_TIMEOUT,
            platform_thread_pool_size: None,
            default_thread_strategy: ThreadStrategy::Io,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, task: Arc<dyn Task>) -> Self {
        self.task = Some(task);
        self
    }

    pub fn pattern(mut self, pattern: Arc<dyn LoadPattern>) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn context(mut self, context: RunContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn force_timeout(mut self, timeout: Duration) -> Self {
        self.force_timeout = timeout;
        self
    }

    /// `None` means "auto" — sized to `available_parallelism()` at build
    /// time, matching the `-1`-means-auto CLI convention.
    pub fn platform_thread_pool_size(mut self, size: Option<usize>) -> Self {
        self.platform_thread_pool_size = size;
        self
    }

    /// What a task's `ThreadStrategy::Auto` resolves to, e.g. from
    /// `execution.default_thread_pool` in the config file. Defaults to
    /// `Io`. Passing `ThreadStrategy::Auto` here would be circular, so
    /// callers are expected to pass `Io` or `Cpu`.
    pub fn default_thread_strategy(mut self, strategy: ThreadStrategy) -> Self {
        self.default_thread_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<ExecutionEngine, EngineError> {
        let task = self
            .task
            .ok_or_else(|| EngineError::validation("a Task is required"))?;
        let pattern = self
            .pattern
            .ok_or_else(|| EngineError::validation("a LoadPattern is required"))?;
        if self.drain_timeout >= self.force_timeout {
            return Err(EngineError::validation(
                "drain_timeout must be shorter than force_timeout",
            ));
        }
        let stripe_count = validate_stripe_count(self.metrics_stripes)?;
        let context = self.context.unwrap_or_else(RunContext::empty);
        let platform_threads = self
            .platform_thread_pool_size
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
            .max(1);

        let metrics = Arc::new(MetricsCollector::new(context.run_id, context.title.clone(), stripe_count));
        let rate_controller = RateController::new(Arc::clone(&pattern));

        Ok(ExecutionEngine {
            task,
            pattern,
            context: std::sync::Mutex::new(context),
            metrics,
            rate_controller,
            drain_timeout: self.drain_timeout,
            force_timeout: self.force_timeout,
            platform_semaphore: Arc::new(Semaphore::new(platform_threads)),
            default_thread_strategy: self.default_thread_strategy,
        })
    }
}

/// A built, runnable engine. `run()` consumes nothing — it can be called
/// once (the collector and context are single-run-scoped); calling it
/// twice would double-count metrics against the same collector, so callers
/// build a fresh engine per run.
pub struct ExecutionEngine {
    task: Arc<dyn Task>,
    pattern: Arc<dyn LoadPattern>,
    /// Mutexed only so `run()` can stamp `end_time` in place once the run
    /// finishes — never contended, read once per dispatch.
    context: std::sync::Mutex<RunContext>,
    metrics: Arc<MetricsCollector>,
    rate_controller: RateController,
    drain_timeout: Duration,
    force_timeout: Duration,
    platform_semaphore: Arc<Semaphore>,
    default_thread_strategy: ThreadStrategy,
}

impl ExecutionEngine {
    /// Shared handle to this run's metrics, for a [`crate::pipeline::MetricsPipeline`]
    /// to poll while the engine is still running.
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    /// A snapshot of this run's context; `end_time` is `None` until `run()`
    /// returns.
    pub fn context(&self) -> RunContext {
        self.context.lock().expect("context mutex poisoned").clone()
    }

    /// Request the run stop: the rate controller returns `None` on its next
    /// observation, terminating `run()`'s dispatch loop promptly even for
    /// patterns with no natural end (`total_duration() == Infinite`, or an
    /// `Adaptive` pattern that hasn't reached its `Terminal` state).
    /// Idempotent; safe to call from another task while `run()` is in
    /// flight.
    pub fn stop(&self) {
        self.rate_controller.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.rate_controller.is_stopped()
    }

    /// Run the task to completion: dispatch at the pattern's prescribed
    /// rate until its total duration elapses, drain in-flight work, and
    /// return the final snapshot. `teardown` runs exactly once, whether the
    /// drain completed cleanly or had to be force-cancelled.
    pub async fn run(&self) -> Result<MetricsSnapshot, EngineError> {
        let ctx = self.context();
        self.task
            .init(&ctx)
            .await
            .map_err(|cause| EngineError::execution(cause.to_string()))?;

        let executor = Arc::new(TaskExecutor::new(Arc::clone(&self.task), Arc::clone(&self.metrics)));
        let strategy = match self.task.thread_strategy() {
            ThreadStrategy::Auto => self.default_thread_strategy,
            other => other,
        };

        let mut dispatched: JoinSet<()> = JoinSet::new();
        let mut dispatch_count = 0u64;

        while let Some(iteration_index) = self.rate_controller.wait_for_next().await {
            dispatch_count += 1;
            let executor = Arc::clone(&executor);
            let ctx = ctx.clone();
            // Warmup/cooldown windows are gated at dispatch time, not at
            // record time, so a skipped record never touches the collector
            // at all.
            let should_record = self.pattern.should_record_metrics(self.rate_controller.elapsed());

            match strategy {
                ThreadStrategy::Cpu => {
                    let permit = Arc::clone(&self.platform_semaphore)
                        .acquire_owned()
                        .await
                        .map_err(|e| EngineError::execution(format!("platform semaphore closed: {e}")))?;
                    dispatched.spawn_blocking(move || {
                        let _permit = permit;
                        tokio::runtime::Handle::current()
                            .block_on(executor.execute_with_metrics(iteration_index, &ctx, should_record));
                    });
                }
                _ => {
                    dispatched.spawn(async move {
                        executor
                            .execute_with_metrics(iteration_index, &ctx, should_record)
                            .await;
                    });
                }
            }
        }

        info!(dispatched = dispatch_count, "run pattern finished, draining in-flight work");
        self.drain(&mut dispatched).await;
        self.task.teardown(&ctx).await;

        let ended = ctx.with_ended_now();
        *self.context.lock().expect("context mutex poisoned") = ended;

        Ok(self.metrics.snapshot(None))
    }

    async fn drain(&self, dispatched: &mut JoinSet<()>) {
        let drained_cleanly = timeout(self.drain_timeout, async {
            while dispatched.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if drained_cleanly {
            return;
        }

        let still_pending = dispatched.len() as u64;
        warn!(
            drain_timeout_ms = self.drain_timeout.as_millis() as u64,
            still_pending, "drain timeout exceeded, force-cancelling outstanding executions"
        );
        dispatched.abort_all();

        let force_cancelled_cleanly = timeout(self.force_timeout, async {
            while dispatched.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if !force_cancelled_cleanly {
            warn!("force timeout exceeded while draining aborted tasks");
        }

        // Every execution still outstanding at drain_timeout is recorded as
        // a failure with a cancellation cause, per the drain contract — it
        // never silently disappears from the final snapshot.
        let now_ns = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock is before the unix epoch")
            .as_nanos() as u64;
        for offset in 0..still_pending {
            let record = crate::task::ExecutionRecord::new(
                offset,
                now_ns,
                now_ns,
                crate::task::Outcome::Failure(crate::task::FailureCause::new(
                    "cancelled: drain timeout exceeded before execution completed",
                )),
            );
            self.metrics.record(&record);
        }
    }
}
