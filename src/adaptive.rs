//! The adaptive load pattern: a closed feedback loop that raises or lowers
//! target throughput in response to observed error rate and backpressure
//! instead of following a fixed time-based curve.
//!
//! The collaborator-trait shape (`MetricsProvider`/`BackpressureProvider`,
//! a pluggable decision contract) narrows a general perturb/observe/decide
//! loop down to a single state machine with one policy slot, so the
//! feedback logic stays testable in isolation from whatever is producing
//! the metrics and backpressure readings.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::EngineError;
use crate::load_pattern::{LoadPattern, TotalDuration};

/// Supplies the adaptive loop with the run's current failure rate and
/// execution counters. A plain read-only view over whatever is accumulating
/// the run's metrics — the engine passes a handle to its own
/// `MetricsCollector`-backed implementation, so the pattern never touches
/// the collector directly, only this narrow contract.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Failure rate as a percentage in `[0, 100]`.
    async fn failure_rate_percent(&self) -> f64;
    async fn execution_count(&self) -> u64;
    async fn failure_count(&self) -> u64;
}

/// Supplies the adaptive loop with a backpressure reading independent of
/// what the latency/error histograms show (queue depth, a circuit breaker,
/// downstream 429s). Optional — callers with nothing to report can wire
/// `NoBackpressure`.
#[async_trait]
pub trait BackpressureProvider: Send + Sync {
    /// Saturation level in `[0.0, 1.0]`.
    async fn level(&self) -> f64;
    fn description(&self) -> String;
}

/// A `BackpressureProvider` that never reports saturation — for tasks with
/// no downstream signal to observe.
pub struct NoBackpressure;

#[async_trait]
impl BackpressureProvider for NoBackpressure {
    async fn level(&self) -> f64 {
        0.0
    }

    fn description(&self) -> String {
        "no backpressure signal configured".to_string()
    }
}

/// The state machine's current phase.
///
/// `Sustain` is carried in the enum for a complete state list, but no
/// transition below ever enters it — `RampUp` moves straight to `Stable`
/// on a sufficient run of `Hold` decisions, and `Stable` is the state that
/// actually runs the sustain timer before declaring `Terminal`. See
/// `DESIGN.md` for the reasoning behind leaving `Sustain` unreachable
/// rather than renaming it away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptiveState {
    Init,
    RampUp,
    Sustain,
    RampDown,
    Stable,
    Terminal,
}

impl AdaptiveState {
    pub fn label(&self) -> &'static str {
        match self {
            AdaptiveState::Init => "init",
            AdaptiveState::RampUp => "ramp_up",
            AdaptiveState::Sustain => "sustain",
            AdaptiveState::RampDown => "ramp_down",
            AdaptiveState::Stable => "stable",
            AdaptiveState::Terminal => "terminal",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AdaptiveState::Terminal)
    }
}

/// What the policy wants to do with the target rate this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptiveDecision {
    Up,
    Down,
    Hold,
}

/// Maps `(error_rate, backpressure, history)` to a decision. Implementations
/// are plain synchronous functions of their inputs — no I/O, no shared
/// mutable state — so they're trivially testable in isolation from the
/// feedback loop that drives them.
pub trait DecisionPolicy: Send + Sync {
    fn decide(&self, error_rate: f64, backpressure: f64, history: &[AdaptiveDecision]) -> AdaptiveDecision;
}

/// The default policy: back off hard on heavy backpressure, back off on
/// an error rate over threshold, hold under moderate backpressure,
/// otherwise climb.
pub struct DefaultDecisionPolicy {
    pub error_threshold: f64,
}

impl DecisionPolicy for DefaultDecisionPolicy {
    fn decide(&self, error_rate: f64, backpressure: f64, _history: &[AdaptiveDecision]) -> AdaptiveDecision {
        if backpressure >= 0.7 {
            AdaptiveDecision::Down
        } else if error_rate > self.error_threshold {
            AdaptiveDecision::Down
        } else if backpressure >= 0.3 {
            AdaptiveDecision::Hold
        } else {
            AdaptiveDecision::Up
        }
    }
}

/// Enumerated configuration for [`AdaptiveLoadPattern`].
#[derive(Debug, Clone)]
pub struct AdaptiveConfig {
    pub initial_tps: f64,
    pub ramp_increment: f64,
    pub ramp_decrement: f64,
    pub ramp_interval: Duration,
    pub max_tps: f64,
    pub min_tps: f64,
    pub sustain_duration: Duration,
    pub stable_intervals_required: u32,
    pub error_threshold: f64,
    /// Minimum execution count observed before the policy is allowed to
    /// act; below this the controller holds rather than decide off a
    /// statistically thin sample.
    pub min_sample_count: u64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            initial_tps: 10.0,
            ramp_increment: 10.0,
            ramp_decrement: 10.0,
            ramp_interval: Duration::from_secs(5),
            max_tps: f64::INFINITY,
            min_tps: 1.0,
            sustain_duration: Duration::from_secs(30),
            stable_intervals_required: 3,
            error_threshold: 0.05,
            min_sample_count: 10,
        }
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.initial_tps < 0.0 {
            return Err(EngineError::validation("initial_tps must be non-negative"));
        }
        if self.ramp_increment <= 0.0 {
            return Err(EngineError::validation("ramp_increment must be positive"));
        }
        if self.ramp_decrement <= 0.0 {
            return Err(EngineError::validation("ramp_decrement must be positive"));
        }
        if self.ramp_interval.is_zero() {
            return Err(EngineError::validation("ramp_interval must be non-zero"));
        }
        if self.max_tps <= 0.0 {
            return Err(EngineError::validation("max_tps must be positive"));
        }
        if self.min_tps < 0.0 {
            return Err(EngineError::validation("min_tps must be non-negative"));
        }
        if self.min_tps > self.max_tps {
            return Err(EngineError::validation("min_tps must not exceed max_tps"));
        }
        if !(0.0..=1.0).contains(&self.error_threshold) {
            return Err(EngineError::validation("error_threshold must be in [0, 1]"));
        }
        if self.stable_intervals_required == 0 {
            return Err(EngineError::validation(
                "stable_intervals_required must be at least 1",
            ));
        }
        Ok(())
    }
}

struct AdaptiveInner {
    state: AdaptiveState,
    current_tps: f64,
    stable_ticks: u32,
    stable_since: Option<Instant>,
    history: Vec<AdaptiveDecision>,
    terminal_elapsed: Option<Duration>,
}

const HISTORY_CAP: usize = 32;

/// A [`LoadPattern`] whose target rate is adjusted by a background feedback
/// loop rather than a fixed function of elapsed time. `tps_at`/`total_duration`
/// simply read the latest value the loop has computed; call
/// [`AdaptiveLoadPattern::run_feedback_loop`] (typically `tokio::spawn`ed
/// alongside the engine) to actually drive the adjustments on
/// `config.ramp_interval`.
pub struct AdaptiveLoadPattern {
    start: Instant,
    config: AdaptiveConfig,
    metrics_provider: Box<dyn MetricsProvider>,
    backpressure_provider: Box<dyn BackpressureProvider>,
    policy: Box<dyn DecisionPolicy>,
    inner: Mutex<AdaptiveInner>,
}

impl AdaptiveLoadPattern {
    pub fn new(
        config: AdaptiveConfig,
        metrics_provider: Box<dyn MetricsProvider>,
        backpressure_provider: Box<dyn BackpressureProvider>,
        policy: Box<dyn DecisionPolicy>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let initial_tps = config.initial_tps;
        Ok(Self {
            start: Instant::now(),
            config,
            metrics_provider,
            backpressure_provider,
            policy,
            inner: Mutex::new(AdaptiveInner {
                state: AdaptiveState::Init,
                current_tps: initial_tps,
                stable_ticks: 0,
                stable_since: None,
                history: Vec::with_capacity(HISTORY_CAP),
                terminal_elapsed: None,
            }),
        })
    }

    /// Convenience constructor using [`DefaultDecisionPolicy`] and no
    /// backpressure signal.
    pub fn with_defaults(
        config: AdaptiveConfig,
        metrics_provider: Box<dyn MetricsProvider>,
    ) -> Result<Self, EngineError> {
        let error_threshold = config.error_threshold;
        Self::new(
            config,
            metrics_provider,
            Box::new(NoBackpressure),
            Box::new(DefaultDecisionPolicy { error_threshold }),
        )
    }

    pub fn state(&self) -> AdaptiveState {
        self.inner.lock().expect("adaptive mutex poisoned").state
    }

    /// Evaluate one control tick: pull a metrics/backpressure reading, ask
    /// the policy what to do, and apply the state machine transition.
    /// Exposed separately from the loop so tests can drive individual
    /// ticks deterministically.
    pub async fn tick(&self) {
        let error_rate = self.metrics_provider.failure_rate_percent().await / 100.0;
        let execution_count = self.metrics_provider.execution_count().await;
        let backpressure = self.backpressure_provider.level().await;

        let mut inner = self.inner.lock().expect("adaptive mutex poisoned");
        if inner.state.is_terminal() {
            return;
        }

        if inner.state == AdaptiveState::Init {
            if execution_count < self.config.min_sample_count {
                // Not enough samples yet to make a first decision.
                return;
            }
            inner.state = AdaptiveState::RampUp;
        }

        let decision = if execution_count < self.config.min_sample_count {
            AdaptiveDecision::Hold
        } else {
            self.policy.decide(error_rate, backpressure, &inner.history)
        };

        match inner.state {
            AdaptiveState::RampUp => match decision {
                AdaptiveDecision::Up => {
                    inner.current_tps = (inner.current_tps + self.config.ramp_increment).min(self.config.max_tps);
                    inner.stable_ticks = 0;
                }
                AdaptiveDecision::Hold => {
                    inner.stable_ticks += 1;
                    if inner.stable_ticks >= self.config.stable_intervals_required {
                        inner.state = AdaptiveState::Stable;
                        inner.stable_since = Some(Instant::now());
                    }
                }
                AdaptiveDecision::Down => {
                    inner.state = AdaptiveState::RampDown;
                }
            },
            AdaptiveState::RampDown => {
                inner.current_tps = (inner.current_tps - self.config.ramp_decrement).max(self.config.min_tps);
                match decision {
                    AdaptiveDecision::Up | AdaptiveDecision::Hold => {
                        inner.state = AdaptiveState::RampUp;
                        inner.stable_ticks = 0;
                    }
                    AdaptiveDecision::Down => {}
                }
            }
            AdaptiveState::Stable => {
                let elapsed_stable = inner
                    .stable_since
                    .map(|since| since.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed_stable >= self.config.sustain_duration {
                    inner.state = AdaptiveState::Terminal;
                    inner.terminal_elapsed = Some(self.start.elapsed());
                    info!(
                        tps = inner.current_tps,
                        "adaptive load pattern reached terminal state"
                    );
                }
            }
            AdaptiveState::Init | AdaptiveState::Sustain | AdaptiveState::Terminal => {}
        }

        if inner.history.len() >= HISTORY_CAP {
            inner.history.remove(0);
        }
        inner.history.push(decision);

        debug!(
            state = inner.state.label(),
            tps = inner.current_tps,
            error_rate,
            backpressure,
            execution_count,
            "adaptive load pattern tick"
        );
    }

    /// Drive `tick()` on `config.ramp_interval` until the state machine
    /// reaches `Terminal`. Intended to run concurrently with the engine
    /// dispatching at whatever rate this pattern currently reports.
    pub async fn run_feedback_loop(&self) {
        loop {
            if self.state().is_terminal() {
                return;
            }
            tokio::time::sleep(self.config.ramp_interval).await;
            self.tick().await;
        }
    }
}

impl LoadPattern for AdaptiveLoadPattern {
    /// Not a pure function of `elapsed` — this is the one pattern whose
    /// `tps_at` is stateful; it always returns the controller's current
    /// rate regardless of the argument.
    fn tps_at(&self, _elapsed: Duration) -> f64 {
        self.inner.lock().expect("adaptive mutex poisoned").current_tps
    }

    fn total_duration(&self) -> TotalDuration {
        match self.inner.lock().expect("adaptive mutex poisoned").terminal_elapsed {
            Some(elapsed) => TotalDuration::Finite(elapsed),
            None => TotalDuration::Infinite,
        }
    }
}
