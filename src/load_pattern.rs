//! Load patterns: functions from elapsed wall-clock time to a target
//! transactions-per-second rate, expressed as a trait family so new shapes
//! (including the adaptive, feedback-driven one in [`crate::adaptive`]) can
//! be added without touching the engine.

use std::time::Duration;

use crate::errors::EngineError;

/// How long a pattern runs before the engine stops dispatching new
/// iterations. `Infinite` is used by patterns (like `Adaptive`) whose
/// natural end is a runtime state transition rather than a fixed clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TotalDuration {
    Finite(Duration),
    Infinite,
}

/// A function from elapsed time to target throughput.
pub trait LoadPattern: Send + Sync {
    /// Target transactions-per-second at the given elapsed time since the
    /// run started. Always `>= 0.0`.
    fn tps_at(&self, elapsed: Duration) -> f64;

    /// How long this pattern runs for.
    fn total_duration(&self) -> TotalDuration;

    /// Whether this pattern defines its own warmup/cooldown ramps (so the
    /// engine should not apply a generic ramp on top of it).
    fn supports_warmup_cooldown(&self) -> bool {
        false
    }

    /// Whether executions at this point in time should count toward
    /// metrics. Patterns with a warmup phase report `false` during warmup.
    fn should_record_metrics(&self, _elapsed: Duration) -> bool {
        true
    }
}

fn linear_interpolate(start: f64, end: f64, fraction: f64) -> f64 {
    start + (end - start) * fraction.clamp(0.0, 1.0)
}

fn require_positive(name: &str, value: f64) -> Result<(), EngineError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(EngineError::validation(format!(
            "{name} must be a positive finite number, got {value}"
        )));
    }
    Ok(())
}

/// Constant target rate for a fixed duration.
#[derive(Debug, Clone)]
pub struct Static {
    tps: f64,
    duration: Duration,
}

impl Static {
    pub fn new(tps: f64, duration: Duration) -> Result<Self, EngineError> {
        require_positive("tps", tps)?;
        if duration.is_zero() {
            return Err(EngineError::validation("duration must be non-zero"));
        }
        Ok(Self { tps, duration })
    }
}

impl LoadPattern for Static {
    fn tps_at(&self, elapsed: Duration) -> f64 {
        if elapsed >= self.duration {
            return 0.0;
        }
        self.tps
    }

    fn total_duration(&self) -> TotalDuration {
        TotalDuration::Finite(self.duration)
    }
}

/// Linear ramp from `start_tps` to `end_tps` over `ramp_duration`, then the
/// run ends.
#[derive(Debug, Clone)]
pub struct RampUp {
    start_tps: f64,
    end_tps: f64,
    ramp_duration: Duration,
}

impl RampUp {
    pub fn new(start_tps: f64, end_tps: f64, ramp_duration: Duration) -> Result<Self, EngineError> {
        require_positive("start_tps", start_tps)?;
        require_positive("end_tps", end_tps)?;
        if ramp_duration.is_zero() {
            return Err(EngineError::validation("ramp_duration must be non-zero"));
        }
        Ok(Self {
            start_tps,
            end_tps,
            ramp_duration,
        })
    }
}

impl LoadPattern for RampUp {
    fn tps_at(&self, elapsed: Duration) -> f64 {
        let fraction = elapsed.as_secs_f64() / self.ramp_duration.as_secs_f64();
        linear_interpolate(self.start_tps, self.end_tps, fraction)
    }

    fn total_duration(&self) -> TotalDuration {
        TotalDuration::Finite(self.ramp_duration)
    }
}

/// Ramp from `start_tps` up to `max_tps` over `ramp_duration`, then hold
/// `max_tps` for `sustain_duration`, without a ramp-down third (use two
/// `RampUpToMax`-adjacent patterns, or `Step`, to compose a down-ramp
/// explicitly).
#[derive(Debug, Clone)]
pub struct RampUpToMax {
    start_tps: f64,
    max_tps: f64,
    ramp_duration: Duration,
    sustain_duration: Duration,
}

impl RampUpToMax {
    pub fn new(
        start_tps: f64,
        max_tps: f64,
        ramp_duration: Duration,
        sustain_duration: Duration,
    ) -> Result<Self, EngineError> {
        require_positive("start_tps", start_tps)?;
        require_positive("max_tps", max_tps)?;
        if ramp_duration.is_zero() {
            return Err(EngineError::validation("ramp_duration must be non-zero"));
        }
        Ok(Self {
            start_tps,
            max_tps,
            ramp_duration,
            sustain_duration,
        })
    }
}

impl LoadPattern for RampUpToMax {
    fn tps_at(&self, elapsed: Duration) -> f64 {
        if elapsed >= self.ramp_duration + self.sustain_duration {
            return 0.0;
        }
        if elapsed < self.ramp_duration {
            let fraction = elapsed.as_secs_f64() / self.ramp_duration.as_secs_f64();
            linear_interpolate(self.start_tps, self.max_tps, fraction)
        } else {
            self.max_tps
        }
    }

    fn total_duration(&self) -> TotalDuration {
        TotalDuration::Finite(self.ramp_duration + self.sustain_duration)
    }
}

/// A sequence of `(rate, duration)` plateaus, each held for its own
/// duration — §3's "ordered list of (rate, duration)" pairs, so e.g.
/// `[(25, 3s), (50, 3s), (75, 4s)]` holds the last step for 4s while the
/// first two hold for 3s each.
#[derive(Debug, Clone)]
pub struct Step {
    steps: Vec<(f64, Duration)>,
}

impl Step {
    pub fn new(steps: Vec<(f64, Duration)>) -> Result<Self, EngineError> {
        if steps.is_empty() {
            return Err(EngineError::validation("steps must have at least one entry"));
        }
        for (tps, duration) in &steps {
            require_positive("step tps", *tps)?;
            if duration.is_zero() {
                return Err(EngineError::validation("each step's duration must be non-zero"));
            }
        }
        Ok(Self { steps })
    }
}

impl LoadPattern for Step {
    fn tps_at(&self, elapsed: Duration) -> f64 {
        let mut cumulative = Duration::ZERO;
        for (tps, duration) in &self.steps {
            cumulative += *duration;
            if elapsed < cumulative {
                return *tps;
            }
        }
        0.0
    }

    fn total_duration(&self) -> TotalDuration {
        TotalDuration::Finite(self.steps.iter().map(|(_, d)| *d).sum())
    }
}

/// A sinusoidal rate oscillating around `mean_rate` with `amplitude` and
/// `period`, running until `total` elapses (or forever if `None`).
#[derive(Debug, Clone)]
pub struct SineWave {
    mean_rate: f64,
    amplitude: f64,
    period: Duration,
    total: Option<Duration>,
}

impl SineWave {
    pub fn new(
        mean_rate: f64,
        amplitude: f64,
        period: Duration,
        total: Option<Duration>,
    ) -> Result<Self, EngineError> {
        require_positive("mean_rate", mean_rate)?;
        if amplitude < 0.0 || amplitude >= mean_rate {
            return Err(EngineError::validation(
                "amplitude must be non-negative and less than mean_rate so tps never goes negative",
            ));
        }
        if period.is_zero() {
            return Err(EngineError::validation("period must be non-zero"));
        }
        Ok(Self {
            mean_rate,
            amplitude,
            period,
            total,
        })
    }
}

impl LoadPattern for SineWave {
    fn tps_at(&self, elapsed: Duration) -> f64 {
        if let Some(total) = self.total {
            if elapsed >= total {
                return 0.0;
            }
        }
        let phase = std::f64::consts::TAU * elapsed.as_secs_f64() / self.period.as_secs_f64();
        self.mean_rate + self.amplitude * phase.sin()
    }

    fn total_duration(&self) -> TotalDuration {
        match self.total {
            Some(d) => TotalDuration::Finite(d),
            None => TotalDuration::Infinite,
        }
    }
}

/// A base rate with periodic spikes: every `spike_interval`, the target
/// rate jumps to `spike_rate` for `spike_duration`, then returns to
/// `base_rate`.
#[derive(Debug, Clone)]
pub struct Spike {
    base_rate: f64,
    spike_rate: f64,
    spike_interval: Duration,
    spike_duration: Duration,
    total: Option<Duration>,
}

impl Spike {
    pub fn new(
        base_rate: f64,
        spike_rate: f64,
        spike_interval: Duration,
        spike_duration: Duration,
        total: Option<Duration>,
    ) -> Result<Self, EngineError> {
        require_positive("base_rate", base_rate)?;
        require_positive("spike_rate", spike_rate)?;
        if spike_interval.is_zero() {
            return Err(EngineError::validation("spike_interval must be non-zero"));
        }
        if spike_duration >= spike_interval {
            return Err(EngineError::validation(
                "spike_duration must be shorter than spike_interval",
            ));
        }
        Ok(Self {
            base_rate,
            spike_rate,
            spike_interval,
            spike_duration,
            total,
        })
    }
}

impl LoadPattern for Spike {
    fn tps_at(&self, elapsed: Duration) -> f64 {
        if let Some(total) = self.total {
            if elapsed >= total {
                return 0.0;
            }
        }
        let interval_secs = self.spike_interval.as_secs_f64();
        let position = elapsed.as_secs_f64() % interval_secs;
        if position < self.spike_duration.as_secs_f64() {
            self.spike_rate
        } else {
            self.base_rate
        }
    }

    fn total_duration(&self) -> TotalDuration {
        match self.total {
            Some(d) => TotalDuration::Finite(d),
            None => TotalDuration::Infinite,
        }
    }
}

/// Wraps another pattern with a linear warmup ramp at the start and a
/// linear cooldown ramp at the end, both excluded from metrics recording —
/// a reusable decorator over any inner pattern.
pub struct WarmupCooldown {
    inner: Box<dyn LoadPattern>,
    warmup: Duration,
    cooldown: Duration,
}

impl WarmupCooldown {
    pub fn new(
        inner: Box<dyn LoadPattern>,
        warmup: Duration,
        cooldown: Duration,
    ) -> Result<Self, EngineError> {
        let TotalDuration::Finite(inner_total) = inner.total_duration() else {
            return Err(EngineError::validation(
                "WarmupCooldown requires a finite-duration inner pattern",
            ));
        };
        if warmup + cooldown >= inner_total {
            return Err(EngineError::validation(
                "warmup + cooldown must be shorter than the inner pattern's total duration",
            ));
        }
        Ok(Self {
            inner,
            warmup,
            cooldown,
        })
    }

    fn inner_total(&self) -> Duration {
        match self.inner.total_duration() {
            TotalDuration::Finite(d) => d,
            TotalDuration::Infinite => unreachable!("validated finite at construction"),
        }
    }
}

impl LoadPattern for WarmupCooldown {
    fn tps_at(&self, elapsed: Duration) -> f64 {
        // The inner pattern drives TPS throughout, unmodified — this
        // decorator only gates whether executions are recorded (below).
        self.inner.tps_at(elapsed)
    }

    fn total_duration(&self) -> TotalDuration {
        TotalDuration::Finite(self.inner_total())
    }

    fn supports_warmup_cooldown(&self) -> bool {
        true
    }

    fn should_record_metrics(&self, elapsed: Duration) -> bool {
        let total = self.inner_total();
        elapsed >= self.warmup && elapsed <= total.saturating_sub(self.cooldown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_pattern_is_constant() {
        let pattern = Static::new(50.0, Duration::from_secs(10)).unwrap();
        assert_eq!(pattern.tps_at(Duration::ZERO), 50.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(9)), 50.0);
    }

    #[test]
    fn static_pattern_returns_zero_past_duration() {
        let pattern = Static::new(50.0, Duration::from_secs(10)).unwrap();
        assert_eq!(pattern.tps_at(Duration::from_secs(10)), 0.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(20)), 0.0);
    }

    #[test]
    fn ramp_up_interpolates_linearly() {
        let pattern = RampUp::new(0.0, 100.0, Duration::from_secs(10)).unwrap();
        assert_eq!(pattern.tps_at(Duration::ZERO), 0.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(5)), 50.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(10)), 100.0);
    }

    #[test]
    fn ramp_up_to_max_holds_after_ramp() {
        let pattern =
            RampUpToMax::new(10.0, 100.0, Duration::from_secs(10), Duration::from_secs(20)).unwrap();
        assert_eq!(pattern.tps_at(Duration::from_secs(5)), 55.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(15)), 100.0);
        assert_eq!(
            pattern.total_duration(),
            TotalDuration::Finite(Duration::from_secs(30))
        );
        // past ramp_duration + sustain_duration, tps_at returns 0 rather
        // than holding max_tps forever.
        assert_eq!(pattern.tps_at(Duration::from_secs(30)), 0.0);
    }

    #[test]
    fn step_advances_at_boundaries() {
        let pattern = Step::new(vec![
            (10.0, Duration::from_secs(5)),
            (20.0, Duration::from_secs(6)),
            (30.0, Duration::from_secs(4)),
        ])
        .unwrap();
        assert_eq!(pattern.tps_at(Duration::from_secs(0)), 10.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(5)), 20.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(10)), 20.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(11)), 30.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(14)), 30.0);
        // past the last step, tps_at returns 0 rather than holding
        assert_eq!(pattern.tps_at(Duration::from_secs(15)), 0.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(100)), 0.0);
        assert_eq!(
            pattern.total_duration(),
            TotalDuration::Finite(Duration::from_secs(15))
        );
    }

    #[test]
    fn sine_wave_oscillates_around_mean() {
        let pattern = SineWave::new(100.0, 20.0, Duration::from_secs(60), None).unwrap();
        assert_eq!(pattern.total_duration(), TotalDuration::Infinite);
        assert!((pattern.tps_at(Duration::ZERO) - 100.0).abs() < 1e-9);
        let quarter = pattern.tps_at(Duration::from_secs(15));
        assert!((quarter - 120.0).abs() < 1e-9);
    }

    #[test]
    fn sine_wave_rejects_amplitude_that_would_go_negative() {
        assert!(SineWave::new(10.0, 10.0, Duration::from_secs(1), None).is_err());
    }

    #[test]
    fn sine_wave_returns_zero_past_finite_total() {
        let pattern = SineWave::new(
            100.0,
            20.0,
            Duration::from_secs(60),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert!((pattern.tps_at(Duration::from_secs(15)) - 120.0).abs() < 1e-9);
        assert_eq!(pattern.tps_at(Duration::from_secs(30)), 0.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(90)), 0.0);
    }

    #[test]
    fn spike_returns_to_base_after_spike_duration() {
        let pattern = Spike::new(
            10.0,
            200.0,
            Duration::from_secs(60),
            Duration::from_secs(5),
            None,
        )
        .unwrap();
        assert_eq!(pattern.tps_at(Duration::from_secs(0)), 200.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(4)), 200.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(6)), 10.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(65)), 200.0);
    }

    #[test]
    fn spike_returns_zero_past_finite_total() {
        let pattern = Spike::new(
            10.0,
            200.0,
            Duration::from_secs(60),
            Duration::from_secs(5),
            Some(Duration::from_secs(65)),
        )
        .unwrap();
        assert_eq!(pattern.tps_at(Duration::from_secs(4)), 200.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(65)), 0.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(120)), 0.0);
    }

    #[test]
    fn warmup_cooldown_excludes_ramps_from_metrics() {
        let inner = Box::new(Static::new(100.0, Duration::from_secs(100)).unwrap());
        let pattern =
            WarmupCooldown::new(inner, Duration::from_secs(10), Duration::from_secs(10)).unwrap();
        assert!(!pattern.should_record_metrics(Duration::from_secs(5)));
        assert!(pattern.should_record_metrics(Duration::from_secs(50)));
        assert!(!pattern.should_record_metrics(Duration::from_secs(95)));
        // tps_at is untouched by the wrapper — only recording is gated.
        assert_eq!(pattern.tps_at(Duration::ZERO), 100.0);
        assert_eq!(pattern.tps_at(Duration::from_secs(50)), 100.0);
    }
}
