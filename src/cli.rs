//! Hand-rolled command-line argument parsing.
//!
//! `main.rs` parses `std::env::args()`/`env::var` directly rather than
//! pulling in a CLI crate. Flags: `--mode`, `--tps`, `--duration`,
//! `--ramp-duration`, `--steps` (as `rate:duration,rate:duration,...`),
//! `--mean-rate`/`--amplitude`/`--period`,
//! `--base-rate`/`--spike-rate`/`--spike-interval`/`--spike-duration`, and
//! the adaptive knobs (`--min-tps`/`--max-tps`/`--step-pct`/`--tick-interval`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::EngineError;
use crate::load_pattern::{LoadPattern, RampUp, RampUpToMax, SineWave, Spike, Static, Step};
use crate::utils::parse_duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Static,
    RampUp,
    RampUpToMax,
    Step,
    SineWave,
    Spike,
    Adaptive,
}

impl Mode {
    fn parse(s: &str) -> Result<Self, EngineError> {
        match s {
            "static" => Ok(Mode::Static),
            "ramp-up" => Ok(Mode::RampUp),
            "ramp-up-to-max" => Ok(Mode::RampUpToMax),
            "step" => Ok(Mode::Step),
            "sine-wave" => Ok(Mode::SineWave),
            "spike" => Ok(Mode::Spike),
            "adaptive" => Ok(Mode::Adaptive),
            other => Err(EngineError::validation(format!(
                "unknown --mode '{other}' (expected one of: static, ramp-up, ramp-up-to-max, step, sine-wave, spike, adaptive)"
            ))),
        }
    }
}

/// Parsed flag values, before being turned into a concrete `LoadPattern`.
/// Kept as a flat bag of optional fields rather than one struct per mode,
/// since most fields are shared across two or three modes.
#[derive(Debug, Default)]
pub struct CliArgs {
    pub mode: Option<Mode>,
    pub tps: Option<f64>,
    pub duration: Option<Duration>,
    pub ramp_duration: Option<Duration>,
    pub steps: Option<Vec<(f64, Duration)>>,
    pub mean_rate: Option<f64>,
    pub amplitude: Option<f64>,
    pub period: Option<Duration>,
    pub base_rate: Option<f64>,
    pub spike_rate: Option<f64>,
    pub spike_interval: Option<Duration>,
    pub spike_duration: Option<Duration>,
    pub min_tps: Option<f64>,
    pub max_tps: Option<f64>,
    pub step_pct: Option<f64>,
    pub tick_interval: Option<Duration>,
}

fn parse_flag_map(args: &[String]) -> Result<HashMap<String, String>, EngineError> {
    let mut map = HashMap::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let Some(flag) = arg.strip_prefix("--") else {
            return Err(EngineError::validation(format!(
                "expected a flag starting with '--', got '{arg}'"
            )));
        };
        let value = iter
            .next()
            .ok_or_else(|| EngineError::validation(format!("flag --{flag} is missing a value")))?;
        map.insert(flag.to_string(), value.clone());
    }
    Ok(map)
}

fn parse_f64(map: &HashMap<String, String>, key: &str) -> Result<Option<f64>, EngineError> {
    match map.get(key) {
        Some(v) => v
            .parse::<f64>()
            .map(Some)
            .map_err(|_| EngineError::validation(format!("--{key} must be a number, got '{v}'"))),
        None => Ok(None),
    }
}

fn parse_duration_flag(map: &HashMap<String, String>, key: &str) -> Result<Option<Duration>, EngineError> {
    match map.get(key) {
        Some(v) => parse_duration(v).map(Some),
        None => Ok(None),
    }
}

/// Parses `--steps=rate:duration,rate:duration,...`, e.g.
/// `"25:3s,50:3s,75:4s"`, into per-step `(rate, duration)` pairs.
fn parse_steps(map: &HashMap<String, String>) -> Result<Option<Vec<(f64, Duration)>>, EngineError> {
    match map.get("steps") {
        Some(v) => {
            let mut steps = Vec::new();
            for entry in v.split(',') {
                let entry = entry.trim();
                let (rate, duration) = entry.split_once(':').ok_or_else(|| {
                    EngineError::validation(format!(
                        "--steps entries must be 'rate:duration', got '{entry}'"
                    ))
                })?;
                let rate = rate.trim().parse::<f64>().map_err(|_| {
                    EngineError::validation(format!("--steps rate must be a number, got '{rate}'"))
                })?;
                let duration = parse_duration(duration.trim())?;
                steps.push((rate, duration));
            }
            Ok(Some(steps))
        }
        None => Ok(None),
    }
}

impl CliArgs {
    /// Parse `["--mode", "static", "--tps", "50", "--duration", "30s"]`-style
    /// arguments (typically `std::env::args().skip(1).collect::<Vec<_>>()`).
    pub fn parse(args: &[String]) -> Result<Self, EngineError> {
        let map = parse_flag_map(args)?;
        Ok(Self {
            mode: map.get("mode").map(|m| Mode::parse(m)).transpose()?,
            tps: parse_f64(&map, "tps")?,
            duration: parse_duration_flag(&map, "duration")?,
            ramp_duration: parse_duration_flag(&map, "ramp-duration")?,
            steps: parse_steps(&map)?,
            mean_rate: parse_f64(&map, "mean-rate")?,
            amplitude: parse_f64(&map, "amplitude")?,
            period: parse_duration_flag(&map, "period")?,
            base_rate: parse_f64(&map, "base-rate")?,
            spike_rate: parse_f64(&map, "spike-rate")?,
            spike_interval: parse_duration_flag(&map, "spike-interval")?,
            spike_duration: parse_duration_flag(&map, "spike-duration")?,
            min_tps: parse_f64(&map, "min-tps")?,
            max_tps: parse_f64(&map, "max-tps")?,
            step_pct: parse_f64(&map, "step-pct")?,
            tick_interval: parse_duration_flag(&map, "tick-interval")?,
        })
    }

    fn require<T: Copy>(&self, value: Option<T>, flag: &str, mode: Mode) -> Result<T, EngineError> {
        value.ok_or_else(|| {
            EngineError::validation(format!("--mode {mode:?} requires --{flag}"))
        })
    }

    /// Build the concrete `LoadPattern` this mode's flags describe.
    /// `Adaptive` is not handled here — constructing an `AdaptiveLoadPattern`
    /// requires a `MetricsProvider`/`BackpressureProvider` the CLI alone
    /// can't supply, so callers build it themselves from `min_tps`/`max_tps`/
    /// `step_pct`/`tick_interval`.
    pub fn build_load_pattern(&self) -> Result<Arc<dyn LoadPattern>, EngineError> {
        let mode = self
            .mode
            .ok_or_else(|| EngineError::validation("--mode is required"))?;

        match mode {
            Mode::Static => {
                let tps = self.require(self.tps, "tps", mode)?;
                let duration = self.require(self.duration, "duration", mode)?;
                Ok(Arc::new(Static::new(tps, duration)?))
            }
            Mode::RampUp => {
                let tps = self.require(self.tps, "tps", mode)?;
                let ramp_duration = self.require(self.ramp_duration, "ramp-duration", mode)?;
                Ok(Arc::new(RampUp::new(0.0, tps, ramp_duration)?))
            }
            Mode::RampUpToMax => {
                let tps = self.require(self.tps, "tps", mode)?;
                let ramp_duration = self.require(self.ramp_duration, "ramp-duration", mode)?;
                let duration = self.require(self.duration, "duration", mode)?;
                Ok(Arc::new(RampUpToMax::new(0.0, tps, ramp_duration, duration)?))
            }
            Mode::Step => {
                let steps = self
                    .steps
                    .clone()
                    .ok_or_else(|| EngineError::validation("--mode Step requires --steps"))?;
                Ok(Arc::new(Step::new(steps)?))
            }
            Mode::SineWave => {
                let mean_rate = self.require(self.mean_rate, "mean-rate", mode)?;
                let amplitude = self.require(self.amplitude, "amplitude", mode)?;
                let period = self.require(self.period, "period", mode)?;
                Ok(Arc::new(SineWave::new(mean_rate, amplitude, period, self.duration)?))
            }
            Mode::Spike => {
                let base_rate = self.require(self.base_rate, "base-rate", mode)?;
                let spike_rate = self.require(self.spike_rate, "spike-rate", mode)?;
                let spike_interval = self.require(self.spike_interval, "spike-interval", mode)?;
                let spike_duration = self.require(self.spike_duration, "spike-duration", mode)?;
                Ok(Arc::new(Spike::new(
                    base_rate,
                    spike_rate,
                    spike_interval,
                    spike_duration,
                    self.duration,
                )?))
            }
            Mode::Adaptive => Err(EngineError::validation(
                "--mode adaptive cannot be built from CLI flags alone; construct AdaptiveLoadPattern directly",
            )),
        }
    }
}
