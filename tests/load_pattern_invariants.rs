//! Pure math invariants for the load pattern family (spec §8).

use std::time::Duration;

use rust_loadtest::load_pattern::{
    LoadPattern, RampUp, SineWave, Spike, Static, Step, TotalDuration, WarmupCooldown,
};

#[test]
fn ramp_up_boundary_values_match_spec() {
    let pattern = RampUp::new(0.0, 200.0, Duration::from_secs(5)).unwrap();
    assert_eq!(pattern.tps_at(Duration::ZERO), 0.0);
    assert_eq!(pattern.tps_at(Duration::from_secs(5)), 200.0);
    // past the ramp, RampUp's total_duration ends — but tps_at itself is
    // total for all elapsed times per §4.1, clamped at the endpoint.
    assert_eq!(pattern.tps_at(Duration::from_secs(10)), 200.0);
}

#[test]
fn spike_rejects_spike_duration_not_shorter_than_interval() {
    let result = Spike::new(
        10.0,
        100.0,
        Duration::from_secs(1),
        Duration::from_secs(1),
        None,
    );
    assert!(result.is_err());

    let result = Spike::new(
        10.0,
        100.0,
        Duration::from_secs(1),
        Duration::from_millis(1500),
        None,
    );
    assert!(result.is_err());
}

#[test]
fn step_past_end_returns_zero() {
    // spec §8 scenario 4's worked example: varied per-step durations, not a
    // uniform step_duration.
    let pattern = Step::new(vec![
        (25.0, Duration::from_secs(3)),
        (50.0, Duration::from_secs(3)),
        (75.0, Duration::from_secs(4)),
    ])
    .unwrap();
    let total = match pattern.total_duration() {
        TotalDuration::Finite(d) => d,
        TotalDuration::Infinite => panic!("step pattern must report a finite duration"),
    };
    assert_eq!(total, Duration::from_secs(10));
    assert_eq!(pattern.tps_at(Duration::from_secs(5)), 50.0);
    assert_eq!(pattern.tps_at(Duration::from_secs(9)), 75.0);
    // one millisecond past the end, tps_at returns 0
    assert_eq!(pattern.tps_at(total + Duration::from_millis(1)), 0.0);
}

#[test]
fn sine_wave_never_goes_negative_across_a_full_period() {
    let pattern = SineWave::new(50.0, 49.0, Duration::from_secs(60), None).unwrap();
    for secs in 0..120 {
        let tps = pattern.tps_at(Duration::from_secs(secs));
        assert!(tps >= 0.0, "tps_at({secs}s) = {tps}, expected non-negative");
    }
}

#[test]
fn warmup_cooldown_preserves_inner_total_duration_and_tps() {
    let inner_duration = Duration::from_secs(100);
    let inner = Box::new(Static::new(100.0, inner_duration).unwrap());
    let pattern = WarmupCooldown::new(inner, Duration::from_secs(10), Duration::from_secs(10)).unwrap();

    assert_eq!(pattern.total_duration(), TotalDuration::Finite(inner_duration));
    // mid-run, away from the ramps, tps_at matches the wrapped Static exactly
    assert_eq!(pattern.tps_at(Duration::from_secs(50)), 100.0);
}

#[test]
fn warmup_cooldown_rejects_ramps_longer_than_inner_total() {
    let inner = Box::new(Static::new(10.0, Duration::from_secs(10)).unwrap());
    let result = WarmupCooldown::new(inner, Duration::from_secs(6), Duration::from_secs(6));
    assert!(result.is_err());
}

#[test]
fn static_rejects_non_positive_parameters() {
    assert!(Static::new(0.0, Duration::from_secs(1)).is_err());
    assert!(Static::new(-5.0, Duration::from_secs(1)).is_err());
    assert!(Static::new(10.0, Duration::ZERO).is_err());
}
