//! Property-based tests for the numerical invariants §8 requires to hold
//! over *all* finite inputs, not just the handful of literal scenarios in
//! `tests/scenarios.rs`.

use proptest::prelude::*;

use synaptic_engine::config::StdpConfig;
use synaptic_engine::plasticity::PlasticityCalculator;

fn calc(threshold: u32) -> PlasticityCalculator {
    let mut cfg = StdpConfig::default();
    cfg.cooperativity_threshold = threshold;
    PlasticityCalculator::new(cfg)
}

proptest! {
    /// For all finite inputs, the output is finite (§8: "∀ finite inputs,
    /// get_weight() is finite"; the calculator itself must never hand the
    /// coordinator a non-finite Δw).
    #[test]
    fn weight_change_is_always_finite(
        dt_nanos in any::<i64>(),
        weight in -1.0e6f64..1.0e6,
        coop in -10i64..50,
    ) {
        let mut c = calc(1);
        let dw = c.calculate_stdp_weight_change(dt_nanos, weight, coop);
        prop_assert!(dw.is_finite());
    }

    /// Same inputs on an untouched calculator give the same output
    /// (§8: determinism).
    #[test]
    fn deterministic_on_untouched_calculator(
        dt_nanos in -100_000_000i64..100_000_000,
        coop in 1i64..20,
    ) {
        let cfg = StdpConfig::default();
        let mut a = PlasticityCalculator::new(cfg.clone());
        let mut b = PlasticityCalculator::new(cfg);
        let da = a.calculate_stdp_weight_change(dt_nanos, 1.0, coop);
        let db = b.calculate_stdp_weight_change(dt_nanos, 1.0, coop);
        prop_assert_eq!(da, db);
    }

    /// Outside the configured window, Δw is exactly zero regardless of
    /// sign or magnitude of the excess.
    #[test]
    fn outside_window_is_always_zero(
        excess_ms in 0.01f64..1_000.0,
        coop in 1i64..20,
    ) {
        let mut c = calc(1);
        let window_ms = StdpConfig::default().window_size_ms;
        let dt_nanos = ((window_ms + excess_ms) * 1_000_000.0) as i64;
        prop_assert_eq!(c.calculate_stdp_weight_change(dt_nanos, 1.0, coop), 0.0);
        prop_assert_eq!(c.calculate_stdp_weight_change(-dt_nanos, 1.0, coop), 0.0);
    }

    /// Below the cooperativity threshold, Δw is exactly zero no matter the
    /// timing.
    #[test]
    fn below_cooperativity_threshold_is_always_zero(
        dt_nanos in -50_000_000i64..50_000_000,
        coop in 0i64..3,
    ) {
        let mut c = calc(5);
        prop_assert_eq!(c.calculate_stdp_weight_change(dt_nanos, 1.0, coop), 0.0);
    }

    /// Sign law: within the window and at/above threshold, pre-before-post
    /// (Δt < 0) never depresses and post-before-pre (Δt > 0) never
    /// potentiates.
    #[test]
    fn sign_law_holds_within_window(
        dt_ms in 0.1f64..90.0,
        coop in 1i64..20,
    ) {
        let mut c = calc(1);
        let dt_nanos = (dt_ms * 1_000_000.0) as i64;
        prop_assert!(c.calculate_stdp_weight_change(-dt_nanos, 1.0, coop) >= 0.0);
        prop_assert!(c.calculate_stdp_weight_change(dt_nanos, 1.0, coop) <= 0.0);
    }

    /// Pathological timing magnitudes (beyond one hour) always collapse to
    /// zero, regardless of everything else.
    #[test]
    fn pathological_timing_is_always_zero(coop in 1i64..20) {
        let mut c = calc(1);
        prop_assert_eq!(c.calculate_stdp_weight_change(i64::MAX, 1.0, coop), 0.0);
        prop_assert_eq!(c.calculate_stdp_weight_change(i64::MIN, 1.0, coop), 0.0);
    }
}
