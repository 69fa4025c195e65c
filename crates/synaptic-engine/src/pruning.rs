//! Structural pruning decision (§4.4).
//!
//! A synapse is eliminated when it is simultaneously weak, inactive, and
//! past its protection period. The decision is a pure function of state
//! snapshotted by the caller — it holds no lock and owns no clock.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::constants::{GAIN_MAX, GAIN_MIN};
use crate::config::PruningConfig;

/// Everything `should_prune` needs, gathered by the coordinator under its
/// own lock before the (lock-free) decision is made.
#[derive(Debug, Clone, Copy)]
pub struct PruningSnapshot {
    pub weight: f64,
    pub creation_time: Instant,
    pub last_transmission: Option<Instant>,
    pub last_plasticity_event: Option<Instant>,
    /// Net dopaminergic protection vs. cholinergic/noradrenergic pressure,
    /// `[-1, 1]`; `0` disables neuromodulator scaling. Optional per §4.4.
    pub neuromodulator_bias: f64,
}

/// One pruning evaluation, including the factors that produced it —
/// useful for logging and for the `tests/scenarios.rs` assertions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PruningDecision {
    pub should_prune: bool,
    pub weak: bool,
    pub inactive: bool,
    pub protected: bool,
    pub effective_inactivity_threshold: Duration,
}

/// Evaluate the pruning decision for a synapse at time `now` (§4.4).
///
/// Deterministic: the stochastic gate in [`PruningConfig::probability`] is
/// applied by the caller against the returned `should_prune` using its own
/// RNG, keeping this function reproducible for tests.
pub fn should_prune(config: &PruningConfig, snapshot: &PruningSnapshot, now: Instant) -> PruningDecision {
    if !config.enabled {
        return PruningDecision {
            should_prune: false,
            weak: false,
            inactive: false,
            protected: true,
            effective_inactivity_threshold: config.inactivity_threshold,
        };
    }

    let age = now.saturating_duration_since(snapshot.creation_time);
    let protected = age < config.protection_period;

    let weak = snapshot.weight < config.weight_threshold;

    let scale = (1.0 + snapshot.neuromodulator_bias.clamp(-1.0, 1.0)).clamp(GAIN_MIN, GAIN_MAX);
    let effective_inactivity_threshold = scale_duration(config.inactivity_threshold, scale);

    let last_active = match (snapshot.last_transmission, snapshot.last_plasticity_event) {
        (Some(a), Some(b)) => a.max(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => snapshot.creation_time,
    };
    let idle = now.saturating_duration_since(last_active);
    let inactive = idle >= effective_inactivity_threshold;

    let should_prune = !protected && weak && inactive;

    PruningDecision {
        should_prune,
        weak,
        inactive,
        protected,
        effective_inactivity_threshold,
    }
}

/// Apply the stochastic gate from `config.probability` to a deterministic
/// decision, using the caller-supplied draw (kept out of this module so
/// tests can fix the draw).
pub fn gate_with_probability(decision: &PruningDecision, probability: f64, draw: f64) -> bool {
    decision.should_prune && draw < probability.clamp(0.0, 1.0)
}

fn scale_duration(d: Duration, scale: f64) -> Duration {
    if !scale.is_finite() || scale <= 0.0 {
        return d;
    }
    Duration::from_secs_f64((d.as_secs_f64() * scale).max(0.0))
}
