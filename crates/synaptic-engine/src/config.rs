//! Configuration, biologically-plausible range validation, and presets.
//!
//! Mirrors the teacher workspace's habit of making every parameter struct
//! a plain, serde-serializable value type with a `Default` impl, but adds
//! the structured `{errors, warnings}` validation result the specification
//! calls for in its Config & Validation component.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::neurotransmitters::NeurotransmitterType;

/// Biologically-plausible bounds, saturation constants and history caps.
///
/// Where the specification leaves a constant to the implementer (e.g. the
/// cooperativity saturation curve's half-saturation point, or the maximum
/// per-pairing weight change), the choice made here is recorded in
/// `DESIGN.md` rather than left to guesswork at each call site.
pub mod constants {
    use std::time::Duration;

    /// Hard cap on pre/post spike history length (§3, §5).
    pub const MAX_SPIKE_HISTORY: usize = 1000;
    /// Hard cap on the plasticity calculator's activity history.
    pub const MAX_ACTIVITY_HISTORY: usize = 1000;
    /// Hard cap on the activity monitor's plasticity-event ring buffer.
    pub const MAX_PLASTICITY_HISTORY: usize = 500;
    /// Hard cap on any weight-history ring buffer a caller asks for.
    pub const MAX_WEIGHT_HISTORY: usize = 200;
    /// Hard cap on the activity monitor's transmission-event ring buffer.
    pub const MAX_TRANSMISSION_HISTORY: usize = 500;
    /// Hard cap on any single vesicle pool counter.
    pub const MAX_VESICLE_POOLS: u32 = 10_000;

    /// Biological minimum for `base_synaptic_delay`.
    pub const MIN_SYNAPTIC_DELAY: Duration = Duration::from_micros(100);
    /// Biological maximum for `base_synaptic_delay`.
    pub const MAX_SYNAPTIC_DELAY: Duration = Duration::from_millis(100);
    /// Delay returned by `get_transmission_delay()` is clamped to this.
    pub const MAX_DELAY_DURATION: Duration = Duration::from_secs(1);

    /// Activity level above which frequency-dependent plasticity treats the
    /// synapse as "high frequency" (§4.1).
    pub const FREQUENCY_DEPENDENCE_THRESHOLD_HZ: f64 = 15.0;
    /// Bounds of the frequency-dependence amplifier.
    pub const FREQUENCY_AMPLIFIER_MIN: f64 = 0.25;
    pub const FREQUENCY_AMPLIFIER_MAX: f64 = 4.0;

    /// Asymptotic cooperativity gain at unbounded cooperative-input count.
    pub const HIGH_COOP_FACTOR: f64 = 2.5;
    /// Half-saturation point of the cooperativity curve, in excess inputs
    /// above threshold.
    pub const COOP_HALF_SAT: f64 = 2.0;

    /// `|Δw|` for a single pairing never exceeds this fraction of
    /// `max(|max_weight|, 1)` (§4.1 numerical invariants).
    pub const BIOLOGY_MAX_WEIGHT_CHANGE: f64 = 0.5;

    /// Timing deltas with a magnitude beyond one hour are pathological and
    /// rejected outright regardless of the configured window.
    pub const ONE_HOUR_NANOS: i64 = 3_600_000_000_000;

    /// Clamp bounds for each neuromodulator level.
    pub const NEUROMODULATOR_MIN: f64 = 0.0;
    pub const NEUROMODULATOR_MAX: f64 = 10.0;

    /// Bounds of any multiplicative gain derived from neuromodulator state
    /// (plasticity gain, pruning-pressure gain).
    pub const GAIN_MIN: f64 = 0.25;
    pub const GAIN_MAX: f64 = 4.0;

    /// Smoothing factor for the per-ligand neuromodulator EWMA fed by
    /// `Synapse::process_neuromodulation` — new samples count for 20% of
    /// the tracked level, matching the teacher's other exponential-decay
    /// time constants in spirit (slow enough that a single spurious
    /// reading can't swing the plasticity gain).
    pub const NEUROMODULATOR_EWMA_ALPHA: f64 = 0.2;
}

/// Spike-timing-dependent plasticity parameters (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdpConfig {
    pub enabled: bool,
    /// Learning rate, biologically plausible in `[1e-4, 0.1]`.
    pub learning_rate: f64,
    /// STDP kernel time constant τ, milliseconds.
    pub time_constant_ms: f64,
    /// Pairing window W, milliseconds.
    pub window_size_ms: f64,
    pub min_weight: f64,
    pub max_weight: f64,
    /// LTD/LTP asymmetry ratio, must be `> 0`.
    pub asymmetry_ratio: f64,
    pub metaplasticity_rate: f64,
    /// Minimum coincident inputs required for induction, `>= 1`.
    pub cooperativity_threshold: u32,
    pub frequency_dependent: bool,
}

impl Default for StdpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            learning_rate: 0.01,
            time_constant_ms: 20.0,
            window_size_ms: 100.0,
            min_weight: 0.001,
            max_weight: 2.0,
            asymmetry_ratio: 1.2,
            metaplasticity_rate: 0.01,
            cooperativity_threshold: 1,
            frequency_dependent: false,
        }
    }
}

/// Vesicle pool and release parameters (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesicleConfig {
    pub enabled: bool,
    pub max_release_rate_hz: f64,
    /// Baseline release probability p0, `[0, 1]`.
    pub baseline_probability: f64,
    pub calcium_sensitivity: f64,
    /// `>= 1`.
    pub ready_pool_size: u32,
    /// `>= 1`.
    pub recycling_pool_size: u32,
    /// `>= 0`.
    pub reserve_pool_size: u32,
    /// `> 0`.
    pub fast_recycling_time: Duration,
    /// `> fast_recycling_time`.
    pub slow_recycling_time: Duration,
    /// `> 0`.
    pub refill_time: Duration,
    pub fatigue_threshold_hz: f64,
    pub recovery_time: Duration,
    /// `[0, 1]`.
    pub depletion_factor: f64,
}

impl Default for VesicleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_release_rate_hz: 50.0,
            baseline_probability: 0.25,
            calcium_sensitivity: 1.0,
            ready_pool_size: 15,
            recycling_pool_size: 10,
            reserve_pool_size: 20,
            fast_recycling_time: Duration::from_millis(20),
            slow_recycling_time: Duration::from_millis(200),
            refill_time: Duration::from_millis(500),
            fatigue_threshold_hz: 20.0,
            recovery_time: Duration::from_millis(500),
            depletion_factor: 0.5,
        }
    }
}

/// Structural pruning parameters (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruningConfig {
    pub enabled: bool,
    pub weight_threshold: f64,
    pub inactivity_threshold: Duration,
    pub protection_period: Duration,
    /// `[0, 1]`. Probability that a synapse meeting every deterministic
    /// pruning condition is actually pruned on this call; `1.0` makes
    /// pruning fully deterministic (the spec's §8 scenario 6 assumes
    /// `1.0`).
    pub probability: f64,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            weight_threshold: 0.1,
            inactivity_threshold: Duration::from_secs(60),
            protection_period: Duration::from_secs(5),
            probability: 1.0,
        }
    }
}

/// Identity and spatial parameters (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationConfig {
    pub synapse_id: String,
    pub pre_id: String,
    pub post_id: String,
    pub position: [f64; 3],
    pub neurotransmitter_type: NeurotransmitterType,
    /// `[100µs, 100ms]`.
    pub base_synaptic_delay: Duration,
}

impl IdentificationConfig {
    pub fn new(synapse_id: impl Into<String>, pre_id: impl Into<String>, post_id: impl Into<String>) -> Self {
        Self {
            synapse_id: synapse_id.into(),
            pre_id: pre_id.into(),
            post_id: post_id.into(),
            position: [0.0, 0.0, 0.0],
            neurotransmitter_type: NeurotransmitterType::Glutamate,
            base_synaptic_delay: Duration::from_millis(1),
        }
    }
}

/// Aggregate synapse configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseConfig {
    pub identification: IdentificationConfig,
    pub stdp: StdpConfig,
    pub vesicles: VesicleConfig,
    pub pruning: PruningConfig,
    /// When `true`, `validate()` errors are downgraded to warnings. Meant
    /// for tests that deliberately construct out-of-range synapses.
    pub skip_validation: bool,
}

impl SynapseConfig {
    pub fn new(synapse_id: impl Into<String>, pre_id: impl Into<String>, post_id: impl Into<String>) -> Self {
        Self {
            identification: IdentificationConfig::new(synapse_id, pre_id, post_id),
            stdp: StdpConfig::default(),
            vesicles: VesicleConfig::default(),
            pruning: PruningConfig::default(),
            skip_validation: false,
        }
    }

    /// Validate every knob enumerated in §6, classifying violations as
    /// hard errors (forbid construction) or soft warnings.
    pub fn validate(&self) -> ConfigValidation {
        let mut result = ConfigValidation::default();
        self.validate_stdp(&mut result);
        self.validate_vesicles(&mut result);
        self.validate_pruning(&mut result);
        self.validate_identification(&mut result);
        result
    }

    fn validate_stdp(&self, result: &mut ConfigValidation) {
        let s = &self.stdp;
        if !s.learning_rate.is_finite() {
            result.error("stdp.learning_rate is not finite");
        } else if !(1e-4..=0.1).contains(&s.learning_rate) {
            result.warning(format!(
                "stdp.learning_rate {} outside biologically-plausible range [1e-4, 0.1]",
                s.learning_rate
            ));
        }
        if !s.time_constant_ms.is_finite() || s.time_constant_ms <= 0.0 {
            result.error("stdp.time_constant_ms must be finite and > 0");
        }
        if !s.window_size_ms.is_finite() || s.window_size_ms <= 0.0 {
            result.error("stdp.window_size_ms must be finite and > 0");
        }
        if !s.min_weight.is_finite() || !s.max_weight.is_finite() {
            result.error("stdp.min_weight/max_weight must be finite");
        } else if s.min_weight >= s.max_weight {
            result.error("stdp.min_weight must be < stdp.max_weight");
        }
        if !s.asymmetry_ratio.is_finite() || s.asymmetry_ratio <= 0.0 {
            result.error("stdp.asymmetry_ratio must be finite and > 0");
        }
        if !s.metaplasticity_rate.is_finite() {
            result.error("stdp.metaplasticity_rate is not finite");
        } else if !(0.0..=1.0).contains(&s.metaplasticity_rate) {
            result.warning(format!(
                "stdp.metaplasticity_rate {} outside typical range [0, 1]",
                s.metaplasticity_rate
            ));
        }
        if s.cooperativity_threshold < 1 {
            result.error("stdp.cooperativity_threshold must be >= 1");
        }
    }

    fn validate_vesicles(&self, result: &mut ConfigValidation) {
        if !self.vesicles.enabled {
            return;
        }
        let v = &self.vesicles;
        if !(0.0..=1.0).contains(&v.baseline_probability) || !v.baseline_probability.is_finite() {
            result.error("vesicles.baseline_probability must be finite and in [0, 1]");
        }
        if !v.calcium_sensitivity.is_finite() || v.calcium_sensitivity < 0.0 {
            result.error("vesicles.calcium_sensitivity must be finite and >= 0");
        }
        if v.ready_pool_size < 1 {
            result.error("vesicles.ready_pool_size must be >= 1");
        } else if v.ready_pool_size > constants::MAX_VESICLE_POOLS {
            result.error("vesicles.ready_pool_size exceeds MAX_VESICLE_POOLS");
        }
        if v.recycling_pool_size < 1 {
            result.error("vesicles.recycling_pool_size must be >= 1");
        } else if v.recycling_pool_size > constants::MAX_VESICLE_POOLS {
            result.error("vesicles.recycling_pool_size exceeds MAX_VESICLE_POOLS");
        }
        if v.reserve_pool_size > constants::MAX_VESICLE_POOLS {
            result.error("vesicles.reserve_pool_size exceeds MAX_VESICLE_POOLS");
        }
        if v.fast_recycling_time.is_zero() {
            result.error("vesicles.fast_recycling_time must be > 0");
        }
        if v.slow_recycling_time.is_zero() {
            result.error("vesicles.slow_recycling_time must be > 0");
        } else if v.slow_recycling_time <= v.fast_recycling_time {
            result.error("vesicles.slow_recycling_time must be > fast_recycling_time");
        }
        if v.refill_time.is_zero() {
            result.error("vesicles.refill_time must be > 0");
        }
        if !(0.0..=1.0).contains(&v.depletion_factor) || !v.depletion_factor.is_finite() {
            result.error("vesicles.depletion_factor must be finite and in [0, 1]");
        }
        if !v.fatigue_threshold_hz.is_finite() || v.fatigue_threshold_hz <= 0.0 {
            result.warning("vesicles.fatigue_threshold_hz should be finite and > 0");
        }
        if !v.max_release_rate_hz.is_finite() || v.max_release_rate_hz <= 0.0 {
            result.warning("vesicles.max_release_rate_hz should be finite and > 0");
        }
    }

    fn validate_pruning(&self, result: &mut ConfigValidation) {
        let p = &self.pruning;
        if !(0.0..=1.0).contains(&p.probability) || !p.probability.is_finite() {
            result.error("pruning.probability must be finite and in [0, 1]");
        }
        if !p.weight_threshold.is_finite() {
            result.error("pruning.weight_threshold is not finite");
        }
    }

    fn validate_identification(&self, result: &mut ConfigValidation) {
        let id = &self.identification;
        if id.synapse_id.trim().is_empty() {
            result.error("identification.synapse_id must not be empty");
        }
        if id.pre_id.trim().is_empty() {
            result.error("identification.pre_id must not be empty");
        }
        if id.post_id.trim().is_empty() {
            result.error("identification.post_id must not be empty");
        }
        if id.position.iter().any(|c| !c.is_finite()) {
            result.error("identification.position must contain only finite coordinates");
        }
        if id.base_synaptic_delay < constants::MIN_SYNAPTIC_DELAY
            || id.base_synaptic_delay > constants::MAX_SYNAPTIC_DELAY
        {
            result.error(format!(
                "identification.base_synaptic_delay {:?} outside [{:?}, {:?}]",
                id.base_synaptic_delay,
                constants::MIN_SYNAPTIC_DELAY,
                constants::MAX_SYNAPTIC_DELAY
            ));
        }
    }
}

/// Structured validation outcome: errors forbid construction, warnings
/// don't (§4.5).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

/// Preset adapters (§4.5). Each builds a base config and mutates a handful
/// of fields; none of these touch a runtime registry — the source's
/// factory-registry pattern becomes plain functions per §9.
pub mod presets {
    use super::SynapseConfig;

    /// Juvenile/developing synapse: elevated learning rate, wider LTP bias.
    pub fn developmental(synapse_id: impl Into<String>, pre_id: impl Into<String>, post_id: impl Into<String>) -> SynapseConfig {
        let mut cfg = SynapseConfig::new(synapse_id, pre_id, post_id);
        cfg.stdp.learning_rate = (cfg.stdp.learning_rate * 3.0).min(0.1);
        cfg.stdp.metaplasticity_rate *= 2.0;
        cfg
    }

    /// Aged synapse: reduced plasticity, consistent with declining LTP
    /// induction in senescent tissue.
    pub fn aged(synapse_id: impl Into<String>, pre_id: impl Into<String>, post_id: impl Into<String>) -> SynapseConfig {
        let mut cfg = SynapseConfig::new(synapse_id, pre_id, post_id);
        cfg.stdp.learning_rate = (cfg.stdp.learning_rate / 2.0).max(1e-4);
        cfg.vesicles.baseline_probability *= 0.8;
        cfg
    }

    /// Inhibitory synapse: plasticity disabled, vesicle dynamics unchanged.
    pub fn inhibitory(synapse_id: impl Into<String>, pre_id: impl Into<String>, post_id: impl Into<String>) -> SynapseConfig {
        let mut cfg = SynapseConfig::new(synapse_id, pre_id, post_id);
        cfg.stdp.enabled = false;
        cfg.identification.neurotransmitter_type = super::NeurotransmitterType::Gaba;
        cfg
    }

    /// Neuromodulatory synapse: wider integration window, biased toward
    /// potentiation, slow release kinetics.
    pub fn neuromodulatory(synapse_id: impl Into<String>, pre_id: impl Into<String>, post_id: impl Into<String>) -> SynapseConfig {
        let mut cfg = SynapseConfig::new(synapse_id, pre_id, post_id);
        cfg.stdp.window_size_ms *= 2.0;
        cfg.stdp.asymmetry_ratio = (cfg.stdp.asymmetry_ratio * 0.5).max(0.1);
        cfg.identification.neurotransmitter_type = super::NeurotransmitterType::Dopamine;
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = SynapseConfig::new("s0", "n0", "n1");
        let v = cfg.validate();
        assert!(v.is_ok(), "errors: {:?}", v.errors);
    }

    #[test]
    fn inverted_weight_bounds_is_error() {
        let mut cfg = SynapseConfig::new("s0", "n0", "n1");
        cfg.stdp.min_weight = 2.0;
        cfg.stdp.max_weight = 0.1;
        assert!(!cfg.validate().is_ok());
    }

    #[test]
    fn out_of_range_learning_rate_is_warning_not_error() {
        let mut cfg = SynapseConfig::new("s0", "n0", "n1");
        cfg.stdp.learning_rate = 0.5;
        let v = cfg.validate();
        assert!(v.is_ok());
        assert!(!v.warnings.is_empty());
    }

    #[test]
    fn delay_outside_biological_bounds_is_error() {
        let mut cfg = SynapseConfig::new("s0", "n0", "n1");
        cfg.identification.base_synaptic_delay = Duration::from_secs(1);
        assert!(!cfg.validate().is_ok());
    }

    #[test]
    fn slow_recycling_not_greater_than_fast_is_error() {
        let mut cfg = SynapseConfig::new("s0", "n0", "n1");
        cfg.vesicles.slow_recycling_time = cfg.vesicles.fast_recycling_time;
        assert!(!cfg.validate().is_ok());
    }

    #[test]
    fn presets_remain_valid() {
        assert!(presets::developmental("s", "a", "b").validate().is_ok());
        assert!(presets::aged("s", "a", "b").validate().is_ok());
        assert!(presets::inhibitory("s", "a", "b").validate().is_ok());
        assert!(presets::neuromodulatory("s", "a", "b").validate().is_ok());
    }

    #[test]
    fn inhibitory_preset_disables_plasticity() {
        let cfg = presets::inhibitory("s", "a", "b");
        assert!(!cfg.stdp.enabled);
    }
}
