//! Spike-timing-dependent plasticity: the heart of the engine (§4.1).
//!
//! `PlasticityCalculator` is a pure-ish numerical component — it owns
//! bounded spike/activity histories and a slowly-drifting metaplastic
//! threshold, but never touches a mutex, a clock, or a callback itself.
//! The coordinator ([`crate::Synapse`]) is the only thing that locks it.

use serde::{Deserialize, Serialize};

use crate::config::constants::{
    BIOLOGY_MAX_WEIGHT_CHANGE, COOP_HALF_SAT, FREQUENCY_AMPLIFIER_MAX, FREQUENCY_AMPLIFIER_MIN,
    FREQUENCY_DEPENDENCE_THRESHOLD_HZ, GAIN_MAX, GAIN_MIN, HIGH_COOP_FACTOR, MAX_ACTIVITY_HISTORY,
    MAX_SPIKE_HISTORY, NEUROMODULATOR_MAX, NEUROMODULATOR_MIN, ONE_HOUR_NANOS,
};
use crate::config::StdpConfig;
use crate::ring_buffer::RingBuffer;

/// Three-channel neuromodulator state owned by the calculator (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeuromodulatorLevels {
    pub dopamine: f64,
    pub acetylcholine: f64,
    pub norepinephrine: f64,
}

impl Default for NeuromodulatorLevels {
    fn default() -> Self {
        // Midpoint of [0, 10] gives a neutral (1.0x) gain out of the box.
        Self {
            dopamine: 5.0,
            acetylcholine: 5.0,
            norepinephrine: 5.0,
        }
    }
}

/// Inspectable snapshot of calculator state (§4.1 item 7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlasticityStatistics {
    pub pre_spike_count: usize,
    pub post_spike_count: usize,
    pub activity_sample_count: usize,
    pub metaplastic_threshold: f64,
    pub neuromodulators: NeuromodulatorLevels,
    pub total_calls: u64,
    pub total_ltp: u64,
    pub total_ltd: u64,
    /// Set once if the calculator was ever asked to compute with an
    /// out-of-bounds configuration value; never unset by `reset()`.
    pub degraded: bool,
}

/// Spike-timing-dependent plasticity calculator.
#[derive(Debug, Clone)]
pub struct PlasticityCalculator {
    config: StdpConfig,
    pre_spikes: RingBuffer<i64>,
    post_spikes: RingBuffer<i64>,
    activity_history: RingBuffer<f64>,
    theta: f64,
    theta_baseline: f64,
    neuromodulators: NeuromodulatorLevels,
    degraded: bool,
    total_calls: u64,
    total_ltp: u64,
    total_ltd: u64,
}

impl PlasticityCalculator {
    pub fn new(config: StdpConfig) -> Self {
        let theta_baseline = FREQUENCY_DEPENDENCE_THRESHOLD_HZ * 0.5;
        Self {
            config,
            pre_spikes: RingBuffer::new(MAX_SPIKE_HISTORY),
            post_spikes: RingBuffer::new(MAX_SPIKE_HISTORY),
            activity_history: RingBuffer::new(MAX_ACTIVITY_HISTORY),
            theta: theta_baseline,
            theta_baseline,
            neuromodulators: NeuromodulatorLevels::default(),
            degraded: false,
            total_calls: 0,
            total_ltp: 0,
            total_ltd: 0,
        }
    }

    fn window_nanos(&self) -> i64 {
        (self.config.window_size_ms * 1_000_000.0) as i64
    }

    /// Append a presynaptic spike timestamp (nanoseconds, caller's own
    /// monotonic domain). Evicts entries older than `t - W` and hard-caps
    /// at `MAX_SPIKE_HISTORY`; safe against out-of-order `t`.
    pub fn add_pre_spike(&mut self, t_nanos: i64) {
        Self::add_spike(&mut self.pre_spikes, t_nanos, self.window_nanos());
    }

    pub fn add_post_spike(&mut self, t_nanos: i64) {
        Self::add_spike(&mut self.post_spikes, t_nanos, self.window_nanos());
    }

    fn add_spike(history: &mut RingBuffer<i64>, t_nanos: i64, window_nanos: i64) {
        history.push(t_nanos);
        if window_nanos > 0 {
            history.retain(|&existing| t_nanos.saturating_sub(existing).abs() <= window_nanos);
        }
    }

    /// All (pre, post, Δt) pairings within the window. Not required for
    /// core correctness (§4.1 item 2) — provided for tests and tooling.
    pub fn recent_spike_pairs(&self) -> Vec<(i64, i64, i64)> {
        let window_nanos = self.window_nanos().max(0);
        let mut pairs = Vec::new();
        for &pre_t in self.pre_spikes.iter() {
            for &post_t in self.post_spikes.iter() {
                let dt = pre_t.saturating_sub(post_t);
                if dt.abs() <= window_nanos {
                    pairs.push((pre_t, post_t, dt));
                }
            }
        }
        pairs
    }

    pub fn update_activity_history(&mut self, sample: f64) {
        if sample.is_finite() {
            self.activity_history.push(sample);
        }
    }

    fn mean_activity(&self) -> f64 {
        if self.activity_history.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.activity_history.iter().sum();
        sum / self.activity_history.len() as f64
    }

    /// Clamp to `[0, 10]`; a non-finite input is rejected and the previous
    /// valid value is kept (§4.1 item 5).
    pub fn set_neuromodulator_levels(&mut self, dopamine: f64, acetylcholine: f64, norepinephrine: f64) {
        if dopamine.is_finite() {
            self.neuromodulators.dopamine = dopamine.clamp(NEUROMODULATOR_MIN, NEUROMODULATOR_MAX);
        }
        if acetylcholine.is_finite() {
            self.neuromodulators.acetylcholine = acetylcholine.clamp(NEUROMODULATOR_MIN, NEUROMODULATOR_MAX);
        }
        if norepinephrine.is_finite() {
            self.neuromodulators.norepinephrine = norepinephrine.clamp(NEUROMODULATOR_MIN, NEUROMODULATOR_MAX);
        }
    }

    /// Current neuromodulator levels feeding the gain term.
    pub fn neuromodulators(&self) -> NeuromodulatorLevels {
        self.neuromodulators
    }

    pub fn reset(&mut self) {
        self.pre_spikes.clear();
        self.post_spikes.clear();
        self.activity_history.clear();
        self.theta = self.theta_baseline;
    }

    pub fn statistics(&self) -> PlasticityStatistics {
        PlasticityStatistics {
            pre_spike_count: self.pre_spikes.len(),
            post_spike_count: self.post_spikes.len(),
            activity_sample_count: self.activity_history.len(),
            metaplastic_threshold: self.theta,
            neuromodulators: self.neuromodulators,
            total_calls: self.total_calls,
            total_ltp: self.total_ltp,
            total_ltd: self.total_ltd,
            degraded: self.degraded,
        }
    }

    /// The STDP algorithm itself (§4.1). Never panics; every rejected or
    /// pathological input collapses to `0.0`.
    ///
    /// `current_weight` is accepted to match the component's documented
    /// contract (§4.1 item 3) and is available to future gain terms; the
    /// final weight clamp against `min_weight`/`max_weight` is applied by
    /// the coordinator ([`crate::Synapse::apply_plasticity`]), not here, so
    /// that the configured bound is reached exactly rather than
    /// asymptotically approached.
    pub fn calculate_stdp_weight_change(
        &mut self,
        dt_nanos: i64,
        _current_weight: f64,
        cooperative_inputs: i64,
    ) -> f64 {
        self.total_calls += 1;

        if !self.config.enabled {
            return 0.0;
        }
        if cooperative_inputs <= 0 {
            return 0.0;
        }
        if (cooperative_inputs as u64) < self.config.cooperativity_threshold as u64 {
            return 0.0;
        }
        if dt_nanos.checked_abs().map(|a| a > ONE_HOUR_NANOS).unwrap_or(true) {
            return 0.0;
        }
        if !self.config.learning_rate.is_finite()
            || self.config.time_constant_ms <= 0.0
            || !self.config.time_constant_ms.is_finite()
            || self.config.window_size_ms <= 0.0
            || !self.config.window_size_ms.is_finite()
        {
            self.degraded = true;
            return 0.0;
        }

        let dt_ms = dt_nanos as f64 / 1_000_000.0;
        if dt_ms.abs() > self.config.window_size_ms {
            return 0.0;
        }
        if dt_nanos == 0 {
            return 0.0;
        }

        let magnitude = self.config.learning_rate * (-dt_ms.abs() / self.config.time_constant_ms).exp();
        let is_ltp = dt_nanos < 0;
        let mut dw = if is_ltp {
            magnitude
        } else {
            -magnitude * self.config.asymmetry_ratio
        };

        // Cooperativity: saturating response, asymptote at HIGH_COOP_FACTOR.
        let k = (cooperative_inputs as f64 - self.config.cooperativity_threshold as f64).max(0.0);
        let coop_factor = 1.0 + (HIGH_COOP_FACTOR - 1.0) * k / (k + COOP_HALF_SAT);
        dw *= coop_factor;

        // Frequency dependence: above FREQUENCY_DEPENDENCE_THRESHOLD_HZ,
        // amplify LTP / diminish LTD; below, the inverse — both fall out
        // of the same ratio so there is no separate branch.
        if self.config.frequency_dependent {
            let mean_activity = self.mean_activity();
            let ratio = (mean_activity / FREQUENCY_DEPENDENCE_THRESHOLD_HZ).max(1e-6);
            let ltp_gain = ratio.clamp(FREQUENCY_AMPLIFIER_MIN, FREQUENCY_AMPLIFIER_MAX);
            let ltd_gain = (1.0 / ratio).clamp(FREQUENCY_AMPLIFIER_MIN, FREQUENCY_AMPLIFIER_MAX);
            dw *= if is_ltp { ltp_gain } else { ltd_gain };
        }

        // Metaplasticity: damp below θ, enhance above; θ then drifts
        // toward observed activity. With no activity recorded yet there is
        // nothing to compare against, so the gain stays neutral rather than
        // collapsing toward `GAIN_MIN` — only once real history accumulates
        // does the BCM-style sliding threshold start to bite.
        let mean_activity = self.mean_activity();
        let meta_scale = if self.activity_history.is_empty() || self.theta <= 1e-9 {
            1.0
        } else {
            (mean_activity / self.theta).clamp(GAIN_MIN, GAIN_MAX)
        };
        dw *= meta_scale;
        self.theta += self.config.metaplasticity_rate * (mean_activity - self.theta);
        if !self.theta.is_finite() {
            self.theta = self.theta_baseline;
        }

        // Neuromodulator gain: exponential in the summed level so the
        // baseline `NeuromodulatorLevels::default()` (5 + 5 + 5 = 15, the
        // midpoint of [0, 30]) lands exactly on a neutral 1.0x, with the
        // extremes landing exactly on `GAIN_MIN`/`GAIN_MAX` — a linear
        // interpolation between those two bounds would instead put the
        // midpoint at their arithmetic mean (~2.1x), never neutral.
        let total = self.neuromodulators.dopamine
            + self.neuromodulators.acetylcholine
            + self.neuromodulators.norepinephrine;
        let neuromod_gain = 2f64.powf((total - 15.0) / 7.5).clamp(GAIN_MIN, GAIN_MAX);
        dw *= neuromod_gain;

        if !dw.is_finite() {
            return 0.0;
        }

        let bound = BIOLOGY_MAX_WEIGHT_CHANGE * self.config.max_weight.abs().max(1.0);
        dw = dw.clamp(-bound, bound);

        if dw > 0.0 {
            self.total_ltp += 1;
        } else if dw < 0.0 {
            self.total_ltd += 1;
        }

        dw
    }
}
