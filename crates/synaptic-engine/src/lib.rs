//! Biologically plausible synaptic connection engine.
//!
//! A [`Synapse`] is the runtime for a single directed connection: it owns
//! an STDP calculator ([`plasticity::PlasticityCalculator`]), a three-tier
//! vesicle release model ([`vesicles::VesicleSystem`]), a bounded activity
//! history ([`activity::ActivityMonitor`]), and a pruning decision
//! ([`pruning::should_prune`]). It does not own neurons, a routing table,
//! or timers — those live behind the borrowed [`callbacks::SynapseCallbacks`]
//! collaborator.
//!
//! Mutable state is guarded by a single `parking_lot::Mutex`; callbacks are
//! always invoked after the lock is released, using data snapshotted while
//! held (§5).

pub mod activity;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod neurotransmitters;
pub mod plasticity;
pub mod pruning;
pub mod ring_buffer;
pub mod vesicles;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, trace, warn};

pub use config::SynapseConfig;
pub use error::{Result, SynapseError};

use activity::{ActivityMonitor, ActivityStatistics, PlasticityEventKind};
use callbacks::{Message, SynapseCallbacks};
use config::constants::{NEUROMODULATOR_EWMA_ALPHA, NEUROMODULATOR_MAX, NEUROMODULATOR_MIN};
use neurotransmitters::NeurotransmitterType;
use plasticity::{NeuromodulatorLevels, PlasticityCalculator, PlasticityStatistics};
use pruning::{gate_with_probability, PruningDecision, PruningSnapshot};
use vesicles::{VesicleState, VesicleSystem};

/// Lifecycle state machine (§4.4): one-way, `Active` never returns once
/// `Pruned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Pruned,
}

/// Outcome of a successful [`Synapse::transmit`] call. A vesicle-release
/// failure is reported as [`SynapseError::VesicleDepleted`] instead of a
/// value here (§4.3, §7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmissionOutcome {
    pub effective_value: f64,
    pub delay: Duration,
}

/// Outcome of a single [`Synapse::apply_plasticity`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlasticityOutcome {
    pub delta: f64,
    pub weight_before: f64,
    pub weight_after: f64,
}

/// Snapshot of everything interesting about a synapse, safe to hand out
/// without holding the lock.
#[derive(Debug, Clone)]
pub struct SynapseStatistics {
    pub weight: f64,
    pub lifecycle: LifecycleState,
    pub plasticity: PlasticityStatistics,
    pub vesicles: Option<VesicleState>,
    pub activity: ActivityStatistics,
}

struct SynapseState {
    weight: f64,
    lifecycle: LifecycleState,
    plasticity: PlasticityCalculator,
    vesicles: Option<VesicleSystem>,
    activity: ActivityMonitor,
    creation_time: Instant,
    last_transmission: Option<Instant>,
    last_plasticity_event: Option<Instant>,
    neuromodulator_ewma: HashMap<NeurotransmitterType, f64>,
}

/// A single directed synaptic connection.
///
/// Generic over its callback collaborator so a caller can use a concrete,
/// monomorphized type (no vtable) or `Box<dyn SynapseCallbacks>` as needed.
pub struct Synapse<C: SynapseCallbacks> {
    id: String,
    pre_id: String,
    post_id: String,
    neurotransmitter_type: NeurotransmitterType,
    base_delay: Duration,
    config: SynapseConfig,
    state: Mutex<SynapseState>,
    callbacks: C,
}

impl<C: SynapseCallbacks> Synapse<C> {
    /// Construct a new synapse. Returns [`SynapseError::InvalidConfig`] if
    /// `config.validate()` reports any hard error and
    /// `config.skip_validation` is `false` (§4.5).
    pub fn new(config: SynapseConfig, callbacks: C) -> Result<Self> {
        let validation = config.validate();
        if !validation.is_ok() && !config.skip_validation {
            return Err(SynapseError::InvalidConfig(validation));
        }
        if !validation.warnings.is_empty() {
            warn!(
                synapse_id = %config.identification.synapse_id,
                warnings = ?validation.warnings,
                "synapse configuration has warnings"
            );
        }

        let now = Instant::now();
        let vesicles = if config.vesicles.enabled {
            Some(VesicleSystem::new(config.vesicles.clone()))
        } else {
            None
        };

        Ok(Self {
            id: config.identification.synapse_id.clone(),
            pre_id: config.identification.pre_id.clone(),
            post_id: config.identification.post_id.clone(),
            neurotransmitter_type: config.identification.neurotransmitter_type,
            base_delay: config.identification.base_synaptic_delay,
            state: Mutex::new(SynapseState {
                weight: 1.0_f64.clamp(config.stdp.min_weight, config.stdp.max_weight),
                lifecycle: LifecycleState::Active,
                plasticity: PlasticityCalculator::new(config.stdp.clone()),
                vesicles,
                activity: ActivityMonitor::new(),
                creation_time: now,
                last_transmission: None,
                last_plasticity_event: None,
                neuromodulator_ewma: HashMap::new(),
            }),
            config,
            callbacks,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get_weight(&self) -> f64 {
        self.state.lock().weight
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().lifecycle == LifecycleState::Active
    }

    /// Force a weight, clamped to the configured bounds. Used by callers
    /// that import weights from an external source (e.g. a loaded
    /// snapshot); not used by the plasticity path itself.
    pub fn set_weight(&self, weight: f64) {
        if !weight.is_finite() {
            return;
        }
        let mut state = self.state.lock();
        state.weight = weight.clamp(self.config.stdp.min_weight, self.config.stdp.max_weight);
    }

    /// Transmit a presynaptic signal (§4.3).
    ///
    /// Vesicle release is attempted first (if enabled); on release, or if
    /// vesicle dynamics are disabled entirely, the signal is scaled by the
    /// current weight and delivered (synchronously for zero delay,
    /// scheduled otherwise). Holds the lock only long enough to mutate
    /// pool/history state and snapshot what the callback needs.
    pub fn transmit(&self, signal: f64) -> Result<TransmissionOutcome> {
        if !signal.is_finite() {
            return Err(SynapseError::InvalidSignal(signal));
        }

        let now = Instant::now();
        let (released, weight, delay) = {
            let mut state = self.state.lock();
            if state.lifecycle == LifecycleState::Pruned {
                return Err(SynapseError::SynapseInactive(self.id.clone()));
            }

            let calcium = self.callbacks.get_calcium_level();
            let released = match state.vesicles.as_mut() {
                Some(sys) => sys.try_release(calcium, now).released,
                None => true,
            };

            let effective_value = if released { signal * state.weight } else { 0.0 };
            state.activity.record_transmission(released, effective_value);
            state.last_transmission = Some(now);

            let delay = self
                .callbacks
                .get_transmission_delay(&self.id)
                .min(config::constants::MAX_DELAY_DURATION);

            (released, state.weight, delay)
        };

        if !released {
            trace!(synapse_id = %self.id, "transmission attempted, no vesicle released");
            return Err(SynapseError::VesicleDepleted);
        }

        let effective_value = signal * weight;

        if let Err(e) = self
            .callbacks
            .release_neurotransmitter(self.neurotransmitter_type, effective_value.abs())
        {
            debug!(synapse_id = %self.id, error = %e, "release_neurotransmitter callback failed");
        }

        let msg = Message {
            source_id: self.pre_id.clone(),
            target_id: self.post_id.clone(),
            synapse_id: self.id.clone(),
            value: effective_value,
            timestamp: now,
            neurotransmitter_type: self.neurotransmitter_type,
        };

        let delivery = if delay.is_zero() {
            self.callbacks.deliver_message(&msg)
        } else {
            self.callbacks.schedule_delayed_delivery(msg, delay)
        };

        if let Err(e) = delivery {
            // Counted in statistics per §7's error table; the lock was
            // released for the callback call above and is briefly
            // reacquired here, not held across it.
            self.state.lock().activity.record_delivery_failure();
            return Err(SynapseError::DeliveryFailed(e));
        }

        Ok(TransmissionOutcome { effective_value, delay })
    }

    /// Apply a single STDP pairing (§4.1). `dt_nanos` is `t_pre - t_post`
    /// in the caller's own nanosecond domain; negative values are
    /// presynaptic-before-postsynaptic pairings (LTP).
    pub fn apply_plasticity(&self, dt_nanos: i64, cooperative_inputs: i64) -> PlasticityOutcome {
        let now = Instant::now();
        let (delta, weight_before, weight_after, kind) = {
            let mut state = self.state.lock();
            let weight_before = state.weight;

            // §4.4 step 1: feed the pairing's implied pre/post spikes into
            // the calculator's bounded histories before asking for Δw, so
            // `recent_spike_pairs()` and §3's spike histories are actually
            // populated through this path. Timestamps live in the
            // calculator's own nanosecond domain, anchored to synapse
            // creation; `post_t` is "now", `pre_t` is `post_t + dt_nanos`
            // since `dt_nanos == pre_t - post_t`.
            let post_t = now
                .saturating_duration_since(state.creation_time)
                .as_nanos()
                .min(i64::MAX as u128) as i64;
            let pre_t = post_t.saturating_add(dt_nanos);
            state.plasticity.add_post_spike(post_t);
            state.plasticity.add_pre_spike(pre_t);

            let delta = state
                .plasticity
                .calculate_stdp_weight_change(dt_nanos, weight_before, cooperative_inputs);
            let weight_after = (weight_before + delta).clamp(self.config.stdp.min_weight, self.config.stdp.max_weight);
            state.weight = weight_after;
            state.plasticity.update_activity_history(cooperative_inputs.max(0) as f64);
            state.last_plasticity_event = Some(now);

            let kind = if delta > 0.0 {
                PlasticityEventKind::Ltp
            } else if delta < 0.0 {
                PlasticityEventKind::Ltd
            } else {
                PlasticityEventKind::NoChange
            };
            let record = state
                .activity
                .record_plasticity_event(kind, weight_before, weight_after, delta, "stdp");
            drop(state);
            self.callbacks.report_plasticity_event(&record);
            (delta, weight_before, weight_after, kind)
        };

        trace!(
            synapse_id = %self.id,
            ?kind,
            delta,
            weight_before,
            weight_after,
            "applied plasticity"
        );

        PlasticityOutcome {
            delta,
            weight_before,
            weight_after,
        }
    }

    /// Record a presynaptic spike timestamp for future STDP pairings.
    pub fn register_pre_spike(&self, t_nanos: i64) {
        self.state.lock().plasticity.add_pre_spike(t_nanos);
    }

    /// Record a postsynaptic spike timestamp for future STDP pairings.
    pub fn register_post_spike(&self, t_nanos: i64) {
        self.state.lock().plasticity.add_post_spike(t_nanos);
    }

    /// Set neuromodulator levels feeding into STDP gain (§4.1 item 5).
    pub fn set_neuromodulator_levels(&self, levels: NeuromodulatorLevels) {
        self.state
            .lock()
            .plasticity
            .set_neuromodulator_levels(levels.dopamine, levels.acetylcholine, levels.norepinephrine);
    }

    /// Fold one ligand reading into its running EWMA and forward the
    /// result to the STDP gain calculator (§4.4). Non-finite
    /// concentrations are dropped, matching the clamp-or-keep-prior
    /// contract `set_neuromodulator_levels` already applies.
    ///
    /// Only `Dopamine`, `Acetylcholine` and `Norepinephrine` feed a gain
    /// channel the calculator understands; other ligands (e.g. the
    /// excitatory/inhibitory transmitters carried on messages) still get
    /// their EWMA tracked here for callers that read it back via
    /// [`Synapse::neuromodulator_level`], they just have nothing to
    /// forward.
    pub fn process_neuromodulation(&self, ligand: NeurotransmitterType, concentration: f64) {
        if !concentration.is_finite() {
            return;
        }
        let concentration = concentration.clamp(NEUROMODULATOR_MIN, NEUROMODULATOR_MAX);
        let mut state = self.state.lock();
        let prior = *state
            .neuromodulator_ewma
            .entry(ligand)
            .or_insert(concentration);
        let updated = prior + NEUROMODULATOR_EWMA_ALPHA * (concentration - prior);
        state.neuromodulator_ewma.insert(ligand, updated);

        let dopamine = state
            .neuromodulator_ewma
            .get(&NeurotransmitterType::Dopamine)
            .copied()
            .unwrap_or(state.plasticity.neuromodulators().dopamine);
        let acetylcholine = state
            .neuromodulator_ewma
            .get(&NeurotransmitterType::Acetylcholine)
            .copied()
            .unwrap_or(state.plasticity.neuromodulators().acetylcholine);
        let norepinephrine = state
            .neuromodulator_ewma
            .get(&NeurotransmitterType::Norepinephrine)
            .copied()
            .unwrap_or(state.plasticity.neuromodulators().norepinephrine);
        state
            .plasticity
            .set_neuromodulator_levels(dopamine, acetylcholine, norepinephrine);
    }

    /// Current EWMA-smoothed level tracked for one ligand, or `None` if
    /// [`Synapse::process_neuromodulation`] has never observed it.
    pub fn neuromodulator_level(&self, ligand: NeurotransmitterType) -> Option<f64> {
        self.state.lock().neuromodulator_ewma.get(&ligand).copied()
    }

    /// Evaluate whether this synapse should be pruned right now (§4.4).
    /// Applies the configured stochastic gate using the thread-local RNG;
    /// for a deterministic check use [`pruning::should_prune`] directly
    /// with a snapshot from [`Synapse::statistics`].
    pub fn should_prune(&self) -> bool {
        let decision = self.pruning_decision();
        let draw: f64 = rand::thread_rng().gen();
        gate_with_probability(&decision, self.config.pruning.probability, draw)
    }

    /// Deterministic pruning evaluation, no RNG draw applied.
    pub fn pruning_decision(&self) -> PruningDecision {
        let state = self.state.lock();
        let snapshot = PruningSnapshot {
            weight: state.weight,
            creation_time: state.creation_time,
            last_transmission: state.last_transmission,
            last_plasticity_event: state.last_plasticity_event,
            neuromodulator_bias: Self::neuromodulator_bias(&state),
        };
        pruning::should_prune(&self.config.pruning, &snapshot, Instant::now())
    }

    /// Net dopaminergic protection vs. cholinergic/noradrenergic pressure,
    /// `[-1, 1]` (§4.4's optional pruning override). Dopamine is read from
    /// the calculator's gain channel (the same level `set_neuromodulator_levels`
    /// feeds); GABA comes from the per-ligand EWMA tracked by
    /// `process_neuromodulation`, since the calculator has no GABA channel
    /// of its own. Unobserved GABA defaults to the neutral midpoint so a
    /// synapse that has never seen a GABA reading gets no pruning bias
    /// from it.
    fn neuromodulator_bias(state: &SynapseState) -> f64 {
        let dopamine = state.plasticity.neuromodulators().dopamine;
        let gaba = state
            .neuromodulator_ewma
            .get(&NeurotransmitterType::Gaba)
            .copied()
            .unwrap_or(NEUROMODULATOR_MAX / 2.0);
        ((dopamine - gaba) / NEUROMODULATOR_MAX).clamp(-1.0, 1.0)
    }

    /// Transition this synapse to [`LifecycleState::Pruned`]. Idempotent;
    /// a pruned synapse stays pruned (§4.4, one-way state machine).
    pub fn mark_pruned(&self) {
        let mut state = self.state.lock();
        if state.lifecycle != LifecycleState::Pruned {
            state.lifecycle = LifecycleState::Pruned;
            debug!(synapse_id = %self.id, "synapse pruned");
        }
    }

    pub fn statistics(&self) -> SynapseStatistics {
        let state = self.state.lock();
        SynapseStatistics {
            weight: state.weight,
            lifecycle: state.lifecycle,
            plasticity: state.plasticity.statistics(),
            vesicles: state.vesicles.as_ref().map(|v| v.state()),
            activity: state.activity.statistics(),
        }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callbacks::testing::RecordingCallbacks;

    fn synapse(cfg_mut: impl FnOnce(&mut SynapseConfig)) -> Synapse<RecordingCallbacks> {
        let mut cfg = SynapseConfig::new("syn-0", "neuron-a", "neuron-b");
        cfg_mut(&mut cfg);
        let callbacks = RecordingCallbacks::new(Duration::ZERO);
        Synapse::new(cfg, callbacks).expect("valid config")
    }

    #[test]
    fn construction_rejects_invalid_config_by_default() {
        let mut cfg = SynapseConfig::new("s", "a", "b");
        cfg.stdp.min_weight = 5.0;
        cfg.stdp.max_weight = 1.0;
        let callbacks = RecordingCallbacks::new(Duration::ZERO);
        assert!(Synapse::new(cfg, callbacks).is_err());
    }

    #[test]
    fn skip_validation_allows_out_of_range_config() {
        let mut cfg = SynapseConfig::new("s", "a", "b");
        cfg.stdp.min_weight = 5.0;
        cfg.stdp.max_weight = 1.0;
        cfg.skip_validation = true;
        let callbacks = RecordingCallbacks::new(Duration::ZERO);
        assert!(Synapse::new(cfg, callbacks).is_ok());
    }

    #[test]
    fn transmit_delivers_synchronously_with_zero_delay() {
        let syn = synapse(|cfg| {
            cfg.vesicles.enabled = false;
        });
        let outcome = syn.transmit(1.0).expect("transmit succeeds");
        assert_eq!(outcome.effective_value, 1.0);
        assert_eq!(syn.callbacks.delivered_count(), 1);
    }

    #[test]
    fn transmit_schedules_delivery_when_delay_is_positive() {
        let mut cfg = SynapseConfig::new("s", "a", "b");
        cfg.vesicles.enabled = false;
        let callbacks = RecordingCallbacks::new(Duration::from_millis(5));
        let syn = Synapse::new(cfg, callbacks).unwrap();
        syn.transmit(1.0).expect("transmit succeeds");
        assert_eq!(syn.callbacks.delivered_count(), 0);
        assert_eq!(syn.callbacks.scheduled.lock().len(), 1);
    }

    #[test]
    fn transmit_fails_with_vesicle_depleted_when_nothing_releases() {
        let syn = synapse(|cfg| {
            cfg.vesicles.baseline_probability = 0.0;
        });
        assert!(matches!(syn.transmit(1.0), Err(SynapseError::VesicleDepleted)));
        assert_eq!(syn.callbacks.delivered_count(), 0);
    }

    #[test]
    fn transmit_rejects_non_finite_signal() {
        let syn = synapse(|_| {});
        assert!(matches!(syn.transmit(f64::NAN), Err(SynapseError::InvalidSignal(_))));
    }

    #[test]
    fn pruned_synapse_rejects_transmit() {
        let syn = synapse(|_| {});
        syn.mark_pruned();
        assert!(matches!(syn.transmit(1.0), Err(SynapseError::SynapseInactive(_))));
    }

    #[test]
    fn apply_plasticity_moves_weight_and_reports_event() {
        let syn = synapse(|cfg| {
            cfg.stdp.cooperativity_threshold = 1;
        });
        let before = syn.get_weight();
        let outcome = syn.apply_plasticity(-10_000_000, 1);
        assert!(outcome.delta > 0.0);
        assert!(syn.get_weight() >= before);
    }

    #[test]
    fn mark_pruned_is_idempotent_and_one_way() {
        let syn = synapse(|_| {});
        syn.mark_pruned();
        syn.mark_pruned();
        assert_eq!(syn.statistics().lifecycle, LifecycleState::Pruned);
    }

    #[test]
    fn fresh_synapse_is_not_pruned() {
        let syn = synapse(|cfg| {
            cfg.pruning.enabled = true;
        });
        assert!(!syn.pruning_decision().should_prune);
    }

    #[test]
    fn vesicle_depletion_reduces_release_rate_under_load() {
        let syn = synapse(|cfg| {
            cfg.vesicles.ready_pool_size = 15;
            cfg.vesicles.baseline_probability = 1.0;
        });
        let mut releases = 0;
        for _ in 0..100 {
            if syn.transmit(1.0).is_ok() {
                releases += 1;
            }
        }
        assert!(releases > 0);
        let stats = syn.statistics();
        assert!(stats.vesicles.unwrap().ready <= 15);
    }

    #[test]
    fn delivery_failure_is_counted_in_statistics() {
        let mut cfg = SynapseConfig::new("s", "a", "b");
        cfg.vesicles.enabled = false;
        let callbacks = RecordingCallbacks::new(Duration::ZERO);
        *callbacks.fail_delivery.lock() = true;
        let syn = Synapse::new(cfg, callbacks).unwrap();

        assert!(matches!(syn.transmit(1.0), Err(SynapseError::DeliveryFailed(_))));
        assert_eq!(syn.statistics().activity.total_delivery_failures, 1);
    }

    #[test]
    fn apply_plasticity_populates_spike_histories() {
        let syn = synapse(|cfg| {
            cfg.stdp.cooperativity_threshold = 1;
        });
        syn.apply_plasticity(-10_000_000, 1);
        syn.apply_plasticity(5_000_000, 1);
        let stats = syn.statistics();
        assert_eq!(stats.plasticity.pre_spike_count, 2);
        assert_eq!(stats.plasticity.post_spike_count, 2);
    }
}
