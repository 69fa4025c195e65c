//! Three-tier vesicle pool and probabilistic release (§4.2).
//!
//! Pools move vesicles in one direction only:
//! `reserve -> recycling -> ready -> (released)`. A released vesicle
//! re-enters `recycling` on a fast or slow timescale (stochastically
//! chosen, biased toward slow as depletion rises), then must still clear
//! an "empty-refilling" leg of `refill_time` before it rejoins `ready`;
//! both legs are tracked as the same `recycling` pool counter, just with
//! different pending timers.

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::VesicleConfig;

/// Outcome of a single `try_release` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReleaseOutcome {
    pub released: bool,
    /// Release probability actually used for this attempt (post calcium,
    /// depletion and fatigue scaling).
    pub probability_used: f64,
    pub ready_remaining: u32,
    /// `1 - ready / ready_pool_size`, `0` meaning fully stocked.
    pub depletion_level: f64,
}

/// Snapshot of pool state (§4.2 item 6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VesicleState {
    pub ready: u32,
    pub recycling: u32,
    pub reserve: u32,
    pub fatigue: f64,
    pub recent_release_rate_hz: f64,
}

/// Which leg of the recycling pipeline a pending vesicle is on (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecycleStage {
    /// Fast or slow recycling timer, started at the moment of release.
    Recycling,
    /// "Empty-refilling" leg, started once the recycling timer expires.
    /// Only after this leg does the vesicle rejoin `ready`.
    Refilling,
}

#[derive(Debug, Clone)]
struct PendingRecycle {
    due: Instant,
    stage: RecycleStage,
}

/// Three-pool vesicle release model owned by a single synapse.
#[derive(Debug, Clone)]
pub struct VesicleSystem {
    config: VesicleConfig,
    ready: u32,
    recycling: u32,
    reserve: u32,
    pending: Vec<PendingRecycle>,
    fatigue: f64,
    last_release: Option<Instant>,
    recent_release_rate_hz: f64,
    last_refill: Instant,
}

impl VesicleSystem {
    pub fn new(config: VesicleConfig) -> Self {
        let now = Instant::now();
        Self {
            ready: config.ready_pool_size.min(crate::config::constants::MAX_VESICLE_POOLS),
            recycling: 0,
            reserve: config.reserve_pool_size.min(crate::config::constants::MAX_VESICLE_POOLS),
            pending: Vec::new(),
            fatigue: 0.0,
            last_release: None,
            recent_release_rate_hz: 0.0,
            last_refill: now,
            config,
        }
    }

    /// Advance recycling/refill clocks and let fatigue decay. Must be
    /// called (by the coordinator) before `try_release` reflects accurate
    /// timing; `try_release` also calls it internally so it is always
    /// safe to skip.
    pub fn tick(&mut self, now: Instant) {
        let mut ready_to_move = 0u32;
        let mut advancing = Vec::new();
        self.pending.retain(|p| {
            if now < p.due {
                return true;
            }
            match p.stage {
                // Recycling timer expired: still not release-competent,
                // move on to the empty-refilling leg (§4.2).
                RecycleStage::Recycling => advancing.push(PendingRecycle {
                    due: now + self.config.refill_time,
                    stage: RecycleStage::Refilling,
                }),
                // Refilling leg expired: this vesicle is ready now.
                RecycleStage::Refilling => ready_to_move += 1,
            }
            false
        });
        self.pending.extend(advancing);
        self.recycling = self.recycling.saturating_sub(ready_to_move);
        self.ready = (self.ready + ready_to_move).min(crate::config::constants::MAX_VESICLE_POOLS);

        if self.reserve > 0 && now.duration_since(self.last_refill) >= self.config.refill_time {
            let periods = duration_div(now.duration_since(self.last_refill), self.config.refill_time).max(1);
            let moved = periods.min(self.reserve as u64) as u32;
            self.reserve -= moved;
            self.recycling = (self.recycling + moved).min(crate::config::constants::MAX_VESICLE_POOLS);
            // Reserve-sourced vesicles enter directly on the refilling
            // leg (they skip the usage-driven fast/slow recycling timer,
            // which only applies to just-released vesicles); without a
            // pending entry they'd sit in `recycling` forever, never
            // rejoining `ready` (nothing else drains this counter).
            for _ in 0..moved {
                self.pending.push(PendingRecycle {
                    due: now + self.config.refill_time,
                    stage: RecycleStage::Refilling,
                });
            }
            self.last_refill = now;
        }

        if let Some(last) = self.last_release {
            let idle = now.duration_since(last);
            if !self.config.recovery_time.is_zero() {
                let decay = idle.as_secs_f64() / self.config.recovery_time.as_secs_f64();
                self.fatigue = (self.fatigue - decay).max(0.0);
            }
        }
    }

    fn depletion_level(&self) -> f64 {
        if self.config.ready_pool_size == 0 {
            return 1.0;
        }
        1.0 - (self.ready as f64 / self.config.ready_pool_size as f64)
    }

    /// Attempt a single release. `calcium_level` must be finite and `>= 0`;
    /// anything else is treated as `1.0` (§4.2 item 3, neutral baseline).
    pub fn try_release(&mut self, calcium_level: f64, now: Instant) -> ReleaseOutcome {
        self.tick(now);

        if !self.config.enabled {
            return ReleaseOutcome {
                released: false,
                probability_used: 0.0,
                ready_remaining: self.ready,
                depletion_level: self.depletion_level(),
            };
        }

        let calcium = if calcium_level.is_finite() && calcium_level >= 0.0 {
            calcium_level
        } else {
            1.0
        };

        let depletion = self.depletion_level();
        let p = self.config.baseline_probability
            * (1.0 + self.config.calcium_sensitivity * (calcium - 1.0))
            * (1.0 - self.config.depletion_factor * depletion)
            * (1.0 - self.fatigue);
        let p = p.clamp(0.0, 1.0);

        let released = self.ready > 0 && rand::thread_rng().gen_bool(p);

        if released {
            self.ready -= 1;
            // Smaller probability of the slow leg, proportional to how
            // depleted the pool currently is (§4.2): a fresh synapse
            // recycles fast almost every time, a heavily used one
            // increasingly draws the slow timer.
            let p_slow = (depletion.clamp(0.0, 1.0) * 0.5).clamp(0.0, 1.0);
            let recycle_time = if rand::thread_rng().gen_bool(p_slow) {
                self.config.slow_recycling_time
            } else {
                self.config.fast_recycling_time
            };
            self.recycling = self.recycling.saturating_add(1);
            self.pending.push(PendingRecycle {
                due: now + recycle_time,
                stage: RecycleStage::Recycling,
            });

            let rate_hz = match self.last_release {
                Some(last) => {
                    let dt = now.duration_since(last).as_secs_f64();
                    if dt > 0.0 {
                        1.0 / dt
                    } else {
                        self.config.fatigue_threshold_hz * 2.0
                    }
                }
                None => 0.0,
            };
            self.recent_release_rate_hz = rate_hz;
            self.last_release = Some(now);

            if rate_hz > self.config.fatigue_threshold_hz && self.config.fatigue_threshold_hz > 0.0 {
                let excess = (rate_hz - self.config.fatigue_threshold_hz) / self.config.fatigue_threshold_hz;
                self.fatigue = (self.fatigue + 0.1 * excess).min(1.0);
            }
        }

        ReleaseOutcome {
            released,
            probability_used: p,
            ready_remaining: self.ready,
            depletion_level: self.depletion_level(),
        }
    }

    pub fn state(&self) -> VesicleState {
        VesicleState {
            ready: self.ready,
            recycling: self.recycling,
            reserve: self.reserve,
            fatigue: self.fatigue,
            recent_release_rate_hz: self.recent_release_rate_hz,
        }
    }

    /// Conserved total across all three pools — `recycling` already counts
    /// every in-flight vesicle regardless of which leg it's on, so this is
    /// not `ready + recycling + reserve + pending.len()` (§4.2 invariant,
    /// used by property tests to catch leaks).
    pub fn total_vesicles(&self) -> u32 {
        self.ready + self.recycling + self.reserve
    }

    pub fn reset(&mut self) {
        let now = Instant::now();
        self.ready = self.config.ready_pool_size;
        self.recycling = 0;
        self.reserve = self.config.reserve_pool_size;
        self.pending.clear();
        self.fatigue = 0.0;
        self.last_release = None;
        self.recent_release_rate_hz = 0.0;
        self.last_refill = now;
    }
}

fn duration_div(numerator: Duration, denominator: Duration) -> u64 {
    if denominator.is_zero() {
        return 0;
    }
    (numerator.as_secs_f64() / denominator.as_secs_f64()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> VesicleConfig {
        VesicleConfig::default()
    }

    #[test]
    fn starts_with_configured_pool_sizes() {
        let sys = VesicleSystem::new(cfg());
        let state = sys.state();
        assert_eq!(state.ready, cfg().ready_pool_size);
        assert_eq!(state.recycling, 0);
        assert_eq!(state.reserve, cfg().reserve_pool_size);
    }

    #[test]
    fn depletes_under_sustained_load() {
        let mut sys = VesicleSystem::new(cfg());
        let now = Instant::now();
        let mut releases = 0;
        for _ in 0..200 {
            let outcome = sys.try_release(1.0, now);
            if outcome.released {
                releases += 1;
            }
        }
        assert!(releases > 0);
        assert!(sys.state().ready <= cfg().ready_pool_size);
    }

    #[test]
    fn disabled_never_releases() {
        let mut c = cfg();
        c.enabled = false;
        let mut sys = VesicleSystem::new(c);
        let now = Instant::now();
        for _ in 0..50 {
            assert!(!sys.try_release(1.0, now).released);
        }
    }

    #[test]
    fn non_finite_calcium_falls_back_to_neutral() {
        let mut sys = VesicleSystem::new(cfg());
        let now = Instant::now();
        let outcome = sys.try_release(f64::NAN, now);
        assert!(outcome.probability_used.is_finite());
    }

    #[test]
    fn recycling_returns_vesicles_to_ready_after_delay() {
        let mut c = cfg();
        c.baseline_probability = 1.0;
        c.fast_recycling_time = Duration::from_millis(10);
        c.slow_recycling_time = Duration::from_millis(20);
        c.refill_time = Duration::from_millis(10);
        let mut sys = VesicleSystem::new(c);
        let t0 = Instant::now();
        let before = sys.state().ready;
        let outcome = sys.try_release(1.0, t0);
        assert!(outcome.released);
        assert_eq!(sys.state().ready, before - 1);

        // Longest possible path is slow_recycling_time + refill_time
        // (20ms + 10ms); give it a comfortable margin regardless of which
        // leg the stochastic fast/slow draw picked.
        let t1 = t0 + Duration::from_millis(50);
        sys.tick(t1);
        assert_eq!(sys.state().ready, before);
    }

    #[test]
    fn vesicle_count_is_conserved() {
        let mut sys = VesicleSystem::new(cfg());
        let total_before = sys.total_vesicles();
        let mut now = Instant::now();
        for _ in 0..50 {
            sys.try_release(1.0, now);
            now += Duration::from_millis(5);
        }
        let total_after = sys.total_vesicles();
        assert_eq!(total_before, total_after, "vesicles must not be created or destroyed");
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut sys = VesicleSystem::new(cfg());
        let now = Instant::now();
        for _ in 0..20 {
            sys.try_release(1.0, now);
        }
        sys.reset();
        let state = sys.state();
        assert_eq!(state.ready, cfg().ready_pool_size);
        assert_eq!(state.fatigue, 0.0);
    }
}
