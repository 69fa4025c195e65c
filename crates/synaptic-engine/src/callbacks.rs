//! The callback set borrowed by a synapse from its enclosing matrix/neuron
//! collaborator (§6). The core never owns or constructs a neuron, timer,
//! or routing table — it only calls back into one.

use std::time::{Duration, Instant};

use crate::activity::PlasticityEventRecord;
use crate::neurotransmitters::NeurotransmitterType;

/// The envelope delivered through `deliver_message`/`schedule_delayed_delivery`.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub source_id: String,
    pub target_id: String,
    pub synapse_id: String,
    /// `signal * weight_at_release`, always finite.
    pub value: f64,
    pub timestamp: Instant,
    pub neurotransmitter_type: NeurotransmitterType,
}

/// Thin interface to the collaborator that owns neurons, the routing
/// table, and timers. Borrowed for the lifetime of the synapse (§3); the
/// engine never spawns threads or holds its own timers (§5).
///
/// Implementors must not block for long or perform blocking I/O on the
/// calling thread — they run outside the synapse's critical section but
/// still on the caller's thread (§5).
pub trait SynapseCallbacks: Send + Sync {
    /// Current presynaptic calcium level. Must return a finite value
    /// `>= 0`; the vesicle system treats anything else as `1.0`.
    fn get_calcium_level(&self) -> f64 {
        1.0
    }

    /// Total transmission delay for this synapse. The engine clamps the
    /// result to `[0, MAX_DELAY_DURATION]` regardless of what is returned.
    fn get_transmission_delay(&self, synapse_id: &str) -> Duration;

    /// Invoked synchronously for zero-delay transmissions.
    fn deliver_message(&self, msg: &Message) -> Result<(), String>;

    /// Invoked for positive-delay transmissions; the collaborator owns the
    /// timer and eventually delivers `msg` on its own.
    fn schedule_delayed_delivery(&self, msg: Message, delay: Duration) -> Result<(), String>;

    /// Optional hook fired after a successful vesicle release.
    fn release_neurotransmitter(&self, _ligand: NeurotransmitterType, _concentration: f64) -> Result<(), String> {
        Ok(())
    }

    /// Optional, fire-and-forget notification of a plasticity event.
    fn report_plasticity_event(&self, _event: &PlasticityEventRecord) {}
}

/// Reusable recording test double, used by this crate's own tests and
/// available to downstream integration tests and doc examples.
pub mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Records every call it receives; never fails unless configured to.
    #[derive(Default)]
    pub struct RecordingCallbacks {
        pub calcium_level: Mutex<f64>,
        pub transmission_delay: Mutex<Duration>,
        pub delivered: Mutex<Vec<Message>>,
        pub scheduled: Mutex<Vec<(Message, Duration)>>,
        pub fail_delivery: Mutex<bool>,
    }

    impl RecordingCallbacks {
        pub fn new(delay: Duration) -> Self {
            Self {
                calcium_level: Mutex::new(1.0),
                transmission_delay: Mutex::new(delay),
                delivered: Mutex::new(Vec::new()),
                scheduled: Mutex::new(Vec::new()),
                fail_delivery: Mutex::new(false),
            }
        }

        pub fn delivered_count(&self) -> usize {
            self.delivered.lock().len()
        }

        pub fn set_calcium_level(&self, level: f64) {
            *self.calcium_level.lock() = level;
        }
    }

    impl SynapseCallbacks for RecordingCallbacks {
        fn get_calcium_level(&self) -> f64 {
            *self.calcium_level.lock()
        }

        fn get_transmission_delay(&self, _synapse_id: &str) -> Duration {
            *self.transmission_delay.lock()
        }

        fn deliver_message(&self, msg: &Message) -> Result<(), String> {
            if *self.fail_delivery.lock() {
                return Err("delivery refused by test double".to_string());
            }
            self.delivered.lock().push(msg.clone());
            Ok(())
        }

        fn schedule_delayed_delivery(&self, msg: Message, delay: Duration) -> Result<(), String> {
            if *self.fail_delivery.lock() {
                return Err("scheduling refused by test double".to_string());
            }
            self.scheduled.lock().push((msg, delay));
            Ok(())
        }
    }
}
