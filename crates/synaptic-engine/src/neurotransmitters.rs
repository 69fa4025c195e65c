//! Neurotransmitter identity carried on messages and configuration.

use serde::{Deserialize, Serialize};

/// Neurotransmitter released by a synapse, carried on every delivered
/// [`crate::callbacks::Message`] (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeurotransmitterType {
    Glutamate,
    Gaba,
    Dopamine,
    Serotonin,
    Acetylcholine,
    Norepinephrine,
    Histamine,
}

impl NeurotransmitterType {
    /// Whether this ligand is conventionally excitatory. Informational
    /// only — the engine itself is agnostic to sign and lets `weight`
    /// carry it.
    pub fn is_excitatory(self) -> bool {
        !matches!(self, NeurotransmitterType::Gaba)
    }
}

impl Default for NeurotransmitterType {
    fn default() -> Self {
        NeurotransmitterType::Glutamate
    }
}
