//! Error types surfaced at the synapse boundary.

use thiserror::Error;

use crate::config::ConfigValidation;

/// Errors a [`crate::Synapse`] can return from its public operations.
///
/// None of these are ever raised as a panic; every fallible path in the
/// engine collapses into one of these variants instead.
#[derive(Debug, Error)]
pub enum SynapseError {
    /// The vesicle pool had nothing ready to release. Routine under load,
    /// not logged as an error by callers.
    #[error("vesicle pool depleted, nothing released")]
    VesicleDepleted,

    /// The synapse has already been pruned; it no longer accepts mutating
    /// operations.
    #[error("synapse '{0}' is pruned and no longer active")]
    SynapseInactive(String),

    /// The signal, or the effective (signal * weight) value derived from
    /// it, was not finite.
    #[error("invalid signal: {0}")]
    InvalidSignal(f64),

    /// Construction-time configuration violated a hard bound.
    #[error("invalid configuration: {0:?}")]
    InvalidConfig(ConfigValidation),

    /// A collaborator callback (delivery or scheduling) returned an error.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}

pub type Result<T> = std::result::Result<T, SynapseError>;
