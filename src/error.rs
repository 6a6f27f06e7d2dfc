//! Error types shared by the physical models, the infrastructure tree and the
//! simulation loop.

use thiserror::Error;

/// Construction-time parameter violation.
///
/// Returned by every constructor that checks its inputs. Values are never
/// clamped into range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A numeric parameter is outside its allowed domain.
    #[error("invalid `{field}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        field: &'static str,
        /// Constraint that was violated.
        reason: String,
    },
    /// Two infrastructure nodes on the same level share an id.
    #[error("duplicate {kind} id `{id}`")]
    DuplicateId {
        /// Node kind (`transformer`, `charging station`, ...).
        kind: &'static str,
        /// Offending id.
        id: String,
    },
    /// The infrastructure tree has no charging point at all.
    #[error("infrastructure has no charging points")]
    NoChargingPoints,
    /// A per-step series does not cover the simulated horizon.
    #[error("`{series}` has {len} values but the horizon has {steps} steps")]
    SeriesTooShort {
        /// Series name.
        series: &'static str,
        /// Values provided.
        len: usize,
        /// Steps required.
        steps: usize,
    },
}

impl ValidationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}

/// Physical-limit violation raised while a run is in progress.
///
/// Any of these aborts the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// A storage system was asked to discharge more than it can deliver.
    #[error("cannot discharge {requested_kw:.3} kW, at most {limit_kw:.3} kW available")]
    DischargeOutOfLimits {
        /// Requested discharge power (kW).
        requested_kw: f64,
        /// Largest feasible discharge power (kW).
        limit_kw: f64,
    },
    /// State of charge left `[min_soc, 1]` after a mutation.
    #[error("state of charge {soc} outside [{min_soc}, 1]")]
    SocOutOfBounds {
        /// Offending state of charge.
        soc: f64,
        /// Lower bound of the battery.
        min_soc: f64,
    },
    /// A scheduling policy produced an allocation above a node's ceiling.
    #[error("allocation of {assigned_kw:.3} kW at {node} exceeds its {limit_kw:.3} kW limit")]
    CapacityExceeded {
        /// Node description, e.g. `charging station "cs1"`.
        node: String,
        /// Total power assigned below the node (kW).
        assigned_kw: f64,
        /// Node ceiling (kW).
        limit_kw: f64,
    },
    /// A storage system failed at a given step.
    #[error("storage `{storage}` at step {step}: {source}")]
    Storage {
        /// Storage system id.
        storage: String,
        /// Step index.
        step: usize,
        /// Underlying failure.
        #[source]
        source: Box<SimError>,
    },
}
