//! Structured error taxonomy (spec §7).
//!
//! Action-level failures never reach this type: a failed precondition inside
//! the action dispatcher is a local no-op plus an `actionInvalid` counter
//! bump (see `action::dispatch`). `SimError` is reserved for the control-API
//! surface and the FFI error-query slot, where a caller needs to distinguish
//! "nothing happened" from "you asked for something that cannot exist."

use bevy_ecs::prelude::*;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SimError {
    #[error("precondition failed: {0}")]
    PreconditionFail(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl SimError {
    pub fn kind(&self) -> &'static str {
        match self {
            SimError::PreconditionFail(_) => "precondition_fail",
            SimError::NotFound(_) => "not_found",
            SimError::CapacityExceeded(_) => "capacity_exceeded",
            SimError::InvariantViolation(_) => "invariant_violation",
        }
    }
}

/// Holds the most recent control-API error for FFI polling.
///
/// Cleared explicitly by the caller via `clear_error`; overwritten by the
/// next failing call. `fatal` is set only for `InvariantViolation` and is
/// checked by `SimWorld::step` before advancing any further ticks.
#[derive(Resource, Debug, Default)]
pub struct ErrorSlot {
    last: Option<SimError>,
    pub fatal: Option<SimError>,
}

impl ErrorSlot {
    pub fn set(&mut self, err: SimError) {
        if matches!(err, SimError::InvariantViolation(_)) {
            tracing::error!(%err, "invariant violation, halting episode");
            self.fatal = Some(err.clone());
        }
        self.last = Some(err);
    }

    pub fn has_error(&self) -> bool {
        self.last.is_some()
    }

    pub fn get_error_kind(&self) -> Option<&'static str> {
        self.last.as_ref().map(SimError::kind)
    }

    pub fn get_error_message(&self) -> Option<String> {
        self.last.as_ref().map(|e| e.to_string())
    }

    pub fn clear_error(&mut self) {
        self.last = None;
    }
}

pub type SimResult<T> = Result<T, SimError>;
