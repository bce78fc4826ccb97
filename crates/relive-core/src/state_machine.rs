//! Per-unit recompilation state machine
//!
//! ```text
//! Pending ──► Succeeded
//!    │
//!    ├──────► Failed
//!    ▼
//! Retrying ─► Succeeded | Failed
//!    ▲  │
//!    └──┘
//! ```

use serde::Serialize;
use std::fmt;

/// Recompilation state of one unit within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// Queued, not yet attempted
    Pending,
    /// At least one attempt failed, re-queued
    Retrying,
    /// Recompiled and installed
    Succeeded,
    /// Retry budget exhausted
    Failed,
}

impl UnitState {
    /// `Succeeded` and `Failed` cannot be left
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Succeeded | UnitState::Failed)
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitState::Pending => "pending",
            UnitState::Retrying => "retrying",
            UnitState::Succeeded => "succeeded",
            UnitState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State machine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Move not allowed from the current state
    #[error("illegal unit state transition: {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: UnitState,
        /// Requested state
        to: UnitState,
    },
}

/// Validates a state transition.
///
/// # Errors
/// [`TransitionError::IllegalTransition`] if `to` is not reachable from `from`.
pub fn validate_transition(from: UnitState, to: UnitState) -> Result<(), TransitionError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(TransitionError::IllegalTransition { from, to })
    }
}

/// States reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: UnitState) -> Vec<UnitState> {
    use UnitState::{Failed, Pending, Retrying, Succeeded};
    match from {
        Pending | Retrying => vec![Succeeded, Retrying, Failed],
        Succeeded | Failed => vec![],
    }
}

fn allowed(from: UnitState, to: UnitState) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}
