//! Error types for the reload engine
//!
//! Only call-level problems are returned as [`ReloadError`]. A unit whose
//! recompilation keeps failing is recorded as a [`RecompileFailure`] in the
//! report; missing successors, rejected retypes and units that refuse
//! introspection during the scan are journaled and never escalate.

use relive_object::IntrospectError;
use serde::Serialize;
use std::fmt;

/// Errors that abort a reload or wrap call before anything is changed
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    /// Target name is not in the registry
    #[error("unit '{0}' is not loaded")]
    UnknownUnit(String),

    /// Target unit cannot be snapshotted
    #[error("cannot snapshot target: {0}")]
    Introspect(#[from] IntrospectError),

    /// Another call is running on the same reloader
    #[error("a reload is already in progress on this reloader")]
    Busy,

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed into a config
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A unit must be attempted at least once
    #[error("retry budget must be at least 1")]
    ZeroRetryBudget,

    /// A journal that keeps nothing is a misconfiguration
    #[error("journal capacity must be at least 1")]
    ZeroJournalCapacity,
}

/// A unit that exhausted its retry budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecompileFailure {
    /// Unit name
    pub unit: String,
    /// Attempts made
    pub attempts: u32,
    /// Error detail from the last attempt, with its cause chain
    pub detail: String,
}

impl fmt::Display for RecompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to reload {} after {} attempt(s): {}",
            self.unit, self.attempts, self.detail
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_names_unit() {
        let failure = RecompileFailure {
            unit: "b".to_string(),
            attempts: 10,
            detail: "syntax error".to_string(),
        };
        assert_eq!(
            failure.to_string(),
            "failed to reload b after 10 attempt(s): syntax error"
        );
    }

    #[test]
    fn introspect_errors_convert() {
        let err: ReloadError = IntrospectError::Busy("b".to_string()).into();
        assert!(matches!(err, ReloadError::Introspect(_)));
    }
}
