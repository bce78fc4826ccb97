//! Error types for the object model
//!
//! - [`CallError`]: invoking a callable or resolving a global failed
//! - [`RetypeError`]: an instance refused a new dynamic type
//! - [`IntrospectError`]: a unit refused to expose its export table

/// Errors raised while calling into units
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// Global name missing from the calling unit (or from a unit reached
    /// through qualified access)
    #[error("name '{name}' is not defined in unit '{unit}'")]
    UndefinedGlobal { unit: String, name: String },

    /// The callable's home unit was dropped
    #[error("home unit of '{0}' is no longer loaded")]
    HomeUnloaded(String),

    /// Value cannot be called
    #[error("'{0}' is not callable")]
    NotCallable(String),

    /// Member lookup failed on a type or instance
    #[error("'{ty}' has no member '{member}'")]
    NoSuchMember { ty: String, member: String },

    /// Argument or receiver had the wrong kind
    #[error("expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Error raised by user code
    #[error("{0}")]
    Raised(String),
}

impl CallError {
    /// Error raised by a callable body
    #[inline]
    pub fn raised(message: impl Into<String>) -> Self {
        Self::Raised(message.into())
    }
}

/// Why an instance could not be retargeted to a new type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetypeError {
    /// One side is a native type that forbids dynamic retyping
    #[error("type '{0}' is native and does not support retyping")]
    Native(String),

    /// Storage layouts differ
    #[error("layout of '{from}' is incompatible with '{to}'")]
    LayoutMismatch { from: String, to: String },
}

/// Why a unit's export table could not be read
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntrospectError {
    /// Host proxy unit that refuses introspection
    #[error("unit '{unit}' is sealed: {reason}")]
    Sealed { unit: String, reason: String },

    /// Export table is locked for writing
    #[error("export table of unit '{0}' is locked")]
    Busy(String),
}
