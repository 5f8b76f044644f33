//! Error types for proxy construction and dispatch
//!
//! Failures raised by an interceptor are not represented here: they travel
//! through dispatch as the interceptor's own `anyhow::Error`, untouched.

/// Result type for factory, resolution and marshaling operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Proxy mechanism error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProxyError {
    /// Factory options are incomplete (e.g. no interceptor supplied)
    #[error("Configuration error: {reason}")]
    Configuration {
        /// What is missing or invalid
        reason: String,
    },

    /// A method's parameter or return type could not be resolved
    #[error("Resolution error in {interface}::{method}: {reason}")]
    Resolution {
        /// Interface being synthesized
        interface: String,
        /// Method whose metadata failed to resolve
        method: String,
        /// Unresolved reference and why
        reason: String,
    },

    /// The interface has no usable construction path (non-method members)
    #[error("Construction error for {interface}: {reason}")]
    Construction {
        /// Interface being synthesized
        interface: String,
        /// Offending member
        reason: String,
    },

    /// A name was registered twice with conflicting definitions
    #[error("Duplicate registration: '{name}' is already registered with a different definition")]
    DuplicateRegistration {
        /// Registered name
        name: String,
    },

    /// No method with the given name (and signature) exists
    #[error("Method not found: {interface}::{method}")]
    MethodNotFound {
        /// Interface searched
        interface: String,
        /// Requested method name or signature
        method: String,
    },

    /// Several overloads match a dynamic call
    #[error("Ambiguous call to {interface}::{method}: {candidates} overloads match")]
    AmbiguousMethod {
        /// Interface searched
        interface: String,
        /// Requested method name
        method: String,
        /// Number of matching overloads
        candidates: usize,
    },

    /// Wrong number of arguments for a dynamic call
    #[error("Method '{method}' expects {expected} arguments, got {got}")]
    ArityMismatch {
        /// Method signature
        method: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// A value cannot be converted to the requested type without loss
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual value type or value
        got: String,
    },
}

impl ProxyError {
    pub(crate) fn mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        ProxyError::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}
