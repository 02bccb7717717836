//! Error types for the IoC container

use thiserror::Error;

/// Result type alias for container operations.
pub type DiResult<T> = Result<T, DiError>;

/// Errors that can occur during container operations.
///
/// Missing registrations are not errors: query-shaped APIs return
/// `Option` and log the miss. These variants cover programmer misuse,
/// which fails loudly.
#[derive(Error, Debug)]
pub enum DiError {
    /// The token cannot be constructed: not a registered concrete class.
    #[error("Invalid construction target: {target}")]
    InvalidTarget { target: String },

    /// A method named in an `invoke` call does not exist on the target.
    #[error("Method not found: {method} on {target}")]
    MethodNotFound { target: String, method: String },

    /// `invoke` could not resolve its target instance.
    #[error("Invoke target not resolved: {token}")]
    TargetNotResolved { token: String },

    /// A constructor or factory reported a failure.
    #[error("Failed to construct {target}: {reason}")]
    ConstructionFailed { target: String, reason: String },

    /// Configuration error
    #[cfg(feature = "config")]
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("Container error: {0}")]
    Other(String),
}
