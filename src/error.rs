//! Error types for the wiring layer.

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by wires, properties and the introspection collaborator.
///
/// Nothing in this layer retries: every variant is a deterministic function of
/// the definition, the receiver and the arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A behavior name (or any other attribute) could not be resolved on a wire.
    ///
    /// Missing behaviors and misspelled names are reported the same way.
    #[error("AttributeError: '{owner}' object has no attribute '{name}'")]
    AttributeError { owner: String, name: String },

    /// A behavior was resolved to a plain value but invoked as a function.
    #[error("TypeError: behavior '{0}' is not callable")]
    NotCallable(String),

    /// The call does not satisfy the wrapped callable's declared signature.
    #[error("TypeError: {0}")]
    SignatureError(String),

    /// The receiver a wire was bound to no longer exists.
    #[error("receiver of '{0}' was dropped")]
    ReceiverDropped(String),

    /// Invalid decoration request or configuration value.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Failure raised by a wrapped callable or an attached behavior.
    #[error("{0}")]
    CallableError(String),
}

impl Error {
    pub(crate) fn attribute(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Error::AttributeError {
            owner: owner.into(),
            name: name.into(),
        }
    }
}
