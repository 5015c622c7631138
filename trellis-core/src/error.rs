//! Error types for the Trellis core.
//!
//! Only API misuse is reported through [`Error`]. Expected runtime outcomes
//! (a command that cannot execute, a property without errors, removing
//! something that was never added) are plain `false`/empty return values.

use thiserror::Error;

/// Errors raised by the notification, command and validation layers.
#[derive(Debug, Error)]
pub enum Error {
    /// A name or edge passed to a public API is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A property selector names a property the type never declared.
    #[error("type `{type_name}` declares no property named `{property}`")]
    UnknownProperty {
        type_name: &'static str,
        property: String,
    },

    /// Fire-and-forget execution was requested outside a tokio runtime.
    #[error("no tokio runtime is available to run the command")]
    NoRuntime,

    /// An asynchronous execution hook failed.
    #[error("command execution failed: {0}")]
    Execution(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Wrap any error returned by a command hook.
    pub fn execution<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Execution(err.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reject empty or whitespace-only property names.
pub(crate) fn check_name(name: &str, what: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid(format!("{what} must not be empty")));
    }
    Ok(())
}
