//! Error types for Grape Core

use thiserror::Error;

/// Result type alias using Grape Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the analytical engine.
///
/// None of these are retryable: a query either runs to its fixpoint or the
/// whole distributed query is aborted.
#[derive(Error, Debug)]
pub enum Error {
    /// Unsupported strategy/type combination at dispatch time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unknown aggregate kind for a value type
    #[error("Construction error: {0}")]
    Construction(String),

    /// Fragment layout errors (unknown vertex, bad label, size mismatch)
    #[error("Fragment error: {0}")]
    Fragment(String),

    /// Malformed or out-of-order message on the wire
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Channel failures between workers
    #[error("Transport error: {0}")]
    Transport(String),

    /// Failure raised by application code during PEval/IncEval
    #[error("App error: {0}")]
    App(String),

    /// Another worker of the group failed and aborted the query
    #[error("Query aborted: {0}")]
    Aborted(String),

    /// Buffer value type does not match the requested type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type
        expected: String,
        /// Actual type
        actual: String,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a construction error
    pub fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    /// Create a fragment error
    pub fn fragment(msg: impl Into<String>) -> Self {
        Self::Fragment(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an app error
    pub fn app(msg: impl Into<String>) -> Self {
        Self::App(msg.into())
    }

    /// Create an aborted error
    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::Aborted(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error was caused by a peer aborting the group rather
    /// than by this worker.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}
