//! Error types for remote component operations

use thiserror::Error;

/// Errors that can occur while creating or invoking remote components
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    /// The remote environment refused the operation
    #[error("remote rejected {operation}: {reason}")]
    Rejected { operation: String, reason: String },

    /// The operation would cost more than its resource limit allows
    #[error("{operation} needs {required} resource units but the limit is {limit}")]
    ResourceLimitExceeded {
        operation: String,
        required: u64,
        limit: u64,
    },

    /// No component exists at the given address
    #[error("no component at {0}")]
    UnknownComponent(String),

    /// The caller does not hold control of the component
    #[error("{caller} does not control {address}")]
    NotOwner { caller: String, address: String },

    /// Invalid address format
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// HTTP or connection failure talking to the relay
    #[error("transport error: {0}")]
    Transport(String),

    /// The relay answered with something we could not interpret
    #[error("malformed relay response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        ChainError::Transport(err.to_string())
    }
}

/// Result type for remote component operations
pub type ChainResult<T> = std::result::Result<T, ChainError>;
