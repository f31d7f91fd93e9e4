//! RPC-specific error types.

use alloy_transport::{TransportError, TransportErrorKind};
use thiserror::Error;

/// Errors returned by the chain and rollup readers.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Transport error from alloy.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Block not found.
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    /// Header not found.
    #[error("Header not found: {0}")]
    HeaderNotFound(String),

    /// Witness not found.
    #[error("Witness not found: {0}")]
    WitnessNotFound(String),

    /// The node answered with an error or an unexpected payload.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request timeout.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RpcError {
    /// Returns true if this error is transient and the operation should be retried.
    ///
    /// Only transport-level failures are retried. A JSON-RPC error response
    /// from the node is an answer, not a transient fault.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_) | Self::Connection(_))
    }
}

impl From<TransportError> for RpcError {
    fn from(err: TransportError) -> Self {
        match &err {
            TransportError::ErrorResp(_) => Self::InvalidResponse(err.to_string()),
            TransportError::DeserError { .. } => Self::Serialization(err.to_string()),
            TransportError::Transport(TransportErrorKind::BackendGone) => {
                Self::Connection(err.to_string())
            }
            _ => Self::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;
