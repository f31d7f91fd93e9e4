//! Error types for the proposer.

use thiserror::Error;

use crate::rpc::RpcError;

/// Main error type for the proposer.
#[derive(Debug, Error)]
pub enum ProposerError {
    /// RPC connection error.
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// Proof generation or aggregation error.
    #[error("Prover error: {0}")]
    Prover(String),

    /// Contract interaction error.
    #[error("Contract error: {0}")]
    Contract(String),

    /// Transaction signing, broadcast or confirmation error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A remote call did not complete within its deadline.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// The operation was aborted because the driver is stopping.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<eyre::Error> for ProposerError {
    fn from(err: eyre::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type alias for proposer operations.
pub type ProposerResult<T> = Result<T, ProposerError>;

/// Lifecycle misuse of the driver handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DriverError {
    /// `start` was called while the submission loop is running.
    #[error("proposer is already running")]
    AlreadyRunning,

    /// `stop` was called while the submission loop is not running.
    #[error("proposer is not running")]
    NotRunning,

    /// The submission loop task panicked; the driver can no longer be started.
    #[error("proposer driver crashed")]
    Crashed,
}
