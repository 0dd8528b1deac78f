//! Error types for the replicated log node.

use thiserror::Error;

/// Result type alias for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors a node can raise. The HTTP layer maps `ModeViolation`, `ReadOnly`
/// and `Validation` straight to 405 responses; `Transport` never reaches a
/// client and only drives replication/heartbeat retries; `Internal` becomes
/// a 500.
#[derive(Error, Debug)]
pub enum Error {
    #[error("operation not permitted in this node's mode: {0}")]
    ModeViolation(String),

    #[error("primary is read-only: quorum of secondaries is not reachable")]
    ReadOnly,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("transport error talking to {address}: {reason}")]
    Transport { address: String, reason: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration file: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors whose message is safe (and meaningful) to hand straight to an
    /// HTTP client, as opposed to transport failures which only ever drive
    /// internal retry/backoff bookkeeping.
    pub fn is_client_facing(&self) -> bool {
        matches!(
            self,
            Error::ModeViolation(_) | Error::ReadOnly | Error::Validation(_)
        )
    }
}
