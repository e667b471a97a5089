//! Error types for megagate.

use thiserror::Error;

use crate::storage::StorageError;

/// Common error type for megagate.
#[derive(Error, Debug)]
pub enum GateError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure reported by the remote storage client.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for megagate operations.
pub type Result<T> = std::result::Result<T, GateError>;
