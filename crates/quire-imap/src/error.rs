//! Error types for the IMAP server core.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while serving a connection.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the client connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Command parsing error.
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Framing violation the connection cannot recover from.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Mail store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
