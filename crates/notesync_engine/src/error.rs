//! Error types for the sync engine.

use notesync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The principal is unknown, unauthenticated or forbidden.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The remote revision moved between `begin` and `commit`.
    #[error("revision conflict: expected {expected}, remote is at {actual}")]
    Conflict {
        /// Revision observed when the transaction began.
        expected: i64,
        /// Revision observed at commit.
        actual: i64,
    },

    /// The operation is not supported by this sync target.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The session is not in a state that allows the operation.
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        /// Current state.
        state: String,
        /// Attempted operation.
        operation: String,
    },

    /// The remote collection rejected the update.
    #[error("update rejected: {0}")]
    Validation(String),

    /// Protocol error (unexpected response).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Encoding or decoding a message failed.
    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the caller may retry the failed operation.
    ///
    /// The session itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }
}
