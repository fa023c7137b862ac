//! Error types for the sync server.

use notesync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Authorization failed.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// No such user.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// The update would not produce the revision the client expected.
    #[error("revision conflict: server expects {expected}, request says {actual}")]
    RevisionConflict {
        /// Revision the update would produce.
        expected: i64,
        /// Revision named by the request.
        actual: i64,
    },

    /// No such resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed request or response body.
    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::Codec(_) => 400,
            ServerError::AuthenticationFailed(_) => 401,
            ServerError::NotAuthorized(_) => 403,
            ServerError::UnknownUser(_) | ServerError::NotFound(_) => 404,
            ServerError::RevisionConflict { .. } => 409,
            ServerError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}
