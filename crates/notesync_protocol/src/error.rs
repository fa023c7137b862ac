//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding protocol messages.
///
/// Parsing a note's content envelope never produces an error: a missing
/// or malformed envelope yields default values instead.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field required for the message kind was absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),
}
