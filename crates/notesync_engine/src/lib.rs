//! # notesync engine
//!
//! Sync sessions against a remote note collection.
//!
//! This crate provides:
//! - Sync session state machine (idle → open → committing)
//! - Buffered upload/delete operations committed as one update
//! - Read-through snapshot of the remote collection's metadata
//! - Revision-based change listing
//! - HTTP access to the web sync API, with an abstract HTTP client
//! - A mock remote collection for tests
//!
//! ## Architecture
//!
//! A session batches changes locally and submits them in one request:
//! 1. `begin` refreshes the snapshot and records the remote revision
//! 2. `queue_upload`/`queue_delete` append to the pending buffer
//! 3. `commit` refreshes again, checks staleness and sends the buffer
//!
//! ## Key Invariants
//!
//! - One transaction at a time per session
//! - Operations are submitted in the order they were queued
//! - Cancel never contacts the remote
//! - A failed commit keeps its buffer until the next `begin` or `cancel`
//! - The session never retries on its own

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod http;
mod remote;
mod session;
mod snapshot;

pub use config::{SessionConfig, StaleRevisionPolicy};
pub use error::{SyncError, SyncResult};
pub use http::{
    HttpClient, HttpMethod, HttpRemoteCollection, HttpRequest, HttpResponse, LoopbackClient,
    LoopbackServer, DEFAULT_API_VERSION,
};
pub use remote::{MockFailure, MockRemoteCollection, RemoteCollection};
pub use session::{SessionState, SessionStats, SyncSession, SyncTarget};
pub use snapshot::RemoteSnapshot;
