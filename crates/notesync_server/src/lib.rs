//! # notesync server
//!
//! Reference sync server for the web note-sync API.
//!
//! This crate provides:
//! - Endpoints for the user resource and the notes resource
//! - An in-memory, revisioned note store per user
//! - Authentication (HMAC-SHA256 tokens bound to a user)
//! - Revision conflict detection on updates
//!
//! # Architecture
//!
//! The server keeps, for every registered user:
//! - The live notes, each stamped with the revision of its last change
//! - The latest revision, bumped once per non-empty update
//! - A collection identity
//!
//! # Authentication
//!
//! Authentication is optional but recommended for production:
//!
//! ```rust
//! use notesync_server::{NoteSyncServer, ServerConfig};
//!
//! let secret = b"my-secure-secret-32-bytes-long!".to_vec();
//! let server = NoteSyncServer::new(ServerConfig::default().with_auth(secret));
//! server.create_user("sandy").unwrap();
//!
//! // Clients send it as `Authorization: Bearer {token}`
//! let token = server.create_token("sandy").unwrap();
//! # assert!(!token.is_empty());
//! ```
//!
//! # Protocol
//!
//! 1. Client reads `/api/1.0/{user}` for the latest revision and notes link
//! 2. Client fetches notes changed since its last known revision
//! 3. Client sends its changes in one `PUT`, naming the revision it expects
//! 4. Server rejects the update with 409 if another client got there first

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod server;
mod store;

pub use auth::{AuthConfig, TokenValidator};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::NoteSyncServer;
pub use store::{NoteStore, UserInfo};
