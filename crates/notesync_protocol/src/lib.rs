//! # notesync protocol
//!
//! Note records and wire formats for revision-based note synchronization.
//!
//! This crate provides:
//! - `NoteRecord`, the transfer form of a note, and the `NoteSource` trait
//!   for anything that can be uploaded
//! - `NoteOperation` for buffered upload/delete changes
//! - The `<note-content>` envelope and its content-schema version
//! - Tag normalization and a shareable tag registry
//! - The canonical note document format
//! - JSON bodies of the web sync API
//! - `NoteTranslator`, mapping notes to records and records to documents
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod envelope;
mod error;
mod messages;
mod note;
mod operation;
mod tag;
mod translator;

pub use document::NoteDocument;
pub use envelope::{ContentEnvelope, ContentVersion};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    CollectionMetadata, ErrorResponse, NoteChangesRequest, NoteIndexResponse, NoteStub, NoteUpdate,
    NotesResponse, PrincipalInfo, ResourceRef, SyncLockInfo, UserResponse,
};
pub use note::{now, LocalNote, NoteRecord, NoteSource, Timestamp};
pub use operation::{NoteChange, NoteCommand, NoteOperation};
pub use tag::{normalize_tag_name, Tag, TagRegistry};
pub use translator::NoteTranslator;
