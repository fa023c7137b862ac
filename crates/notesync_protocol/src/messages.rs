//! Protocol messages: collection metadata, note updates and the JSON bodies
//! of the web sync API.

use crate::error::ProtocolResult;
use crate::note::NoteRecord;
use crate::operation::{NoteChange, NoteOperation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A link to an API resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceRef {
    /// URL for API clients.
    pub api_ref: String,
    /// URL for browsers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl ResourceRef {
    /// Creates a reference with only an API URL.
    pub fn api(api_ref: impl Into<String>) -> Self {
        Self {
            api_ref: api_ref.into(),
            href: None,
        }
    }
}

/// Identity of the remote user owning a note collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalInfo {
    /// Login name.
    pub user_name: String,
    /// Given name, if published.
    pub first_name: Option<String>,
    /// Family name, if published.
    pub last_name: Option<String>,
    /// URL of the user's notes resource.
    pub notes_ref: String,
    /// Identity of the collection; changes when the server wipes it.
    pub current_sync_guid: String,
}

/// Snapshot of a remote collection's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMetadata {
    /// Highest revision stored in the collection.
    pub latest_revision: i64,
    /// Owner of the collection.
    pub principal: PrincipalInfo,
}

/// A changed note, ready for the client.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteUpdate {
    /// Fully serialized note document.
    pub document: String,
    /// Note title.
    pub title: String,
    /// Note identifier.
    pub guid: String,
    /// Revision at which this version was stored.
    pub revision: i64,
}

impl NoteUpdate {
    /// Creates a new update.
    pub fn new(
        document: impl Into<String>,
        title: impl Into<String>,
        guid: impl Into<String>,
        revision: i64,
    ) -> Self {
        Self {
            document: document.into(),
            title: title.into(),
            guid: guid.into(),
            revision,
        }
    }
}

/// Advisory lock held on a sync target.
///
/// The web sync protocol takes no server-side lock, so no session ever
/// reports one; the type exists for targets that do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLockInfo {
    /// Client holding the lock.
    pub client_id: String,
    /// Transaction the lock belongs to.
    pub transaction_id: String,
    /// Number of times the lock was renewed.
    pub renew_count: u32,
    /// Lock lifetime.
    pub duration: Duration,
    /// Revision the holder is committing.
    pub revision: i64,
}

/// Body of `GET /api/1.0/{user}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserResponse {
    /// Login name.
    pub user_name: String,
    /// Given name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Link to the notes resource.
    pub notes_ref: ResourceRef,
    /// Highest stored revision.
    pub latest_sync_revision: i64,
    /// Collection identity.
    pub current_sync_guid: String,
}

impl UserResponse {
    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl From<UserResponse> for CollectionMetadata {
    fn from(user: UserResponse) -> Self {
        CollectionMetadata {
            latest_revision: user.latest_sync_revision,
            principal: PrincipalInfo {
                user_name: user.user_name,
                first_name: user.first_name,
                last_name: user.last_name,
                notes_ref: user.notes_ref.api_ref,
                current_sync_guid: user.current_sync_guid,
            },
        }
    }
}

/// Body of `GET {notes}?include_notes=true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NotesResponse {
    /// Highest stored revision.
    pub latest_sync_revision: i64,
    /// Full notes.
    #[serde(default)]
    pub notes: Vec<NoteRecord>,
}

impl NotesResponse {
    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Reference to a note without its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NoteStub {
    /// Note identifier.
    pub guid: String,
    /// Note title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Link to the note resource.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRef>,
}

/// Body of `GET {notes}` without content, and of update responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NoteIndexResponse {
    /// Highest stored revision.
    pub latest_sync_revision: i64,
    /// Note references.
    #[serde(default)]
    pub notes: Vec<NoteStub>,
}

impl NoteIndexResponse {
    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Body of `PUT {notes}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NoteChangesRequest {
    /// Revision the update will produce. When present the server rejects
    /// the update unless it equals its current revision plus one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_sync_revision: Option<i64>,
    /// Changes, applied in order.
    pub note_changes: Vec<NoteChange>,
}

impl NoteChangesRequest {
    /// Builds a request from buffered operations.
    pub fn from_operations(expected_revision: Option<i64>, operations: &[NoteOperation]) -> Self {
        Self {
            latest_sync_revision: expected_revision,
            note_changes: operations.iter().map(NoteOperation::to_change).collect(),
        }
    }

    /// Converts the changes back into operations.
    pub fn into_operations(self) -> ProtocolResult<Vec<NoteOperation>> {
        self.note_changes
            .into_iter()
            .map(NoteChange::into_operation)
            .collect()
    }

    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ErrorResponse {
    /// Human-readable reason.
    pub error: String,
    /// The server's revision, reported on revision conflicts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_sync_revision: Option<i64>,
}

impl ErrorResponse {
    /// Creates an error body.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            latest_sync_revision: None,
        }
    }

    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::now;

    #[test]
    fn user_response_to_metadata() {
        let json = br#"{
            "user-name": "sandy",
            "first-name": "Sandy",
            "notes-ref": { "api-ref": "https://notes.example.com/api/1.0/sandy/notes" },
            "latest-sync-revision": 456,
            "current-sync-guid": "ff2e91b2-1234"
        }"#;

        let metadata: CollectionMetadata = UserResponse::decode(json).unwrap().into();
        assert_eq!(metadata.latest_revision, 456);
        assert_eq!(metadata.principal.user_name, "sandy");
        assert_eq!(metadata.principal.first_name.as_deref(), Some("Sandy"));
        assert!(metadata.principal.last_name.is_none());
        assert!(metadata.principal.notes_ref.ends_with("/sandy/notes"));
    }

    #[test]
    fn changes_request_layout() {
        let upload = NoteRecord::new("n1", "One", now());
        let ops = vec![NoteOperation::Upload(upload), NoteOperation::delete("x")];
        let request = NoteChangesRequest::from_operations(Some(8), &ops);

        let json: serde_json::Value = serde_json::from_slice(&request.encode().unwrap()).unwrap();
        assert_eq!(json["latest-sync-revision"], 8);
        assert_eq!(json["note-changes"][0]["guid"], "n1");
        assert_eq!(json["note-changes"][1]["command"], "delete");

        let decoded = NoteChangesRequest::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded.into_operations().unwrap(), ops);
    }

    #[test]
    fn stub_ref_field_name() {
        let stub = NoteStub {
            guid: "g".into(),
            title: None,
            resource: Some(ResourceRef::api("https://x/notes/g")),
        };
        let json = serde_json::to_value(&stub).unwrap();
        assert_eq!(json["ref"]["api-ref"], "https://x/notes/g");
    }
}
