//! Buffered note operations and their wire form.

use crate::envelope::ContentVersion;
use crate::error::{ProtocolError, ProtocolResult};
use crate::note::{NoteRecord, Timestamp};
use serde::{Deserialize, Serialize};

/// Command carried by a note change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteCommand {
    /// Create or replace the note.
    Upload,
    /// Remove the note.
    Delete,
}

impl NoteCommand {
    /// Returns the wire name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteCommand::Upload => "upload",
            NoteCommand::Delete => "delete",
        }
    }
}

/// A pending change to the remote collection.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteOperation {
    /// Upload the full note.
    Upload(NoteRecord),
    /// Delete the note with this identifier.
    Delete {
        /// Identifier of the note to delete.
        guid: String,
    },
}

impl NoteOperation {
    /// Creates a delete operation.
    pub fn delete(guid: impl Into<String>) -> Self {
        NoteOperation::Delete { guid: guid.into() }
    }

    /// Returns the identifier of the affected note.
    pub fn guid(&self) -> &str {
        match self {
            NoteOperation::Upload(record) => record.guid(),
            NoteOperation::Delete { guid } => guid,
        }
    }

    /// Returns the command of this operation.
    pub fn command(&self) -> NoteCommand {
        match self {
            NoteOperation::Upload(_) => NoteCommand::Upload,
            NoteOperation::Delete { .. } => NoteCommand::Delete,
        }
    }

    /// Converts to the wire change entry.
    pub fn to_change(&self) -> NoteChange {
        match self {
            NoteOperation::Upload(record) => NoteChange {
                guid: record.guid().to_string(),
                command: None,
                title: Some(record.title.clone()),
                tags: Some(record.tags.clone()),
                create_date: Some(record.create_date),
                last_change_date: Some(record.last_change_date),
                last_metadata_change_date: Some(record.last_metadata_change_date),
                open_on_startup: Some(record.open_on_startup),
                note_content: Some(record.note_content.clone()),
                note_content_version: Some(record.note_content_version),
            },
            NoteOperation::Delete { guid } => NoteChange::delete(guid.clone()),
        }
    }
}

/// One entry of the `note-changes` list in an update request.
///
/// Deletes carry only `guid` and `command`; uploads carry the full note and
/// may omit the command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NoteChange {
    /// Note identifier.
    pub guid: String,
    /// Change command; absent means upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<NoteCommand>,
    /// Note title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Tag names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<Timestamp>,
    /// Time of the last content change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_change_date: Option<Timestamp>,
    /// Time of the last metadata change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_metadata_change_date: Option<Timestamp>,
    /// Whether the note opens on startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_on_startup: Option<bool>,
    /// Inner content body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_content: Option<String>,
    /// Content-schema version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_content_version: Option<ContentVersion>,
}

impl NoteChange {
    /// Creates a delete change.
    pub fn delete(guid: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            command: Some(NoteCommand::Delete),
            title: None,
            tags: None,
            create_date: None,
            last_change_date: None,
            last_metadata_change_date: None,
            open_on_startup: None,
            note_content: None,
            note_content_version: None,
        }
    }

    /// Returns the effective command.
    pub fn effective_command(&self) -> NoteCommand {
        self.command.unwrap_or(NoteCommand::Upload)
    }

    /// Converts back into an operation.
    ///
    /// Uploads must carry a title and the three timestamps. The content
    /// version falls back to the default when absent.
    pub fn into_operation(self) -> ProtocolResult<NoteOperation> {
        if self.effective_command() == NoteCommand::Delete {
            return Ok(NoteOperation::Delete { guid: self.guid });
        }

        let title = self.title.ok_or(ProtocolError::MissingField("title"))?;
        let create_date = self
            .create_date
            .ok_or(ProtocolError::MissingField("create-date"))?;
        let mut record = NoteRecord::new(self.guid, title, create_date);
        record.last_change_date = self
            .last_change_date
            .ok_or(ProtocolError::MissingField("last-change-date"))?;
        record.last_metadata_change_date = self
            .last_metadata_change_date
            .ok_or(ProtocolError::MissingField("last-metadata-change-date"))?;
        record.tags = self.tags.unwrap_or_default();
        record.open_on_startup = self.open_on_startup.unwrap_or(false);
        record.note_content = self.note_content.unwrap_or_default();
        record.note_content_version = self.note_content_version.unwrap_or_default();

        Ok(NoteOperation::Upload(record))
    }
}
