//! Note records and note sources.

use crate::envelope::{ContentEnvelope, ContentVersion};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Timestamp with the offset the note was edited in.
pub type Timestamp = DateTime<FixedOffset>;

/// Returns the current time as a [`Timestamp`].
pub fn now() -> Timestamp {
    Utc::now().fixed_offset()
}

/// Anything that can be uploaded as a note.
///
/// Implemented by [`LocalNote`] for editor-side notes, and by
/// [`NoteRecord`] and [`crate::NoteDocument`] so that fetched notes and
/// parsed documents can be translated back into records.
pub trait NoteSource {
    /// Stable note identifier.
    fn id(&self) -> &str;

    /// Note title.
    fn title(&self) -> &str;

    /// Tag names, in any spelling.
    fn tag_names(&self) -> Vec<String>;

    /// Creation time.
    fn create_date(&self) -> Timestamp;

    /// Time of the last content change.
    fn change_date(&self) -> Timestamp;

    /// Time of the last metadata change (tags, startup flag).
    fn metadata_change_date(&self) -> Timestamp;

    /// Whether the note opens on application startup.
    fn is_open_on_startup(&self) -> bool;

    /// Stored content, normally one `<note-content>` envelope.
    fn xml_content(&self) -> Cow<'_, str>;
}

/// Transfer form of a note, as exchanged with the remote collection.
///
/// The identifier is fixed at construction; every other field is public.
/// `note_content` holds the inner body only, without the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NoteRecord {
    guid: String,
    /// Note title.
    pub title: String,
    /// Tag names as given by the source, not normalized.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time.
    pub create_date: Timestamp,
    /// Time of the last content change.
    pub last_change_date: Timestamp,
    /// Time of the last metadata change.
    pub last_metadata_change_date: Timestamp,
    /// Whether the note opens on startup.
    #[serde(default)]
    pub open_on_startup: bool,
    /// Inner content body.
    #[serde(default)]
    pub note_content: String,
    /// Content-schema version of `note_content`.
    #[serde(default)]
    pub note_content_version: ContentVersion,
    /// Revision at which the remote collection last stored this note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_revision: Option<i64>,
}

impl NoteRecord {
    /// Creates a record with every timestamp set to `timestamp`.
    pub fn new(guid: impl Into<String>, title: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            guid: guid.into(),
            title: title.into(),
            tags: Vec::new(),
            create_date: timestamp,
            last_change_date: timestamp,
            last_metadata_change_date: timestamp,
            open_on_startup: false,
            note_content: String::new(),
            note_content_version: ContentVersion::DEFAULT,
            last_sync_revision: None,
        }
    }

    /// Returns the note identifier.
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// Sets the inner content and its version.
    pub fn with_content(mut self, version: ContentVersion, content: impl Into<String>) -> Self {
        self.note_content_version = version;
        self.note_content = content.into();
        self
    }

    /// Sets the tag names.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the last sync revision.
    pub fn with_revision(mut self, revision: i64) -> Self {
        self.last_sync_revision = Some(revision);
        self
    }

    /// Returns the content wrapped back into its envelope.
    pub fn envelope(&self) -> ContentEnvelope {
        ContentEnvelope::new(self.note_content_version, self.note_content.clone())
    }
}

impl NoteSource for NoteRecord {
    fn id(&self) -> &str {
        &self.guid
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn tag_names(&self) -> Vec<String> {
        self.tags.clone()
    }

    fn create_date(&self) -> Timestamp {
        self.create_date
    }

    fn change_date(&self) -> Timestamp {
        self.last_change_date
    }

    fn metadata_change_date(&self) -> Timestamp {
        self.last_metadata_change_date
    }

    fn is_open_on_startup(&self) -> bool {
        self.open_on_startup
    }

    fn xml_content(&self) -> Cow<'_, str> {
        Cow::Owned(self.envelope().render())
    }
}

/// An in-memory, editor-side note.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalNote {
    id: String,
    /// Note title.
    pub title: String,
    /// Stored content, including the envelope.
    pub xml_content: String,
    /// Tag names.
    pub tags: Vec<String>,
    /// Creation time.
    pub create_date: Timestamp,
    /// Time of the last content change.
    pub change_date: Timestamp,
    /// Time of the last metadata change.
    pub metadata_change_date: Timestamp,
    /// Whether the note opens on startup.
    pub open_on_startup: bool,
}

impl LocalNote {
    /// Creates a new note with a fresh identifier and an empty body.
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), title)
    }

    /// Creates a note with a known identifier.
    pub fn with_id(id: impl Into<String>, title: impl Into<String>) -> Self {
        let timestamp = now();
        Self {
            id: id.into(),
            title: title.into(),
            xml_content: ContentEnvelope::new(ContentVersion::DEFAULT, "").render(),
            tags: Vec::new(),
            create_date: timestamp,
            change_date: timestamp,
            metadata_change_date: timestamp,
            open_on_startup: false,
        }
    }

    /// Replaces the stored content and bumps the change date.
    pub fn set_content(&mut self, xml_content: impl Into<String>) {
        self.xml_content = xml_content.into();
        self.change_date = now();
    }

    /// Adds a tag and bumps the metadata change date.
    pub fn add_tag(&mut self, name: impl Into<String>) {
        self.tags.push(name.into());
        self.metadata_change_date = now();
    }
}

impl NoteSource for LocalNote {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn tag_names(&self) -> Vec<String> {
        self.tags.clone()
    }

    fn create_date(&self) -> Timestamp {
        self.create_date
    }

    fn change_date(&self) -> Timestamp {
        self.change_date
    }

    fn metadata_change_date(&self) -> Timestamp {
        self.metadata_change_date
    }

    fn is_open_on_startup(&self) -> bool {
        self.open_on_startup
    }

    fn xml_content(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.xml_content)
    }
}
