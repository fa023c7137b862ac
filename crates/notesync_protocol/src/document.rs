//! Canonical note document format.
//!
//! A note document is the fully serialized form of a note handed to the
//! client: a JSON object whose `text` field holds exactly one content
//! envelope and whose `tags` map is keyed by normalized tag name. Keys are
//! sorted so identical notes serialize identically.

use crate::error::ProtocolResult;
use crate::note::{NoteSource, Timestamp};
use crate::tag::Tag;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// A serialized note document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NoteDocument {
    /// Note identifier.
    pub id: String,
    /// Note title.
    pub title: String,
    /// Content envelope, `<note-content version="V">...</note-content>`.
    pub text: String,
    /// Creation time.
    pub create_date: Timestamp,
    /// Time of the last content change.
    pub last_change_date: Timestamp,
    /// Time of the last metadata change.
    pub last_metadata_change_date: Timestamp,
    /// Whether the note opens on startup.
    #[serde(default)]
    pub open_on_startup: bool,
    /// Tags keyed by normalized name.
    #[serde(default)]
    pub tags: BTreeMap<String, Tag>,
}

impl NoteDocument {
    /// Serializes the document.
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a serialized document.
    pub fn from_json(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl NoteSource for NoteDocument {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn tag_names(&self) -> Vec<String> {
        self.tags.values().map(|tag| tag.name.clone()).collect()
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
        Cow::Borrowed(&self.text)
    }
}
