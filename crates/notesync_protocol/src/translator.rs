//! Translation between notes and their wire forms.

use crate::document::NoteDocument;
use crate::envelope::ContentEnvelope;
use crate::error::ProtocolResult;
use crate::messages::NoteUpdate;
use crate::note::{NoteRecord, NoteSource};
use crate::tag::TagRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Maps notes to [`NoteRecord`]s and records to serialized documents.
///
/// Tag display forms are resolved through a [`TagRegistry`], which may be
/// shared between translators.
#[derive(Debug, Clone, Default)]
pub struct NoteTranslator {
    tags: Arc<TagRegistry>,
}

impl NoteTranslator {
    /// Creates a translator with its own tag registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a translator over a shared tag registry.
    pub fn with_registry(tags: Arc<TagRegistry>) -> Self {
        Self { tags }
    }

    /// Returns the tag registry.
    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.tags
    }

    /// Translates a note into its transfer form.
    ///
    /// The content envelope is unwrapped; see [`ContentEnvelope::parse`] for
    /// the defaults applied when it is missing or malformed.
    pub fn to_wire<N: NoteSource + ?Sized>(&self, note: &N) -> NoteRecord {
        let content = note.xml_content();
        if !ContentEnvelope::is_envelope(&content) {
            debug!(guid = note.id(), "note content has no envelope, uploading empty body");
        }
        let envelope = ContentEnvelope::parse(&content);

        let mut record = NoteRecord::new(note.id(), note.title(), note.create_date());
        record.last_change_date = note.change_date();
        record.last_metadata_change_date = note.metadata_change_date();
        record.open_on_startup = note.is_open_on_startup();
        record.tags = note.tag_names();
        record.note_content_version = envelope.version;
        record.note_content = envelope.inner;
        record
    }

    /// Builds the document for a record, with tags normalized and
    /// deduplicated.
    pub fn to_note_document(&self, record: &NoteRecord) -> NoteDocument {
        let mut tags = BTreeMap::new();
        for name in &record.tags {
            if let Some(tag) = self.tags.get_or_create(name) {
                tags.entry(tag.normalized_name.clone()).or_insert(tag);
            }
        }

        NoteDocument {
            id: record.guid().to_string(),
            title: record.title.clone(),
            text: record.envelope().render(),
            create_date: record.create_date,
            last_change_date: record.last_change_date,
            last_metadata_change_date: record.last_metadata_change_date,
            open_on_startup: record.open_on_startup,
            tags,
        }
    }

    /// Serializes a record into the canonical document format.
    pub fn to_document(&self, record: &NoteRecord) -> ProtocolResult<String> {
        self.to_note_document(record).to_json()
    }

    /// Builds the update handed to the client for a fetched record.
    ///
    /// Records without a sync revision are reported at revision 0.
    pub fn to_update(&self, record: &NoteRecord) -> ProtocolResult<NoteUpdate> {
        Ok(NoteUpdate::new(
            self.to_document(record)?,
            record.title.clone(),
            record.guid(),
            record.last_sync_revision.unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ContentVersion;
    use crate::note::LocalNote;
    use proptest::prelude::*;

    fn local(content: &str) -> LocalNote {
        let mut note = LocalNote::with_id("note-1", "Title");
        note.xml_content = content.to_string();
        note
    }

    #[test]
    fn to_wire_copies_fields() {
        let mut note = local(r#"<note-content version="2.5">hello</note-content>"#);
        note.open_on_startup = true;
        note.tags = vec!["Work".into(), "system:notebook:Ideas".into()];

        let record = NoteTranslator::new().to_wire(&note);
        assert_eq!(record.guid(), "note-1");
        assert_eq!(record.title, "Title");
        assert!(record.open_on_startup);
        assert_eq!(record.create_date, note.create_date);
        assert_eq!(record.last_change_date, note.change_date);
        assert_eq!(record.last_metadata_change_date, note.metadata_change_date);
        assert_eq!(record.tags, note.tags);
        assert_eq!(record.note_content_version, ContentVersion::new(2.5).unwrap());
        assert_eq!(record.note_content, "hello");
        assert!(record.last_sync_revision.is_none());
    }

    #[test]
    fn to_wire_defaults_for_plain_text() {
        let record = NoteTranslator::new().to_wire(&local("plain text"));
        assert_eq!(record.note_content_version, ContentVersion::DEFAULT);
        assert_eq!(record.note_content, "");
    }

    #[test]
    fn to_wire_without_version() {
        let record = NoteTranslator::new().to_wire(&local("<note-content>no-version</note-content>"));
        assert_eq!(record.note_content_version, ContentVersion::DEFAULT);
        assert_eq!(record.note_content, "no-version");
    }

    #[test]
    fn tags_differing_in_case_collapse() {
        let mut note = local("<note-content>x</note-content>");
        note.tags = vec!["Work".into(), "work".into()];

        let translator = NoteTranslator::new();
        let record = translator.to_wire(&note);
        let document = NoteDocument::from_json(&translator.to_document(&record).unwrap()).unwrap();

        assert_eq!(document.tags.len(), 1);
        assert_eq!(document.tags["work"].name, "Work");
    }

    #[test]
    fn shared_registry_keeps_first_display_form() {
        let registry = Arc::new(TagRegistry::new());
        let first = NoteTranslator::with_registry(Arc::clone(&registry));
        let second = NoteTranslator::with_registry(Arc::clone(&registry));

        let mut a = local("<note-content>a</note-content>");
        a.tags = vec!["Recipes".into()];
        first.to_note_document(&first.to_wire(&a));

        let mut b = local("<note-content>b</note-content>");
        b.tags = vec!["RECIPES".into()];
        let document = second.to_note_document(&second.to_wire(&b));
        assert_eq!(document.tags["recipes"].name, "Recipes");
    }

    #[test]
    fn document_rebuilds_envelope() {
        let translator = NoteTranslator::new();
        let record = translator.to_wire(&local("  <note-content>body</note-content>  "));
        let document = translator.to_note_document(&record);
        assert_eq!(
            document.text,
            r#"<note-content version="0.1">body</note-content>"#
        );
    }

    #[test]
    fn update_carries_revision() {
        let translator = NoteTranslator::new();
        let record = translator
            .to_wire(&local("<note-content>x</note-content>"))
            .with_revision(12);
        let update = translator.to_update(&record).unwrap();
        assert_eq!(update.guid, "note-1");
        assert_eq!(update.title, "Title");
        assert_eq!(update.revision, 12);
        assert!(NoteDocument::from_json(&update.document).is_ok());
    }

    proptest! {
        #[test]
        fn round_trip_preserves_version_and_content(
            inner in "[^<]{0,64}",
            version in prop::option::of(0u32..1000),
            leading in "[ \n]{0,2}",
        ) {
            let content = match version {
                Some(v) => format!("{leading}<note-content version=\"{}\">{inner}</note-content>", f64::from(v) / 10.0),
                None => format!("{leading}<note-content>{inner}</note-content>"),
            };
            let translator = NoteTranslator::new();
            let first = translator.to_wire(&local(&content));

            let text = translator.to_document(&first).unwrap();
            let document = NoteDocument::from_json(&text).unwrap();
            let second = translator.to_wire(&document);

            prop_assert_eq!(second.note_content_version, first.note_content_version);
            prop_assert_eq!(second.note_content, first.note_content);
        }

        #[test]
        fn arbitrary_content_never_panics(content in ".{0,128}") {
            let translator = NoteTranslator::new();
            let first = translator.to_wire(&local(&content));
            let document = translator.to_note_document(&first);
            let second = translator.to_wire(&document);
            prop_assert_eq!(second.note_content, first.note_content);
        }
    }
}
