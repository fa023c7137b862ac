//! Tags and tag normalization.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalizes a tag name for storage: trimmed and lowercased.
pub fn normalize_tag_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A tag attached to a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Tag {
    /// Display name, as first registered.
    pub name: String,
    /// Normalized name used as the storage key.
    pub normalized_name: String,
}

impl Tag {
    /// Creates a tag from a display name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let normalized_name = normalize_tag_name(&name);
        Self {
            name: name.trim().to_string(),
            normalized_name,
        }
    }
}

/// Registry mapping normalized tag names to their canonical tag.
///
/// The first display form registered for a normalized name is kept; later
/// spellings resolve to it. Share one registry (behind an `Arc`) between
/// translators that must agree on display forms.
#[derive(Debug, Default)]
pub struct TagRegistry {
    tags: RwLock<HashMap<String, Tag>>,
}

impl TagRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical tag for `name`, registering it if unseen.
    ///
    /// Returns `None` for names that are empty after trimming.
    pub fn get_or_create(&self, name: &str) -> Option<Tag> {
        let normalized = normalize_tag_name(name);
        if normalized.is_empty() {
            return None;
        }

        if let Some(tag) = self.tags.read().get(&normalized) {
            return Some(tag.clone());
        }

        let mut tags = self.tags.write();
        let tag = tags
            .entry(normalized)
            .or_insert_with(|| Tag::new(name))
            .clone();
        Some(tag)
    }

    /// Looks up a tag by any spelling of its name.
    pub fn get(&self, name: &str) -> Option<Tag> {
        self.tags.read().get(&normalize_tag_name(name)).cloned()
    }

    /// Returns the number of registered tags.
    pub fn len(&self) -> usize {
        self.tags.read().len()
    }

    /// Returns true if no tags are registered.
    pub fn is_empty(&self) -> bool {
        self.tags.read().is_empty()
    }
}
