//! The `<note-content>` envelope wrapped around a note's body.
//!
//! Stored note content is a single envelope:
//!
//! ```text
//! <note-content version="0.1">...inner markup...</note-content>
//! ```
//!
//! The `version` attribute names the grammar of the inner body. Parsing is
//! total: content that is not exactly one envelope yields an empty body,
//! and a missing or unparseable version yields [`ContentVersion::DEFAULT`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

const ENVELOPE_PATTERN: &str = r#"(?s)\A\s*<note-content(?:\s+version="(?P<version>[^"]*)")?\s*>(?P<inner>.*)</note-content>\s*\z"#;

static ENVELOPE: OnceLock<Regex> = OnceLock::new();

fn envelope_regex() -> &'static Regex {
    ENVELOPE.get_or_init(|| Regex::new(ENVELOPE_PATTERN).expect("envelope pattern is valid"))
}

/// Decimal identifier of the grammar a note body conforms to.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentVersion(f64);

impl ContentVersion {
    /// Version assumed when the envelope carries none.
    pub const DEFAULT: ContentVersion = ContentVersion(0.1);

    /// Creates a version from a finite decimal value.
    ///
    /// Returns `None` for NaN and infinities.
    pub fn new(value: f64) -> Option<Self> {
        value.is_finite().then_some(Self(value))
    }

    /// Parses a version attribute value.
    ///
    /// Surrounding whitespace is ignored. Anything that is not a finite
    /// decimal number is rejected.
    pub fn parse(text: &str) -> Option<Self> {
        text.trim().parse::<f64>().ok().and_then(Self::new)
    }

    /// Returns the numeric value.
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for ContentVersion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ContentVersion {
    /// Canonical decimal form: `0.1`, `2.5`, `1`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parsed content envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentEnvelope {
    /// Content-schema version of the body.
    pub version: ContentVersion,
    /// Raw inner body, preserved verbatim.
    pub inner: String,
}

impl ContentEnvelope {
    /// Creates an envelope from its parts.
    pub fn new(version: ContentVersion, inner: impl Into<String>) -> Self {
        Self {
            version,
            inner: inner.into(),
        }
    }

    /// Extracts version and body from stored content.
    ///
    /// Never fails. Content that is not exactly one envelope gives an empty
    /// body; an absent or invalid version gives [`ContentVersion::DEFAULT`].
    pub fn parse(content: &str) -> Self {
        let Some(captures) = envelope_regex().captures(content) else {
            return Self::new(ContentVersion::DEFAULT, String::new());
        };

        let version = captures
            .name("version")
            .and_then(|m| ContentVersion::parse(m.as_str()))
            .unwrap_or_default();
        let inner = captures
            .name("inner")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        Self { version, inner }
    }

    /// Returns true if `content` is exactly one envelope.
    pub fn is_envelope(content: &str) -> bool {
        envelope_regex().is_match(content)
    }

    /// Renders the envelope, always emitting the version attribute.
    pub fn render(&self) -> String {
        format!(
            "<note-content version=\"{}\">{}</note-content>",
            self.version, self.inner
        )
    }
}
