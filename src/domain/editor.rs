//! Opaque editor annotations attached to CMS-sourced fields.
//!
//! The live-preview overlay locates editable regions by reading these
//! attributes off rendered nodes. Nothing else in the crate interprets them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const TAG_FAMILY: &str = "data-cslp";

/// Attribute bag spread onto the rendered node of a single field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditorTags(BTreeMap<String, String>);

impl EditorTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-attribute bag, the shape the CMS emits for `data-cslp` tags.
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut tags = Self::new();
        tags.insert(name, value);
        tags
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Attributes that are safe to emit verbatim.
    ///
    /// Anything outside the overlay's own tag family is skipped, so a bag
    /// can carry neither event handlers nor client-runtime bindings.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(name, _)| is_safe_attribute_name(name))
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for EditorTags
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// Per-field annotations for one entry, keyed by field path
/// (`title`, `rich_text`, `blocks__0`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditorMetadata(BTreeMap<String, EditorTags>);

impl EditorMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, tags: EditorTags) {
        self.0.insert(field.into(), tags);
    }

    pub fn field(&self, field: &str) -> Option<&EditorTags> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Look up the tags for `field` in an optional metadata map.
pub fn field_tags<'a>(metadata: Option<&'a EditorMetadata>, field: &str) -> Option<&'a EditorTags> {
    metadata.and_then(|metadata| metadata.field(field))
}

/// Overlay tags only: `data-cslp` and its `data-cslp-*` companions.
fn is_safe_attribute_name(name: &str) -> bool {
    if name.len() > 64 {
        return false;
    }
    let Some(rest) = name.strip_prefix(TAG_FAMILY) else {
        return false;
    };
    (rest.is_empty() || rest.starts_with('-'))
        && rest.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
}
