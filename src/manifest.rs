//! Ordered view of the package manifest.

use crate::xml::Document;

/// A single `<item>` from the package manifest.
///
/// Attributes the source omits are recorded as empty strings (an empty
/// token list for `properties`) so lookups stay well-defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Vec<String>,
}

impl ManifestItem {
    /// Check whether the `properties` token list contains the given token.
    /// Token equality, not substring: `properties="nav"` matches `nav` but
    /// `properties="navigation"` does not.
    pub fn has_property(&self, token: &str) -> bool {
        self.properties.iter().any(|p| p == token)
    }
}

/// Manifest items in document order.
#[derive(Debug, Default)]
pub struct ManifestIndex {
    items: Vec<ManifestItem>,
}

impl ManifestIndex {
    /// Collect `<item>` entries from a parsed package document, keeping
    /// document order. A package without a manifest yields an empty index.
    pub fn parse(doc: &Document) -> Self {
        let mut items = Vec::new();
        if let Some(manifest) = doc.find_by_tag("manifest") {
            for child in doc.children(manifest) {
                if !doc.is_named(child, "item") {
                    continue;
                }
                items.push(ManifestItem {
                    id: doc.attr(child, "id").unwrap_or_default().to_string(),
                    href: doc.attr(child, "href").unwrap_or_default().to_string(),
                    media_type: doc
                        .attr(child, "media-type")
                        .unwrap_or_default()
                        .to_string(),
                    properties: doc
                        .attr(child, "properties")
                        .unwrap_or_default()
                        .split_ascii_whitespace()
                        .map(str::to_string)
                        .collect(),
                });
            }
        }
        Self { items }
    }

    /// All items in document order.
    pub fn items(&self) -> &[ManifestItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// First item whose `properties` attribute contains the given token.
    /// Absence is an ordinary outcome, not an error.
    pub fn first_by_property(&self, token: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.has_property(token))
    }

    /// First item with exactly the given media type.
    pub fn first_by_media_type(&self, media_type: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.media_type == media_type)
    }
}
