//! In-place polish passes over an extracted container.
//!
//! Each operation reads one document, edits the tree, and writes back only
//! when something actually changed, so re-running a pass leaves already
//! polished files untouched.

mod nav;
mod xhtml;

pub use nav::{
    add_cover_image_property, add_cover_to_nav, add_cover_to_ncx, set_cover_linear,
    update_summary_page,
};
pub use xhtml::{fix_xhtml, fix_xhtml_dir};

use std::path::Path;

use crate::container::{read_xml, write_xml};
use crate::error::Result;
use crate::xml::{Document, Node, NodeData, local_name};

/// Target and label for injected cover links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverLink {
    /// Href of the cover page, relative to the content directory.
    pub href: String,
    /// Link text shown in navigation lists.
    pub label: String,
}

impl CoverLink {
    pub fn new(href: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            label: label.into(),
        }
    }
}

impl Default for CoverLink {
    fn default() -> Self {
        Self::new("cover.xhtml", "Cover")
    }
}

/// Parse a file, apply an edit, and write back when the edit reports a
/// change. Returns whether the file was rewritten.
fn edit_xml(path: &Path, edit: impl FnOnce(&mut Document) -> bool) -> Result<bool> {
    let mut doc = read_xml(path)?;
    if edit(&mut doc) {
        write_xml(path, &doc)?;
        return Ok(true);
    }
    Ok(false)
}

fn is_element_named(node: &Node, local: &str) -> bool {
    matches!(&node.data, NodeData::Element { name, .. } if local_name(name) == local)
}

fn is_element_with_attr(node: &Node, tag: &str, attr: &str, value: &str) -> bool {
    match &node.data {
        NodeData::Element { name, attrs } => {
            local_name(name) == tag && attrs.iter().any(|a| a.name == attr && a.value == value)
        }
        _ => false,
    }
}

fn has_token(value: &str, token: &str) -> bool {
    value.split_ascii_whitespace().any(|t| t == token)
}
