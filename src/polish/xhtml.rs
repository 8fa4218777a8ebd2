//! XHTML repair passes.
//!
//! Converted books arrive with markup that breaks strict XHTML parsers,
//! most often bare `<br>` tags. String-level passes fix what would stop
//! the parser outright; a tree pass then drops the elements EPUB readers
//! reject.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::{debug, warn};

use super::is_element_named;
use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding, strip_bom};
use crate::xml::Document;

/// Matches closing `</br>` tags, which XHTML forbids outright.
static CLOSING_BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</br>").unwrap());

/// Matches bare `<br>` tags missing their self-closing slash.
static BARE_BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*>").unwrap());

/// Matches whitespace wedged between the XML declaration and `<html>`.
static DECL_GAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(<\?xml[^>]+>)\s+<html").unwrap());

/// Repair one XHTML file in place.
///
/// The file is rewritten even when no pass fired: serialization itself
/// closes dangling inline tags the parser recovered from, so the output
/// is always well-formed.
pub fn fix_xhtml(path: &Path) -> Result<()> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let bytes = strip_bom(&bytes);
    let hint = extract_xml_encoding(bytes);
    let text = decode_text(bytes, hint);

    let repaired = repair_markup(&text);
    let mut doc = Document::parse(&repaired).map_err(|source| Error::MalformedXml {
        path: path.to_path_buf(),
        source,
    })?;
    prune_document(&mut doc);

    fs::write(path, doc.to_xml()).map_err(|e| Error::io(path, e))
}

/// Repair every `.xhtml` file directly under a content directory.
///
/// Files that stay unparseable after the string passes are skipped with a
/// warning rather than failing the batch. Returns how many files were
/// rewritten.
pub fn fix_xhtml_dir(content_dir: &Path) -> Result<usize> {
    let entries = fs::read_dir(content_dir).map_err(|e| Error::io(content_dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "xhtml") && p.is_file())
        .collect();
    files.sort();

    let mut repaired = 0;
    for file in &files {
        match fix_xhtml(file) {
            Ok(()) => repaired += 1,
            Err(e) => warn!(file = %file.display(), error = %e, "skipping unrepairable file"),
        }
    }
    debug!(files = repaired, dir = %content_dir.display(), "repaired xhtml files");
    Ok(repaired)
}

/// String passes that must run before parsing.
fn repair_markup(text: &str) -> String {
    let text = CLOSING_BR_RE.replace_all(text, "");
    let text = BARE_BR_RE.replace_all(&text, "<br/>");
    // Some readers refuse documents with whitespace before the root element
    DECL_GAP_RE.replace(&text, "${1}<html").into_owned()
}

/// Drop elements and stray text that strict EPUB readers reject.
fn prune_document(doc: &mut Document) -> bool {
    let mut changed = false;

    // Scripts are not allowed in EPUB XHTML content
    for script in doc.find_all_in(doc.root(), |n| is_element_named(n, "script")) {
        doc.detach(script);
        changed = true;
    }

    // <meta> belongs directly under <head> and nowhere else
    for meta in doc.find_all_in(doc.root(), |n| is_element_named(n, "meta")) {
        if !doc.is_named(doc.parent(meta), "head") {
            doc.detach(meta);
            changed = true;
        }
    }

    // Text directly under <html> is invalid, whitespace included
    if let Some(html) = doc.find_by_tag("html") {
        for child in doc.children(html).collect::<Vec<_>>() {
            if doc.text_content(child).is_some() {
                doc.detach(child);
                changed = true;
            }
        }
    }

    // Under <body> only stray prose goes; indentation whitespace stays
    if let Some(body) = doc.find_by_tag("body") {
        for child in doc.children(body).collect::<Vec<_>>() {
            if doc.text_content(child).is_some_and(|t| !t.trim().is_empty()) {
                doc.detach(child);
                changed = true;
            }
        }
    }

    changed
}
