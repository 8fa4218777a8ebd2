//! Cover link injection into package, navigation, and summary documents.

use std::path::Path;

use tracing::{debug, warn};

use super::{CoverLink, edit_xml, has_token, is_element_named, is_element_with_attr};
use crate::error::Result;
use crate::xml::{Document, NodeId};

/// Mark the cover's spine entry as part of the linear reading order.
///
/// Readers only lay the cover onto the first page when its `<itemref>`
/// carries `linear="yes"`. An absent itemref is a logged no-op.
pub fn set_cover_linear(opf_path: &Path, idref: &str) -> Result<bool> {
    edit_xml(opf_path, |doc| {
        let Some(itemref) = doc.find(|n| is_element_with_attr(n, "itemref", "idref", idref)) else {
            warn!(idref, "no matching itemref in spine");
            return false;
        };
        if doc.attr(itemref, "linear") == Some("yes") {
            debug!(idref, "cover itemref already linear");
            return false;
        }
        doc.set_attr(itemref, "linear", "yes");
        true
    })
}

/// Tag a manifest item with the `cover-image` property.
///
/// Appends the token so items that already carry other properties keep
/// them. An absent item is a logged no-op.
pub fn add_cover_image_property(opf_path: &Path, item_id: &str) -> Result<bool> {
    edit_xml(opf_path, |doc| {
        let Some(item) = doc.find(|n| is_element_with_attr(n, "item", "id", item_id)) else {
            warn!(item_id, "no matching item in manifest");
            return false;
        };
        let properties = match doc.attr(item, "properties") {
            Some(existing) if has_token(existing, "cover-image") => return false,
            Some(existing) if !existing.trim().is_empty() => format!("{existing} cover-image"),
            _ => "cover-image".to_string(),
        };
        doc.set_attr(item, "properties", &properties);
        true
    })
}

/// Prepend a cover entry to the navigation document's TOC list.
///
/// Skips documents that already link to the cover href anywhere.
pub fn add_cover_to_nav(nav_path: &Path, cover: &CoverLink) -> Result<bool> {
    edit_xml(nav_path, |doc| {
        if doc
            .find(|n| is_element_with_attr(n, "a", "href", &cover.href))
            .is_some()
        {
            debug!(href = %cover.href, "cover already linked in navigation document");
            return false;
        }

        let Some(list) = find_toc_list(doc) else {
            warn!(path = %nav_path.display(), "no TOC list in navigation document");
            return false;
        };

        let item = doc.create_element("li");
        let anchor = doc.create_element("a");
        doc.set_attr(anchor, "href", &cover.href);
        doc.append_text(anchor, &cover.label);
        doc.append(item, anchor);
        doc.prepend(list, item);
        true
    })
}

/// Prepend a cover navPoint to the NCX navMap.
///
/// Every pre-existing navPoint's `playOrder` shifts down one slot so the
/// sequence stays dense and 1-based.
pub fn add_cover_to_ncx(ncx_path: &Path, cover: &CoverLink) -> Result<bool> {
    edit_xml(ncx_path, |doc| {
        if doc
            .find(|n| is_element_with_attr(n, "content", "src", &cover.href))
            .is_some()
        {
            debug!(href = %cover.href, "cover already present in NCX");
            return false;
        }

        let Some(nav_map) = doc.find_by_tag("navMap") else {
            warn!(path = %ncx_path.display(), "no navMap in NCX document");
            return false;
        };

        let nav_point = doc.create_element("navPoint");
        doc.set_attr(nav_point, "id", "navpoint-cover");
        doc.set_attr(nav_point, "playOrder", "1");

        let nav_label = doc.create_element("navLabel");
        let text = doc.create_element("text");
        doc.append_text(text, &cover.label);
        doc.append(nav_label, text);
        doc.append(nav_point, nav_label);

        let content = doc.create_element("content");
        doc.set_attr(content, "src", &cover.href);
        doc.append(nav_point, content);

        doc.prepend(nav_map, nav_point);

        for point in doc.find_all_in(doc.root(), |n| is_element_named(n, "navPoint")) {
            if doc.attr(point, "id") == Some("navpoint-cover") {
                continue;
            }
            let order = doc
                .attr(point, "playOrder")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(1);
            doc.set_attr(point, "playOrder", &(order + 1).to_string());
        }
        true
    })
}

/// Refresh a summary page's link list.
///
/// Drops entries that link back to the summary itself, then inserts a
/// cover link ahead of the first paragraph containing an anchor. The new
/// paragraph mirrors the class of the paragraph it displaces so it picks
/// up the same styling.
pub fn update_summary_page(summary_path: &Path, cover: &CoverLink) -> Result<bool> {
    let self_href = summary_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    edit_xml(summary_path, |doc| {
        let mut changed = false;

        // A summary page linking to itself is a navigation dead end.
        for anchor in doc.find_all_in(doc.root(), |n| {
            is_element_with_attr(n, "a", "href", &self_href)
        }) {
            let holder = doc.parent(anchor);
            if holder.is_some() {
                doc.detach(holder);
                changed = true;
            }
        }

        if doc
            .find(|n| is_element_with_attr(n, "a", "href", &cover.href))
            .is_some()
        {
            debug!(href = %cover.href, "cover already linked in summary page");
            return changed;
        }

        let paragraphs = doc.find_all_in(doc.root(), |n| is_element_named(n, "p"));
        let Some(&reference) = paragraphs
            .iter()
            .find(|&&p| doc.find_in(p, |n| is_element_named(n, "a")).is_some())
        else {
            warn!(path = %summary_path.display(), "no linked paragraph in summary page");
            return changed;
        };

        let paragraph = doc.create_element("p");
        if let Some(class) = doc.attr(reference, "class").map(str::to_owned) {
            doc.set_attr(paragraph, "class", &class);
        }
        let anchor = doc.create_element("a");
        doc.set_attr(anchor, "href", &cover.href);
        doc.append_text(anchor, &cover.label);
        doc.append(paragraph, anchor);
        doc.insert_before(reference, paragraph);
        true
    })
}

/// Locate the list that receives the cover entry.
///
/// Navigation documents disagree on how the TOC nav is labelled, so this
/// tries the strongest signal first: an `epub:type` containing the `toc`
/// token, then `role="doc-toc"`, then any `<nav>` with a direct list,
/// then any `<ol>` at all.
fn find_toc_list(doc: &Document) -> Option<NodeId> {
    let navs = doc.find_all_in(doc.root(), |n| is_element_named(n, "nav"));

    let typed = navs
        .iter()
        .copied()
        .filter(|&nav| {
            doc.attr_local(nav, "type")
                .is_some_and(|v| has_token(v, "toc"))
        })
        .find_map(|nav| child_named(doc, nav, "ol"));
    if typed.is_some() {
        return typed;
    }

    let role = navs
        .iter()
        .copied()
        .filter(|&nav| doc.attr(nav, "role") == Some("doc-toc"))
        .find_map(|nav| child_named(doc, nav, "ol"));
    if role.is_some() {
        return role;
    }

    let any_nav = navs
        .iter()
        .copied()
        .find_map(|nav| child_named(doc, nav, "ol"));
    if any_nav.is_some() {
        return any_nav;
    }

    doc.find_by_tag("ol")
}

fn child_named(doc: &Document, parent: NodeId, local: &str) -> Option<NodeId> {
    doc.children(parent).find(|&c| doc.is_named(c, local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn write_fixture(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_set_cover_linear_marks_spine_entry() {
        let dir = tempfile::tempdir().unwrap();
        let opf = write_fixture(
            &dir,
            "package.opf",
            r#"<package><spine><itemref idref="cover"/><itemref idref="ch1"/></spine></package>"#,
        );

        assert!(set_cover_linear(&opf, "cover").unwrap());
        let doc = Document::parse(&fs::read_to_string(&opf).unwrap()).unwrap();
        let itemref = doc
            .find(|n| is_element_with_attr(n, "itemref", "idref", "cover"))
            .unwrap();
        assert_eq!(doc.attr(itemref, "linear"), Some("yes"));

        // Second run sees the attribute and leaves the file alone
        assert!(!set_cover_linear(&opf, "cover").unwrap());
    }

    #[test]
    fn test_set_cover_linear_without_cover_entry() {
        let dir = tempfile::tempdir().unwrap();
        let opf = write_fixture(
            &dir,
            "package.opf",
            r#"<package><spine><itemref idref="ch1"/></spine></package>"#,
        );
        let before = fs::read_to_string(&opf).unwrap();

        assert!(!set_cover_linear(&opf, "cover").unwrap());
        assert_eq!(fs::read_to_string(&opf).unwrap(), before);
    }

    #[test]
    fn test_add_cover_image_property_keeps_existing_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let opf = write_fixture(
            &dir,
            "package.opf",
            r#"<package><manifest><item id="cover-image" href="cover.jpg" media-type="image/jpeg" properties="svg"/></manifest></package>"#,
        );

        assert!(add_cover_image_property(&opf, "cover-image").unwrap());
        let doc = Document::parse(&fs::read_to_string(&opf).unwrap()).unwrap();
        let item = doc
            .find(|n| is_element_with_attr(n, "item", "id", "cover-image"))
            .unwrap();
        assert_eq!(doc.attr(item, "properties"), Some("svg cover-image"));

        assert!(!add_cover_image_property(&opf, "cover-image").unwrap());
    }

    #[test]
    fn test_add_cover_image_property_sets_absent_attribute() {
        let dir = tempfile::tempdir().unwrap();
        let opf = write_fixture(
            &dir,
            "package.opf",
            r#"<package><manifest><item id="cover-image" href="cover.jpg" media-type="image/jpeg"/></manifest></package>"#,
        );

        assert!(add_cover_image_property(&opf, "cover-image").unwrap());
        let doc = Document::parse(&fs::read_to_string(&opf).unwrap()).unwrap();
        let item = doc
            .find(|n| is_element_with_attr(n, "item", "id", "cover-image"))
            .unwrap();
        assert_eq!(doc.attr(item, "properties"), Some("cover-image"));
    }

    #[test]
    fn test_add_cover_to_nav_prepends_entry() {
        let dir = tempfile::tempdir().unwrap();
        let nav = write_fixture(
            &dir,
            "nav.xhtml",
            r#"<html xmlns:epub="http://www.idpf.org/2007/ops"><body>
<nav epub:type="toc"><ol><li><a href="chapter-1.xhtml">One</a></li></ol></nav>
</body></html>"#,
        );
        let cover = CoverLink::default();

        assert!(add_cover_to_nav(&nav, &cover).unwrap());

        let doc = Document::parse(&fs::read_to_string(&nav).unwrap()).unwrap();
        let list = find_toc_list(&doc).unwrap();
        let first = doc.children(list).find(|&c| doc.is_named(c, "li")).unwrap();
        let anchor = doc
            .find_in(first, |n| is_element_named(n, "a"))
            .unwrap();
        assert_eq!(doc.attr(anchor, "href"), Some("cover.xhtml"));

        assert!(!add_cover_to_nav(&nav, &cover).unwrap());
    }

    #[test]
    fn test_add_cover_to_nav_falls_back_to_plain_list() {
        let dir = tempfile::tempdir().unwrap();
        let nav = write_fixture(
            &dir,
            "nav.xhtml",
            r#"<html><body><ol><li><a href="chapter-1.xhtml">One</a></li></ol></body></html>"#,
        );

        assert!(add_cover_to_nav(&nav, &CoverLink::default()).unwrap());
        let text = fs::read_to_string(&nav).unwrap();
        assert!(text.contains(r#"<a href="cover.xhtml">Cover</a>"#));
    }

    #[test]
    fn test_add_cover_to_nav_without_list_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let nav = write_fixture(&dir, "nav.xhtml", r#"<html><body><p>No TOC here</p></body></html>"#);
        let before = fs::read_to_string(&nav).unwrap();

        assert!(!add_cover_to_nav(&nav, &CoverLink::default()).unwrap());
        assert_eq!(fs::read_to_string(&nav).unwrap(), before);
    }

    #[test]
    fn test_add_cover_to_nav_prefers_typed_nav() {
        let dir = tempfile::tempdir().unwrap();
        let nav = write_fixture(
            &dir,
            "nav.xhtml",
            r#"<html xmlns:epub="http://www.idpf.org/2007/ops"><body>
<nav epub:type="landmarks"><ol><li><a href="x.xhtml">Landmark</a></li></ol></nav>
<nav epub:type="toc"><ol><li><a href="chapter-1.xhtml">One</a></li></ol></nav>
</body></html>"#,
        );

        assert!(add_cover_to_nav(&nav, &CoverLink::default()).unwrap());

        let doc = Document::parse(&fs::read_to_string(&nav).unwrap()).unwrap();
        let cover_anchor = doc
            .find(|n| is_element_with_attr(n, "a", "href", "cover.xhtml"))
            .unwrap();
        // Walk up li -> ol -> nav and check which nav received it
        let nav_el = doc.parent(doc.parent(doc.parent(cover_anchor)));
        assert_eq!(doc.attr_local(nav_el, "type"), Some("toc"));
    }

    #[test]
    fn test_add_cover_to_ncx_renumbers_play_order() {
        let dir = tempfile::tempdir().unwrap();
        let ncx = write_fixture(
            &dir,
            "toc.ncx",
            r#"<ncx><navMap>
<navPoint id="np-1" playOrder="1"><navLabel><text>One</text></navLabel><content src="chapter-1.xhtml"/>
  <navPoint id="np-1a" playOrder="2"><navLabel><text>Deep</text></navLabel><content src="chapter-1.xhtml#s1"/></navPoint>
</navPoint>
<navPoint id="np-2" playOrder="3"><navLabel><text>Two</text></navLabel><content src="chapter-2.xhtml"/></navPoint>
</navMap></ncx>"#,
        );
        let cover = CoverLink::default();

        assert!(add_cover_to_ncx(&ncx, &cover).unwrap());

        let doc = Document::parse(&fs::read_to_string(&ncx).unwrap()).unwrap();
        let orders: Vec<(Option<String>, Option<String>)> = doc
            .find_all_in(doc.root(), |n| is_element_named(n, "navPoint"))
            .into_iter()
            .map(|p| {
                (
                    doc.attr(p, "id").map(str::to_owned),
                    doc.attr(p, "playOrder").map(str::to_owned),
                )
            })
            .collect();
        assert_eq!(orders[0].0.as_deref(), Some("navpoint-cover"));
        assert_eq!(orders[0].1.as_deref(), Some("1"));
        assert_eq!(orders[1].1.as_deref(), Some("2"));
        assert_eq!(orders[2].1.as_deref(), Some("3"));
        assert_eq!(orders[3].1.as_deref(), Some("4"));

        // Idempotent: the content src is already present
        assert!(!add_cover_to_ncx(&ncx, &cover).unwrap());
    }

    #[test]
    fn test_add_cover_to_ncx_without_navmap_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let ncx = write_fixture(&dir, "toc.ncx", r#"<ncx><head/></ncx>"#);

        assert!(!add_cover_to_ncx(&ncx, &CoverLink::default()).unwrap());
    }

    #[test]
    fn test_update_summary_page_inserts_and_strips_self_reference() {
        let dir = tempfile::tempdir().unwrap();
        let summary = write_fixture(
            &dir,
            "chapter-2.xhtml",
            r#"<html><body>
<p class="p6"><a href="chapter-2.xhtml">Contents</a></p>
<p class="p6"><a href="chapter-1.xhtml">One</a></p>
</body></html>"#,
        );
        let cover = CoverLink::default();

        assert!(update_summary_page(&summary, &cover).unwrap());

        let text = fs::read_to_string(&summary).unwrap();
        assert!(!text.contains("chapter-2.xhtml\""));

        let doc = Document::parse(&text).unwrap();
        let paragraphs = doc.find_all_in(doc.root(), |n| is_element_named(n, "p"));
        assert_eq!(paragraphs.len(), 2);
        // Inserted paragraph leads and mirrors the displaced one's class
        assert_eq!(doc.attr(paragraphs[0], "class"), Some("p6"));
        let anchor = doc
            .find_in(paragraphs[0], |n| is_element_named(n, "a"))
            .unwrap();
        assert_eq!(doc.attr(anchor, "href"), Some("cover.xhtml"));

        assert!(!update_summary_page(&summary, &cover).unwrap());
    }

    #[test]
    fn test_update_summary_page_without_links_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let summary = write_fixture(
            &dir,
            "chapter-2.xhtml",
            r#"<html><body><p>Plain prose, nothing to link.</p></body></html>"#,
        );

        assert!(!update_summary_page(&summary, &CoverLink::default()).unwrap());
    }
}
