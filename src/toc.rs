//! Discovery of navigation documents from the manifest.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use tracing::info;

use crate::container::Container;
use crate::manifest::ManifestIndex;

/// NCX media type used by EPUB 2 tables of contents.
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// Discovered navigation documents.
///
/// Either field may be absent; a container with no usable table of
/// contents is still a valid container.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TocFiles {
    /// EPUB 3 navigation document (manifest `properties` contains `nav`).
    pub epub3_nav: Option<PathBuf>,
    /// EPUB 2 NCX document (`media-type="application/x-dtbncx+xml"`).
    pub epub2_ncx: Option<PathBuf>,
}

impl TocFiles {
    /// Discover navigation documents for a container.
    ///
    /// Hrefs resolve against the content directory. Entries that point at
    /// nothing on disk are dropped with a log line, not an error.
    pub fn discover(container: &Container, manifest: &ManifestIndex) -> TocFiles {
        let content_path = container.content_path();

        let epub3_nav = manifest.first_by_property("nav").and_then(|item| {
            let path = resolve_href(&content_path, &item.href);
            if path.is_none() {
                info!(href = %item.href, "nav document listed in manifest but absent on disk");
            }
            path
        });

        let epub2_ncx = manifest.first_by_media_type(NCX_MEDIA_TYPE).and_then(|item| {
            let path = resolve_href(&content_path, &item.href);
            if path.is_none() {
                info!(href = %item.href, "NCX listed in manifest but absent on disk");
            }
            path
        });

        if epub3_nav.is_none() && epub2_ncx.is_none() {
            info!("no table of contents found in manifest");
        }

        TocFiles {
            epub3_nav,
            epub2_ncx,
        }
    }
}

/// Join an href to the content directory, retrying with the
/// percent-decoded form for hrefs that were URL-encoded.
fn resolve_href(content_path: &Path, href: &str) -> Option<PathBuf> {
    if href.is_empty() {
        return None;
    }

    let direct = content_path.join(href);
    if direct.exists() {
        return Some(direct);
    }

    // Fallback: percent-decoded href (handles entries like "My%20Nav.xhtml")
    if let Ok(decoded) = percent_decode_str(href).decode_utf8()
        && decoded != href
    {
        let decoded_path = content_path.join(decoded.as_ref());
        if decoded_path.exists() {
            return Some(decoded_path);
        }
    }

    None
}
