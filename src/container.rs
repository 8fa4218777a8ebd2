//! Locating the package document inside an extracted OCF tree.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::xml::Document;

/// Handle to an extracted EPUB container.
///
/// Bundles the tree root with the resolved package document path and
/// content directory so later stages don't re-derive them.
#[derive(Debug, Clone)]
pub struct Container {
    root: PathBuf,
    package_path: PathBuf,
    content_dir: String,
}

impl Container {
    /// Open an extracted container: locates the package document via
    /// `META-INF/container.xml` and resolves the content directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let package_path = locate_package_document(&root)?;
        let content_dir = content_root(&root);
        debug!(
            root = %root.display(),
            package = %package_path.display(),
            content_dir = %content_dir,
            "opened container"
        );
        Ok(Self {
            root,
            package_path,
            content_dir,
        })
    }

    /// Root of the extracted tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the package document (OPF).
    pub fn package_path(&self) -> &Path {
        &self.package_path
    }

    /// Content directory name relative to the root, or `""` when content
    /// lives at the root.
    pub fn content_dir(&self) -> &str {
        &self.content_dir
    }

    /// Absolute path of the content directory.
    pub fn content_path(&self) -> PathBuf {
        if self.content_dir.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&self.content_dir)
        }
    }

    /// Load and parse the package document.
    pub fn package_doc(&self) -> Result<Document> {
        read_xml(&self.package_path)
    }
}

/// Find the package document named by `META-INF/container.xml`.
///
/// The first `<rootfile>` in document order is used and its `media-type`
/// is not consulted; multi-rendition containers resolve to their first
/// rendition. A `full-path` that resolves outside `root` is rejected.
pub fn locate_package_document(root: &Path) -> Result<PathBuf> {
    let container_path = root.join("META-INF").join("container.xml");
    if !container_path.exists() {
        return Err(Error::ContainerNotFound {
            path: container_path,
        });
    }

    let bytes = fs::read(&container_path).map_err(|e| Error::io(&container_path, e))?;
    let doc = Document::parse_bytes(&bytes).map_err(|source| Error::MalformedContainer {
        path: container_path.clone(),
        source,
    })?;

    let full_path = doc
        .find_by_tag("rootfile")
        .and_then(|id| doc.attr(id, "full-path"))
        .filter(|p| !p.is_empty());

    let Some(full_path) = full_path else {
        return Err(Error::RootfileMissing {
            path: container_path,
        });
    };

    // full-path is container-relative; a value that climbs out of the
    // tree (or is absolute) cannot name a package document.
    let escapes = Path::new(full_path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(Error::RootfileMissing {
            path: container_path,
        });
    }

    let package_path = root.join(full_path);
    if !package_path.exists() {
        return Err(Error::PackageDocumentMissing { path: package_path });
    }

    Ok(package_path)
}

/// Resolve the content directory for an extracted container.
///
/// Checks the conventional directories (`OPS`, then `OEBPS`), falls back
/// to the directory containing the package document, and returns `""`
/// when content lives at the root. Never fails: an unreadable container
/// resolves to the root.
pub fn content_root(root: &Path) -> String {
    for dir in ["OPS", "OEBPS"] {
        if root.join(dir).is_dir() {
            return dir.to_string();
        }
    }

    match locate_package_document(root) {
        Ok(package_path) => match package_path.parent().and_then(|p| p.strip_prefix(root).ok()) {
            Some(parent) if !parent.as_os_str().is_empty() => {
                parent.to_string_lossy().to_string()
            }
            _ => String::new(),
        },
        Err(_) => String::new(),
    }
}

/// Read and parse an XML file from the extracted tree.
pub fn read_xml(path: &Path) -> Result<Document> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    Document::parse_bytes(&bytes).map_err(|source| Error::MalformedXml {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize a document back to disk as UTF-8.
pub fn write_xml(path: &Path, doc: &Document) -> Result<()> {
    fs::write(path, doc.to_xml()).map_err(|e| Error::io(path, e))
}
