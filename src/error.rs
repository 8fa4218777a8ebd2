//! Error types for bindery operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while locating, reading, polishing, or repacking
/// an EPUB container.
#[derive(Error, Debug)]
pub enum Error {
    /// No `META-INF/container.xml` under the container root.
    #[error("META-INF/container.xml not found under {path}")]
    ContainerNotFound { path: PathBuf },

    /// `container.xml` exists but is not parseable XML.
    #[error("Malformed container.xml at {path}: {source}")]
    MalformedContainer {
        path: PathBuf,
        source: quick_xml::Error,
    },

    /// `container.xml` parsed but carries no usable `<rootfile>` full-path
    /// (absent, empty, or escaping the container root).
    #[error("No rootfile with a usable full-path attribute in {path}")]
    RootfileMissing { path: PathBuf },

    /// The `full-path` target does not exist in the extracted tree.
    #[error("Package document missing: {path}")]
    PackageDocumentMissing { path: PathBuf },

    /// An XML document failed to parse.
    #[error("XML parsing error in {path}: {source}")]
    MalformedXml {
        path: PathBuf,
        source: quick_xml::Error,
    },

    /// No `mimetype` file at the root of the tree being packed.
    #[error("Missing mimetype entry in {path}")]
    MissingMimetype { path: PathBuf },

    /// The source archive could not be opened or an entry read.
    #[error("Failed to read archive {path}: {source}")]
    ArchiveRead {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    /// The output archive could not be written.
    #[error("Failed to write archive {path}: {source}")]
    ArchiveWrite {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    /// Filesystem I/O failure outside archive entry handling.
    #[error("I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// A pipeline stage failed; wraps the underlying error with the
    /// stage name for attribution.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
