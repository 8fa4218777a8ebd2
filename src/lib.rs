//! # bindery
//!
//! A library and CLI for unpacking EPUB (OCF) containers, polishing their
//! contents in place, and repacking spec-compliant archives.
//!
//! ## Features
//!
//! - Locate the package document through `META-INF/container.xml`
//! - Resolve the content root across conflicting layout conventions
//! - Discover EPUB 3 nav and EPUB 2 NCX documents from manifest metadata
//! - Inject cover links into navigation documents idempotently
//! - Repair common XHTML damage (bare `<br>`, stray scripts and text)
//! - Repack deterministically with the `mimetype` entry first and stored
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use bindery::{PolishOptions, process_epub};
//!
//! let options = PolishOptions::default();
//! process_epub(
//!     Path::new("book.epub"),
//!     Path::new("polished.epub"),
//!     Path::new("work"),
//!     &options,
//! )
//! .unwrap();
//! ```
//!
//! ## Working with containers
//!
//! Structural facts come from [`Container`], which wraps an already
//! extracted tree:
//!
//! ```no_run
//! use bindery::{Container, ManifestIndex, TocFiles};
//!
//! let container = Container::open("work").unwrap();
//! let manifest = ManifestIndex::parse(&container.package_doc().unwrap());
//! let toc = TocFiles::discover(&container, &manifest);
//! if let Some(nav) = toc.epub3_nav {
//!     println!("nav document: {}", nav.display());
//! }
//! ```

pub mod archive;
pub mod container;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod polish;
pub mod toc;
pub mod xml;

pub(crate) mod util;

pub use archive::{EPUB_MIMETYPE, extract_archive, pack_archive};
pub use container::{Container, content_root, locate_package_document};
pub use error::{Error, Result};
pub use manifest::{ManifestIndex, ManifestItem};
pub use pipeline::{Pipeline, PolishOptions, polish_container, process_epub};
pub use polish::CoverLink;
pub use toc::{NCX_MEDIA_TYPE, TocFiles};
