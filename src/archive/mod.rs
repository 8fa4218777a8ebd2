//! Reading and writing OCF ZIP archives.

mod extract;
mod pack;

pub use extract::extract_archive;
pub use pack::{EPUB_MIMETYPE, pack_archive};
