use std::fs;
use std::io::{self, Read};
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::error::{Error, Result};

/// Extract every entry of an EPUB archive into `target`, byte for byte.
///
/// Intermediate directories are created as needed. Entry names that would
/// resolve outside the target directory are rejected. The `mimetype` entry
/// is not validated here; repair of non-conforming archives happens at
/// pack time.
pub fn extract_archive(archive_path: &Path, target: &Path) -> Result<()> {
    let read_err = |source| Error::ArchiveRead {
        path: archive_path.to_path_buf(),
        source,
    };

    let file =
        fs::File::open(archive_path).map_err(|e| read_err(zip::result::ZipError::Io(e)))?;
    let mut archive = ZipArchive::new(file).map_err(read_err)?;

    fs::create_dir_all(target).map_err(|e| Error::io(target, e))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(read_err)?;

        // Reject entries whose names escape the target directory
        let Some(rel_path) = entry.enclosed_name() else {
            return Err(read_err(zip::result::ZipError::Io(io::Error::other(
                format!("entry '{}' escapes the extraction directory", entry.name()),
            ))));
        };
        let out_path = target.join(rel_path);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| Error::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        // Decompression failures belong to the archive, not the output file
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| read_err(zip::result::ZipError::Io(e)))?;
        fs::write(&out_path, &data).map_err(|e| Error::io(&out_path, e))?;
    }

    debug!(
        archive = %archive_path.display(),
        entries = archive.len(),
        "extracted archive"
    );
    Ok(())
}
