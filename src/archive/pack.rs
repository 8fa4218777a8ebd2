use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::{Error, Result};

/// Canonical OCF media type carried by the `mimetype` entry.
pub const EPUB_MIMETYPE: &[u8] = b"application/epub+zip";

/// Pack an extracted tree back into an EPUB archive at `output`.
///
/// The `mimetype` entry comes first and is stored uncompressed as OCF
/// requires; every other file deflates in lexicographic path order, so
/// identical trees produce byte-identical archives. The archive is staged
/// in a temporary file next to `output` and persisted atomically, leaving
/// no partial output behind on failure.
pub fn pack_archive(tree: &Path, output: &Path) -> Result<()> {
    let mimetype_path = tree.join("mimetype");
    if !mimetype_path.is_file() {
        return Err(Error::MissingMimetype {
            path: mimetype_path,
        });
    }

    let mimetype = fs::read(&mimetype_path).map_err(|e| Error::io(&mimetype_path, e))?;
    if mimetype != EPUB_MIMETYPE {
        warn!(
            path = %mimetype_path.display(),
            content = %String::from_utf8_lossy(&mimetype),
            "mimetype entry does not declare application/epub+zip"
        );
    }

    let mut entries = Vec::new();
    collect_files(tree, tree, &mut entries)?;
    entries.sort();

    let write_err = |source| Error::ArchiveWrite {
        path: output.to_path_buf(),
        source,
    };

    let staging_dir = output.parent().unwrap_or(Path::new("."));
    let staging = NamedTempFile::new_in(staging_dir)
        .map_err(|e| write_err(zip::result::ZipError::Io(e)))?;

    let options_stored =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let options_deflate =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(staging);

    // mimetype must be the first entry, uncompressed
    zip.start_file("mimetype", options_stored).map_err(write_err)?;
    zip.write_all(&mimetype).map_err(|e| write_err(e.into()))?;

    for name in &entries {
        if name == "mimetype" {
            continue;
        }
        let path = tree.join(name);
        let data = fs::read(&path).map_err(|e| Error::io(&path, e))?;
        zip.start_file(name.as_str(), options_deflate)
            .map_err(write_err)?;
        zip.write_all(&data).map_err(|e| write_err(e.into()))?;
    }

    let staging = zip.finish().map_err(write_err)?;
    staging
        .persist(output)
        .map_err(|e| write_err(zip::result::ZipError::Io(e.error)))?;

    debug!(
        output = %output.display(),
        entries = entries.len(),
        "packed archive"
    );
    Ok(())
}

/// Collect relative forward-slash paths of every file under `dir`.
/// Directories themselves get no entries; symlinks and other specials
/// are not packed.
fn collect_files(root: &Path, dir: &Path, files: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;

        if file_type.is_dir() {
            collect_files(root, &path, files)?;
        } else if file_type.is_file()
            && let Ok(rel) = path.strip_prefix(root)
        {
            let name = rel
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            files.push(name);
        }
    }
    Ok(())
}
