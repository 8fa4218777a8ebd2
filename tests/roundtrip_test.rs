//! Integration tests for archive extraction and packing: OCF entry
//! layout, byte-level round trips, and deterministic output.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use proptest::prelude::*;
use tempfile::TempDir;
use zip::ZipArchive;

use bindery::{EPUB_MIMETYPE, extract_archive, pack_archive};

// ============================================================================
// Helpers
// ============================================================================

fn build_tree(files: &[(&str, &[u8])]) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    for (name, data) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&path, data).expect("Failed to write fixture file");
    }
    dir
}

/// Collect (relative path, content) for every file under `root`, sorted
/// by path so two trees compare positionally.
fn read_tree(root: &Path) -> Vec<(String, Vec<u8>)> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
        for entry in fs::read_dir(dir).expect("Failed to read directory") {
            let path = entry.expect("Failed to read directory entry").path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let name = path
                    .strip_prefix(root)
                    .expect("Entry escaped the tree root")
                    .to_string_lossy()
                    .replace(std::path::MAIN_SEPARATOR, "/");
                out.push((name, fs::read(&path).expect("Failed to read file")));
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

fn entry_names(archive_path: &Path) -> Vec<String> {
    let mut archive = ZipArchive::new(fs::File::open(archive_path).expect("Failed to open archive"))
        .expect("Failed to read archive");
    (0..archive.len())
        .map(|i| {
            archive
                .by_index(i)
                .expect("Failed to read entry")
                .name()
                .to_string()
        })
        .collect()
}

// ============================================================================
// OCF Entry Layout
// ============================================================================

#[test]
fn test_mimetype_leads_and_entries_sort() {
    let tree = build_tree(&[
        ("mimetype", EPUB_MIMETYPE),
        ("META-INF/container.xml", b"<container/>"),
        ("OPS/cover.xhtml", b"<html/>"),
        ("OPS/content.opf", b"<package/>"),
        ("OPS/chapter-1.xhtml", b"<html/>"),
    ]);
    let out = TempDir::new().expect("Failed to create temp dir");
    let output = out.path().join("book.epub");

    pack_archive(tree.path(), &output).expect("Failed to pack");

    assert_eq!(
        entry_names(&output),
        vec![
            "mimetype",
            "META-INF/container.xml",
            "OPS/chapter-1.xhtml",
            "OPS/content.opf",
            "OPS/cover.xhtml",
        ],
        "Entries after mimetype should sort lexicographically"
    );

    let mut archive = ZipArchive::new(fs::File::open(&output).expect("Failed to open archive"))
        .expect("Failed to read archive");

    let mut first = archive.by_index(0).expect("Failed to read first entry");
    assert_eq!(
        first.compression(),
        zip::CompressionMethod::Stored,
        "mimetype must be stored uncompressed"
    );
    let mut content = Vec::new();
    first
        .read_to_end(&mut content)
        .expect("Failed to read mimetype entry");
    assert_eq!(content, EPUB_MIMETYPE);
    drop(first);

    for i in 1..archive.len() {
        let entry = archive.by_index(i).expect("Failed to read entry");
        assert_eq!(
            entry.compression(),
            zip::CompressionMethod::Deflated,
            "Entry '{}' should be deflated",
            entry.name()
        );
    }
}

// ============================================================================
// Round Trips
// ============================================================================

#[test]
fn test_roundtrip_preserves_bytes() {
    let png: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0xFF, 0x12, 0x00,
    ];
    let tree = build_tree(&[
        ("mimetype", EPUB_MIMETYPE),
        ("META-INF/container.xml", b"<container/>"),
        ("OPS/content.opf", b"<package/>"),
        ("OPS/images/cover.png", png),
        ("OPS/text/chapter-1.xhtml", "<p>caf\u{e9}</p>".as_bytes()),
    ]);
    let out = TempDir::new().expect("Failed to create temp dir");
    let archive = out.path().join("book.epub");

    pack_archive(tree.path(), &archive).expect("Failed to pack");

    let extracted = out.path().join("extracted");
    extract_archive(&archive, &extracted).expect("Failed to extract");

    assert_eq!(
        read_tree(tree.path()),
        read_tree(&extracted),
        "Extracted tree should match the source byte for byte"
    );
}

#[test]
fn test_repack_is_byte_identical() {
    let tree = build_tree(&[
        ("mimetype", EPUB_MIMETYPE),
        ("META-INF/container.xml", b"<container/>"),
        ("OPS/content.opf", b"<package/>"),
        ("OPS/chapter-1.xhtml", b"<html><body><p>One</p></body></html>"),
    ]);
    let out = TempDir::new().expect("Failed to create temp dir");
    let first = out.path().join("first.epub");
    let second = out.path().join("second.epub");

    pack_archive(tree.path(), &first).expect("Failed to pack");

    let extracted = out.path().join("extracted");
    extract_archive(&first, &extracted).expect("Failed to extract");
    pack_archive(&extracted, &second).expect("Failed to repack");

    assert_eq!(
        fs::read(&first).expect("Failed to read first archive"),
        fs::read(&second).expect("Failed to read second archive"),
        "Packing an extracted tree should reproduce the archive exactly"
    );
}

#[test]
fn test_extract_handles_directory_entries() {
    // Many archives carry explicit directory entries; extraction should
    // create them rather than choke.
    let dir = TempDir::new().expect("Failed to create temp dir");
    let archive_path = dir.path().join("book.epub");

    let file = fs::File::create(&archive_path).expect("Failed to create archive");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    zip.add_directory("OPS", options)
        .expect("Failed to add directory entry");
    zip.start_file("OPS/chapter-1.xhtml", options)
        .expect("Failed to start entry");
    zip.write_all(b"<html/>").expect("Failed to write entry");
    zip.finish().expect("Failed to finish archive");

    let out = dir.path().join("out");
    extract_archive(&archive_path, &out).expect("Failed to extract");

    assert!(out.join("OPS").is_dir(), "Directory entry should be created");
    assert_eq!(
        fs::read(out.join("OPS").join("chapter-1.xhtml")).expect("Failed to read extracted file"),
        b"<html/>"
    );
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn prop_roundtrip_preserves_content_trees(
        files in prop::collection::btree_map(
            r"[a-z][a-z0-9]{0,7}\.[a-z]{1,5}",
            prop::collection::vec(any::<u8>(), 0..256),
            1..8usize
        )
    ) {
        let src = TempDir::new().expect("Failed to create temp dir");
        fs::write(src.path().join("mimetype"), EPUB_MIMETYPE).expect("Failed to write mimetype");
        let content_dir = src.path().join("OPS");
        fs::create_dir_all(&content_dir).expect("Failed to create content dir");
        for (name, data) in &files {
            fs::write(content_dir.join(name), data).expect("Failed to write file");
        }

        let out = TempDir::new().expect("Failed to create temp dir");
        let archive = out.path().join("book.epub");
        pack_archive(src.path(), &archive).expect("Failed to pack");

        let extracted = out.path().join("extracted");
        extract_archive(&archive, &extracted).expect("Failed to extract");

        prop_assert_eq!(read_tree(src.path()), read_tree(&extracted));
    }
}
