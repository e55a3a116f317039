//! Asset pak scanners
//!
//! Paks are zip archives named `*.pk3` or `*.dpk`. Discovery walks the
//! given directories in sorted order; archives that fail to open are
//! logged and skipped by every scanner.

pub mod bsp;
pub mod dup_paks;
pub mod map_entities;
pub mod script_keywords;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use zip::ZipArchive;

use crate::infra::walk::FileWalker;

pub const PAK_EXTENSIONS: [&str; 2] = ["pk3", "dpk"];

/// Paks under every root, roots in argument order
pub fn find_paks<P: AsRef<Path>>(roots: &[P], ignore_patterns: &[String]) -> Result<Vec<PathBuf>> {
    let walker = FileWalker::new(ignore_patterns)?.with_extensions(&PAK_EXTENSIONS);
    let mut out = Vec::new();
    for root in roots {
        let root = root.as_ref();
        if !root.is_dir() {
            tracing::warn!("{} is not a directory", root.display());
            continue;
        }
        out.extend(walker.walk_files(root));
    }
    tracing::info!("Searching {} paks", out.len());
    Ok(out)
}

pub fn open_pak(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).with_context(|| format!("Couldn't open {}", path.display()))?;
    ZipArchive::new(file).with_context(|| format!("Bad zip header in {}", path.display()))
}

/// Entry names in archive order
pub fn entry_names(archive: &ZipArchive<File>) -> Vec<String> {
    archive.file_names().map(str::to_string).collect()
}

/// Whole contents of one entry
pub fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("Bad zip entry {name}"))?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut buf)
        .with_context(|| format!("Failed to read {name}"))?;
    Ok(buf)
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::io::Write;
    use std::path::Path;

    use zip::write::SimpleFileOptions;

    /// Write a zip at `path` holding `(name, bytes)` entries
    pub fn write_pak(path: &Path, entries: &[(&str, &[u8])]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, bytes) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_paks_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        testutil::write_pak(&dir.path().join("b/map-a.PK3"), &[("x.txt", b"x")]);
        testutil::write_pak(&dir.path().join("a.dpk"), &[("y.txt", b"y")]);
        std::fs::write(dir.path().join("notes.zip"), "").unwrap();

        let found = find_paks(&[dir.path()], &[]).unwrap();
        assert_eq!(found, vec![dir.path().join("a.dpk"), dir.path().join("b/map-a.PK3")]);

        let mut archive = open_pak(&found[0]).unwrap();
        assert_eq!(entry_names(&archive), vec!["y.txt"]);
        assert_eq!(read_entry(&mut archive, "y.txt").unwrap(), b"y");
    }

    #[test]
    fn bad_zip_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pk3");
        std::fs::write(&path, "not a zip").unwrap();
        let err = open_pak(&path).unwrap_err();
        assert!(err.to_string().contains("Bad zip header"));
    }
}
