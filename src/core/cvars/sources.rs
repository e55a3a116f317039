//! The fixed "all sources" set
//!
//! Every compiled file names a source root: its nearest ancestor directory
//! called `src` (configurable). The set is every file under those roots with
//! a scanned extension, plus the UI asset directory of each checkout that
//! has a `pkg` sibling.

use std::collections::BTreeSet;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};

use crate::infra::config::CvarsConfig;
use crate::infra::utils::PathUtils;
use crate::infra::walk::FileWalker;

/// Nearest ancestor of `file` named `root_name`
pub fn source_root(file: &Utf8Path, root_name: &str) -> Option<Utf8PathBuf> {
    file.ancestors()
        .skip(1)
        .find(|a| a.file_name() == Some(root_name))
        .map(Utf8Path::to_path_buf)
}

/// Directories to scan for the given compiled files
pub fn source_dirs(compiled: &[Utf8PathBuf], cfg: &CvarsConfig) -> BTreeSet<Utf8PathBuf> {
    let mut dirs = BTreeSet::new();
    for file in compiled {
        let Some(root) = source_root(file, &cfg.source_root) else {
            tracing::debug!("{file} has no {} ancestor", cfg.source_root);
            continue;
        };
        if let Some(checkout) = root.parent()
            && checkout.join(&cfg.asset_marker).exists()
        {
            dirs.insert(checkout.join(&cfg.asset_dir));
        }
        dirs.insert(root);
    }
    dirs
}

/// All scanned files, normalized and sorted
#[tracing::instrument(skip_all, fields(files = compiled.len()))]
pub fn all_sources(
    compiled: &[Utf8PathBuf],
    cfg: &CvarsConfig,
    ignore_patterns: &[String],
) -> Result<BTreeSet<Utf8PathBuf>> {
    let walker = FileWalker::new(ignore_patterns)?.with_extensions(&cfg.extensions);
    let mut out = BTreeSet::new();
    for dir in source_dirs(compiled, cfg) {
        if !dir.is_dir() {
            continue;
        }
        for path in walker.walk_files(&dir) {
            match PathUtils::from_std(&path) {
                Some(p) => {
                    out.insert(p);
                }
                None => tracing::warn!("skipping non UTF-8 path {}", path.display()),
            }
        }
    }
    tracing::debug!("{} files in the source set", out.len());
    Ok(out)
}
