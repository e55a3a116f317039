//! Filepath: src/infra/walk.rs
//! Directory walker shared by every scanner.
//!
//! Engine trees are scanned as they sit on disk: `.gitignore` and friends
//! are not consulted, dotfiles are visited and symlinks are not followed.
//! Callers narrow the walk with ignore globs and an extension list.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};

/// Sorted file lister for one root at a time
pub struct FileWalker
{
    /// Directories matching are pruned; files are matched on their path
    /// relative to the root
    skip: GlobSet,

    /// Lower-cased, dot-less extensions; empty keeps every file
    extensions: Vec<String>,
}

impl FileWalker
{
    /// Walker skipping anything matched by `skip_globs` (e.g. "**/.git")
    pub fn new(skip_globs: &[String]) -> Result<Self>
    {
        let mut set = GlobSetBuilder::new();
        for glob in skip_globs
        {
            set.add(Glob::new(glob)?);
        }

        Ok(Self {
            skip: set.build()?,
            extensions: Vec::new(),
        })
    }

    /// Keep only files whose extension is one of `extensions`, ignoring
    /// case and any leading dot
    pub fn with_extensions<S: AsRef<str>>(
        mut self,
        extensions: &[S],
    ) -> Self
    {
        self.extensions = extensions
            .iter()
            .map(|e| {
                e.as_ref()
                    .trim_start_matches('.')
                    .to_ascii_lowercase()
            })
            .collect();
        self
    }

    fn builder(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);
        b.standard_filters(false);
        b.follow_links(false);

        let skip = self
            .skip
            .clone();
        b.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent
                .file_type()
                .is_some_and(|ft| ft.is_dir());
            !(is_dir && skip.is_match(ent.path()))
        });
        b
    }

    fn wanted(
        &self,
        root: &Path,
        path: &Path,
    ) -> bool
    {
        let ext_ok = self
            .extensions
            .is_empty()
            || path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| {
                    self.extensions
                        .iter()
                        .any(|want| want.eq_ignore_ascii_case(e))
                });
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path);
        ext_ok && !self
            .skip
            .is_match(rel)
    }

    /// Regular files under `root`, sorted. Unreadable entries are logged
    /// at debug level and left out.
    pub fn walk_files<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<PathBuf>
    {
        let root = root.as_ref();
        let mut files: Vec<PathBuf> = self
            .builder(root)
            .build()
            .filter_map(|res| {
                res.map_err(|err| tracing::debug!("skipping entry under {}: {err}", root.display()))
                    .ok()
            })
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|ft| ft.is_file())
            })
            .map(DirEntry::into_path)
            .filter(|p| self.wanted(root, p))
            .collect();

        files.sort();
        files
    }
}
