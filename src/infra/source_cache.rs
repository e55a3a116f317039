//! Per-run source line cache.
//!
//! Occurrences point at lines as they were when the sources were parsed, so
//! `lines` always serves the first read of a file. `disk_lines` serves the
//! same snapshot unless the cache was built for interactive apply mode, in
//! which case every call re-reads the file so edits made by the operator
//! between patches are picked up.

use std::collections::HashMap;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};

use crate::infra::io::read_lines;

#[derive(Debug, Default)]
pub struct SourceCache {
    texts: HashMap<Utf8PathBuf, Vec<String>>,
    reread_disk: bool,
}

impl SourceCache {
    pub fn new(reread_disk: bool) -> Self {
        Self { texts: HashMap::new(), reread_disk }
    }

    /// Cached lines of `path`, read on first use
    pub fn lines(&mut self, path: &Utf8Path) -> Result<&[String]> {
        if !self.texts.contains_key(path) {
            let lines = read_lines(path)?;
            self.texts.insert(path.to_path_buf(), lines);
        }
        Ok(self
            .texts
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// 1-based line of `path` from the cached snapshot
    pub fn line(&mut self, path: &Utf8Path, line: usize) -> Result<Option<String>> {
        let lines = self.lines(path)?;
        Ok(line
            .checked_sub(1)
            .and_then(|i| lines.get(i))
            .cloned())
    }

    /// Current content of `path` as the patch baseline
    pub fn disk_lines(&mut self, path: &Utf8Path) -> Result<Vec<String>> {
        if self.reread_disk {
            return read_lines(path);
        }
        Ok(self.lines(path)?.to_vec())
    }

    /// Seed the cache with already-read text
    pub fn insert(&mut self, path: Utf8PathBuf, text: &str) {
        self.texts
            .entry(path)
            .or_insert_with(|| text.lines().map(str::to_string).collect());
    }
}
