//! Line-level patch builder rendering unified diffs
//!
//! A [`Patch`] keeps a working copy of every file it touches. Edits locate
//! their target by the line's content as it was when the sources were
//! parsed, so earlier deletions in the same file do not shift later ones.
//! Rendering diffs the working copy against the current disk content.

use std::fmt::Write as _;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use owo_colors::OwoColorize;
use similar::{ChangeTag, DiffOp, TextDiff};

use crate::infra::source_cache::SourceCache;

/// Prefix flagging a line that needs manual follow-up
pub const SENTINEL: &str = "XXX ";

/// A single hunk in a unified diff
#[derive(Debug, Clone)]
pub struct Hunk {
    pub old_start: usize, // 1-based, difflib convention for empty ranges
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<HunkLine>,
}

/// A line in a hunk with its change type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String), // Unchanged line (starts with ' ')
    Remove(String),  // Removed line (starts with '-')
    Add(String),     // Added line (starts with '+')
    /// A line that only gained the sentinel prefix
    Marked { old: String, new: String },
}

/// A complete patch for one file
#[derive(Debug, Clone)]
pub struct FilePatch {
    pub path: Utf8PathBuf,
    pub hunks: Vec<Hunk>,
}

/// Complete patch set
#[derive(Debug, Clone, Default)]
pub struct PatchSet {
    pub file_patches: Vec<FilePatch>,
}

impl PatchSet {
    pub fn is_empty(&self) -> bool {
        self.file_patches.is_empty()
    }
}

/// Output flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
    /// Exact unified diff, fit for `git apply`
    Plain,
    /// Colored for a terminal; marked lines shown as highlighted context
    Color,
}

#[derive(Debug, Clone)]
pub struct Patch {
    files: IndexMap<Utf8PathBuf, Vec<String>>,
    pub context: usize,
}

impl Patch {
    pub fn new(context: usize) -> Self {
        Self {
            files: IndexMap::new(),
            context,
        }
    }

    /// No file has been touched
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = &Utf8Path> {
        self.files.keys().map(Utf8PathBuf::as_path)
    }

    /// Working copy index of the parse-time line `line` of `path`
    fn locate(&mut self, cache: &mut SourceCache, path: &Utf8Path, line: usize) -> Result<Option<usize>> {
        let Some(content) = cache.line(path, line)? else {
            tracing::warn!("{path}:{line} is past the end of the parsed file; edit skipped");
            return Ok(None);
        };
        if !self.files.contains_key(path) {
            let disk = cache.disk_lines(path)?;
            self.files.insert(path.to_path_buf(), disk);
        }
        let Some(text) = self.files.get(path) else {
            return Ok(None);
        };

        let mut matches = text.iter().enumerate().filter(|(_, l)| **l == content);
        let Some((idx, _)) = matches.next() else {
            tracing::warn!("line {content:?} not found in {path}; edit skipped");
            return Ok(None);
        };
        if matches.next().is_some() {
            tracing::warn!("found multiple lines matching {content:?} in {path}, using the first");
        }
        Ok(Some(idx))
    }

    fn text_mut(&mut self, path: &Utf8Path) -> Option<&mut Vec<String>> {
        self.files.get_mut(path)
    }

    /// Delete a line plus the blank lines symmetric around it
    pub fn delete_line(&mut self, cache: &mut SourceCache, path: &Utf8Path, line: usize) -> Result<bool> {
        let Some(idx) = self.locate(cache, path, line)? else {
            return Ok(false);
        };
        if let Some(text) = self.text_mut(path) {
            let around = blank_run(text, idx);
            text.drain(idx - around..=idx + around);
        }
        Ok(true)
    }

    /// Replace a line's text
    pub fn replace_line(
        &mut self,
        cache: &mut SourceCache,
        path: &Utf8Path,
        line: usize,
        new_text: impl Into<String>,
    ) -> Result<bool> {
        let Some(idx) = self.locate(cache, path, line)? else {
            return Ok(false);
        };
        if let Some(text) = self.text_mut(path) {
            text[idx] = new_text.into();
        }
        Ok(true)
    }

    /// Replace a line with zero or more lines
    pub fn replace_line_with(
        &mut self,
        cache: &mut SourceCache,
        path: &Utf8Path,
        line: usize,
        new_lines: Vec<String>,
    ) -> Result<bool> {
        let Some(idx) = self.locate(cache, path, line)? else {
            return Ok(false);
        };
        if let Some(text) = self.text_mut(path) {
            text.splice(idx..=idx, new_lines);
        }
        Ok(true)
    }

    /// Prefix a line with [`SENTINEL`]
    pub fn mark_line(&mut self, cache: &mut SourceCache, path: &Utf8Path, line: usize) -> Result<bool> {
        let Some(idx) = self.locate(cache, path, line)? else {
            return Ok(false);
        };
        if let Some(text) = self.text_mut(path)
            && !text[idx].starts_with(SENTINEL)
        {
            text[idx] = format!("{SENTINEL}{}", text[idx]);
        }
        Ok(true)
    }

    /// Diff every touched file against its current disk content
    pub fn patch_set(&self, cache: &mut SourceCache) -> Result<PatchSet> {
        let mut file_patches = Vec::new();
        for (path, text) in &self.files {
            let disk = cache.disk_lines(path)?;
            let hunks = diff_hunks(&disk, text, self.context);
            if !hunks.is_empty() {
                file_patches.push(FilePatch {
                    path: path.clone(),
                    hunks,
                });
            }
        }
        Ok(PatchSet { file_patches })
    }

    pub fn render(&self, cache: &mut SourceCache, style: RenderStyle) -> Result<String> {
        Ok(render_unified_diff(&self.patch_set(cache)?, style))
    }
}

/// Count of blank lines to drop on each side of `idx`. Grows while the
/// lines one step further out on both sides exist and are blank.
pub fn blank_run(text: &[String], idx: usize) -> usize {
    let mut c = 0;
    while c < idx
        && idx + c + 1 < text.len()
        && text[idx - c - 1].trim().is_empty()
        && text[idx + c + 1].trim().is_empty()
    {
        c += 1;
    }
    c
}

/// Hunks between `old` and `new` with `context` lines of context
pub fn diff_hunks(old: &[String], new: &[String], context: usize) -> Vec<Hunk> {
    let old_refs: Vec<&str> = old.iter().map(String::as_str).collect();
    let new_refs: Vec<&str> = new.iter().map(String::as_str).collect();
    let diff = TextDiff::from_slices(&old_refs, &new_refs);

    diff.grouped_ops(context)
        .into_iter()
        .filter_map(|group| {
            let first: &DiffOp = group.first()?;
            let last: &DiffOp = group.last()?;
            let old_range = first.old_range().start..last.old_range().end;
            let new_range = first.new_range().start..last.new_range().end;

            let mut lines = Vec::new();
            for op in &group {
                for change in diff.iter_changes(op) {
                    let value = change.value().to_string();
                    lines.push(match change.tag() {
                        ChangeTag::Equal => HunkLine::Context(value),
                        ChangeTag::Delete => HunkLine::Remove(value),
                        ChangeTag::Insert => HunkLine::Add(value),
                    });
                }
            }

            Some(Hunk {
                old_start: range_start(old_range.start, old_range.len()),
                old_count: old_range.len(),
                new_start: range_start(new_range.start, new_range.len()),
                new_count: new_range.len(),
                lines: collapse_marks(lines),
            })
        })
        .collect()
}

fn range_start(start: usize, len: usize) -> usize {
    if len == 0 { start } else { start + 1 }
}

fn range_header(start: usize, count: usize) -> String {
    if count == 1 {
        start.to_string()
    } else {
        format!("{start},{count}")
    }
}

/// Turn a run of removals followed by the same lines with the sentinel
/// prepended into `Marked` lines. Only whole blocks collapse: when the
/// removal and addition counts differ, or any pair is more than a sentinel
/// prefix, the block stays as plain `Remove`/`Add` lines.
fn collapse_marks(lines: Vec<HunkLine>) -> Vec<HunkLine> {
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let removes = lines[i..]
            .iter()
            .take_while(|l| matches!(l, HunkLine::Remove(_)))
            .count();
        if removes == 0 {
            out.push(lines[i].clone());
            i += 1;
            continue;
        }
        let adds = lines[i + removes..]
            .iter()
            .take_while(|l| matches!(l, HunkLine::Add(_)))
            .count();

        let block = &lines[i..i + removes + adds];
        let pairs: Option<Vec<HunkLine>> = (removes == adds)
            .then(|| {
                (0..removes)
                    .map(|k| match (&block[k], &block[removes + k]) {
                        (HunkLine::Remove(old), HunkLine::Add(new))
                            if new.strip_prefix(SENTINEL) == Some(old.as_str()) =>
                        {
                            Some(HunkLine::Marked {
                                old: old.clone(),
                                new: new.clone(),
                            })
                        }
                        _ => None,
                    })
                    .collect()
            })
            .flatten();

        match pairs {
            Some(marked) => out.extend(marked),
            None => out.extend_from_slice(block),
        }
        i += removes + adds;
    }
    out
}

/// Render patch set as unified diff string
pub fn render_unified_diff(patch_set: &PatchSet, style: RenderStyle) -> String {
    let mut output = String::new();
    for file_patch in &patch_set.file_patches {
        render_file_patch(&mut output, file_patch, style);
    }
    output
}

fn render_file_patch(output: &mut String, file_patch: &FilePatch, style: RenderStyle) {
    let old = format!("--- {}", file_patch.path);
    let new = format!("+++ {}", file_patch.path);
    match style {
        RenderStyle::Plain => {
            let _ = writeln!(output, "{old}\n{new}");
        }
        RenderStyle::Color => {
            let _ = writeln!(output, "{}\n{}", old.bold(), new.bold());
        }
    }
    for hunk in &file_patch.hunks {
        render_hunk(output, hunk, style);
    }
}

fn render_hunk(output: &mut String, hunk: &Hunk, style: RenderStyle) {
    let header = format!(
        "@@ -{} +{} @@",
        range_header(hunk.old_start, hunk.old_count),
        range_header(hunk.new_start, hunk.new_count)
    );
    let color = style == RenderStyle::Color;

    if color {
        let _ = writeln!(output, "{}", header.cyan());
    } else {
        let _ = writeln!(output, "{header}");
    }

    for line in &hunk.lines {
        let _ = match (line, color) {
            (HunkLine::Context(content), _) => writeln!(output, " {content}"),
            (HunkLine::Remove(content), false) => writeln!(output, "-{content}"),
            (HunkLine::Remove(content), true) => writeln!(output, "{}", format!("-{content}").red()),
            (HunkLine::Add(content), false) => writeln!(output, "+{content}"),
            (HunkLine::Add(content), true) => writeln!(output, "{}", format!("+{content}").green()),
            (HunkLine::Marked { old, new }, false) => writeln!(output, "-{old}\n+{new}"),
            (HunkLine::Marked { new, .. }, true) => writeln!(output, "{}", format!(" {new}").yellow()),
        };
    }
}
