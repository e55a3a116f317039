//! Words that occur exactly once across a source tree
//!
//! Handy when renaming: a typo'd identifier usually shows up here.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use bstr::ByteSlice;
use itertools::Itertools;
use regex::bytes::Regex;

use crate::cli::{AppContext, UniqueWordsArgs};
use crate::infra::config::load_config;
use crate::infra::io::{read_file_smart, seems_binary};
use crate::infra::walk::FileWalker;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)\b[a-zA-Z_]\w+").expect("valid word regex"));

/// Relative path (forward slashes) and 1-based line
pub type Location = (String, usize);

#[derive(Debug, Default)]
pub struct WordIndex {
    /// `None` once a word is seen a second time
    words: HashMap<String, Option<Location>>,
}

impl WordIndex {
    pub fn add_text(&mut self, rel: &str, text: &[u8]) {
        for (ix, line) in text.lines().enumerate() {
            for m in WORD.find_iter(line) {
                let word = String::from_utf8_lossy(m.as_bytes()).into_owned();
                self.words
                    .entry(word)
                    .and_modify(|loc| *loc = None)
                    .or_insert_with(|| Some((rel.to_string(), ix + 1)));
            }
        }
    }

    /// Unique words ordered by location, dropping those under `excluded`
    pub fn unique(&self, excluded: &[String]) -> Vec<(&Location, &str)> {
        self.words
            .iter()
            .filter_map(|(word, loc)| loc.as_ref().map(|loc| (loc, word.as_str())))
            .filter(|(loc, _)| !excluded.iter().any(|p| loc.0.starts_with(p.as_str())))
            .sorted()
            .collect()
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Index every text file under `root/<subpath>`
pub fn index_tree(root: &Path, subpaths: &[String], ignore_patterns: &[String]) -> Result<WordIndex> {
    let mut ignores = ignore_patterns.to_vec();
    ignores.push("**/.git".to_string());
    let walker = FileWalker::new(&ignores)?;

    let mut index = WordIndex::default();
    for subpath in subpaths {
        let dir = root.join(subpath);
        if !dir.is_dir() {
            tracing::warn!("{} is not a directory", dir.display());
            continue;
        }
        for path in walker.walk_files(&dir) {
            let content = read_file_smart(&path)?;
            let bytes = content.as_ref();
            if seems_binary(bytes) {
                tracing::trace!("skipping binary {}", path.display());
                continue;
            }
            index.add_text(&relative(root, &path), bytes);
        }
    }
    Ok(index)
}

pub fn render(unique: &[(&Location, &str)]) -> String {
    unique
        .iter()
        .map(|((path, line), word)| format!("{:<50} {word}\n", format!("{path}:{line}")))
        .collect()
}

pub fn run(args: UniqueWordsArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;
    let settings = config.unique_words;
    let root = args.root.unwrap_or(settings.root);
    let subpaths = if args.subpaths.is_empty() { settings.subpaths } else { args.subpaths };
    let excludes = if args.excludes.is_empty() { settings.exclude_prefixes } else { args.excludes };

    if ctx.dry_run {
        println!("Would scan {} under {}", subpaths.join(", "), root.display());
        return Ok(());
    }

    let index = index_tree(&root, &subpaths, &config.ignore_patterns)?;
    print!("{}", render(&index.unique(&excludes)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_words_lose_their_location() {
        let mut index = WordIndex::default();
        index.add_text("src/a.cpp", b"int fooBar = 1;\nint x;\n");
        index.add_text("libs/b.h", b"// lonely_word\n");
        let unique = index.unique(&[]);
        let words: Vec<&str> = unique.iter().map(|(_, w)| *w).collect();
        assert_eq!(words, vec!["lonely_word", "fooBar"]);
        assert_eq!(unique[1].0, &("src/a.cpp".to_string(), 1));

        let kept = index.unique(&["libs".to_string()]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn walks_subpaths_and_skips_binaries() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/.git")).unwrap();
        std::fs::write(root.join("src/main.cpp"), "void Frob();\nvoid Frob() {}\nint Zap;\n").unwrap();
        std::fs::write(root.join("src/.git/HEAD"), "ref: refs/heads/master\n").unwrap();
        std::fs::write(root.join("src/blob.bin"), b"\x00\x01Hidden").unwrap();

        let index = index_tree(root, &["src".to_string()], &[]).unwrap();
        let out = render(&index.unique(&[]));
        assert_eq!(out, format!("{:<50} Zap\n{:<50} int\n", "src/main.cpp:3", "src/main.cpp:3"));
    }
}
