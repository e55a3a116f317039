//! Filepath: src/parsers/cpp_parser.rs
//!
//! C++ front end for the cvar ledger. Files are parsed one at a time with
//! tree-sitter-cpp; a translation unit is modelled as its compiled source
//! plus the closure of the quoted `#include`s that land inside the known
//! source set. Macros are not expanded, so grammar errors around macro
//! heavy declarations are reported as diagnostics rather than failures.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tree_sitter::{Language, Node, Parser, Tree};

use crate::infra::utils::TsNodeUtils;

static QUOTED_INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*"([^"]+)""#).expect("valid include regex")
});

/// One parsed source file
#[derive(Debug)]
pub struct ParsedFile {
    pub path: Utf8PathBuf,
    pub source: String,
    pub tree: Tree,
}

impl ParsedFile {
    pub fn bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    /// 1-based line text, empty when out of range
    pub fn line(&self, line: usize) -> &str {
        line.checked_sub(1)
            .and_then(|i| self.source.lines().nth(i))
            .unwrap_or("")
    }
}

/// A compiled source and the files it pulls in, main file first
#[derive(Debug, Clone)]
pub struct ParsedUnit {
    pub source: Utf8PathBuf,
    pub files: Vec<Utf8PathBuf>,
}

/// Grammar error found in a parsed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: Utf8PathBuf,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}: {}", self.path, self.line, self.column, self.message)
    }
}

pub struct CppParser {
    language: Language,
}

impl Default for CppParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CppParser {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_cpp::LANGUAGE.into(),
        }
    }

    /// Parse `source`; `None` when tree-sitter produces no tree
    pub fn parse(&self, path: &Utf8Path, source: String) -> Option<ParsedFile> {
        // Parser is !Sync; one per call keeps this usable from rayon workers
        let mut parser = Parser::new();
        parser.set_language(&self.language).ok()?;
        let tree = parser.parse(&source, None)?;
        Some(ParsedFile {
            path: path.to_path_buf(),
            source,
            tree,
        })
    }

    /// Read and parse `path`. Read errors are returned; an absent tree is `Ok(None)`.
    pub fn parse_path(&self, path: &Utf8Path) -> Result<Option<ParsedFile>> {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {path}"))?;
        let source = String::from_utf8_lossy(&bytes).into_owned();
        Ok(self.parse(path, source))
    }

    /// Grammar errors in `file`, outermost error node only
    pub fn diagnostics(file: &ParsedFile) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        let root = file.tree.root_node();
        if root.has_error() {
            collect_errors(file, root, &mut out);
        }
        out
    }
}

fn collect_errors(file: &ParsedFile, node: Node, out: &mut Vec<Diagnostic>) {
    if node.is_error() || node.is_missing() {
        let (line, column) = TsNodeUtils::start_1based(node);
        let message = if node.is_missing() {
            format!("missing `{}`: {}", node.kind(), file.line(line).trim())
        } else {
            format!("syntax error: {}", file.line(line).trim())
        };
        out.push(Diagnostic {
            path: file.path.clone(),
            line,
            column,
            message,
        });
        return;
    }
    if !node.has_error() {
        return;
    }
    for child in TsNodeUtils::children(node) {
        collect_errors(file, child, out);
    }
}

/// Quoted `#include` targets in source order
pub fn quoted_includes(text: &str) -> Vec<String> {
    QUOTED_INCLUDE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Compute the include closure of `source` restricted to `known`. Each
/// include is resolved against the including file's directory first, then
/// against `include_dirs` in order; the first candidate in `known` wins.
pub fn include_closure(
    source: &Utf8Path,
    include_dirs: &[Utf8PathBuf],
    known: &HashSet<Utf8PathBuf>,
) -> Result<ParsedUnit> {
    let mut seen: BTreeSet<Utf8PathBuf> = BTreeSet::new();
    let mut files = vec![source.to_path_buf()];
    let mut queue = VecDeque::from([source.to_path_buf()]);
    seen.insert(source.to_path_buf());

    while let Some(file) = queue.pop_front() {
        let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {file}"))?;
        let text = String::from_utf8_lossy(&bytes);
        let here = file.parent().unwrap_or(Utf8Path::new(""));

        for inc in quoted_includes(&text) {
            let resolved = std::iter::once(here)
                .chain(include_dirs.iter().map(Utf8PathBuf::as_path))
                .map(|dir| crate::infra::utils::PathUtils::resolve(dir, &inc))
                .find(|cand| known.contains(cand));

            if let Some(path) = resolved
                && seen.insert(path.clone())
            {
                files.push(path.clone());
                queue.push_back(path);
            }
        }
    }

    Ok(ParsedUnit {
        source: source.to_path_buf(),
        files,
    })
}
