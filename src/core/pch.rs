//! Precompiled-header include checker
//!
//! Every `.cpp` must include the precompiled header exactly once, as its
//! first `#include`.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;

use crate::cli::{AppContext, PchCheckArgs};
use crate::infra::config::load_config;
use crate::infra::io::read_lines;
use crate::infra::walk::FileWalker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problem {
    NotIncluded,
    MultiplyIncluded,
    NotFirst,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Problem::NotIncluded => "Not included",
            Problem::MultiplyIncluded => "Multiply included",
            Problem::NotFirst => "Not first",
        })
    }
}

/// Case-insensitive match of the header name at a word boundary
pub fn header_regex(header: &str) -> Result<Regex> {
    Regex::new(&format!(r"\b{}", regex::escape(&header.to_lowercase())))
        .with_context(|| format!("Bad header name {header}"))
}

/// Problem with the include lines of one file, if any
pub fn check_lines<S: AsRef<str>>(lines: &[S], header: &Regex) -> Option<Problem> {
    let hits: Vec<usize> = lines
        .iter()
        .map(|l| l.as_ref())
        .filter(|l| l.contains("#include"))
        .enumerate()
        .filter(|(_, l)| header.is_match(&l.to_lowercase()))
        .map(|(i, _)| i)
        .collect();

    match hits.as_slice() {
        [] => Some(Problem::NotIncluded),
        [0] => None,
        [_] => Some(Problem::NotFirst),
        _ => Some(Problem::MultiplyIncluded),
    }
}

/// Offending `.cpp` files under `root`, sorted by path
#[tracing::instrument(skip(ignore_patterns))]
pub fn scan(root: &Path, header: &str, ignore_patterns: &[String]) -> Result<Vec<(PathBuf, Problem)>> {
    let re = header_regex(header)?;
    let walker = FileWalker::new(ignore_patterns)?.with_extensions(&["cpp"]);
    let mut out = Vec::new();
    for path in walker.walk_files(root) {
        let lines = read_lines(&path)?;
        if let Some(problem) = check_lines(&lines, &re) {
            out.push((path, problem));
        }
    }
    Ok(out)
}

pub fn run(args: PchCheckArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;
    let root = args.path.unwrap_or(config.pch.src);
    let header = args.header.unwrap_or(config.pch.header);

    if !root.is_dir() {
        anyhow::bail!("Source root not found: {}", root.display());
    }
    if ctx.dry_run {
        println!("Would check {} for {header}", root.display());
        return Ok(());
    }

    for (path, problem) in scan(&root, &header, &config.ignore_patterns)? {
        println!("{problem:<25} {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re() -> Regex {
        header_regex("common.h").unwrap()
    }

    #[test]
    fn classifies_include_order() {
        assert_eq!(check_lines(&["#include \"common/Common.h\"", "#include <vector>"], &re()), None);
        assert_eq!(
            check_lines(&["int x;", "#include <vector>", "#include \"Common.h\""], &re()),
            Some(Problem::NotFirst)
        );
        assert_eq!(
            check_lines(&["#include \"common.h\"", "#include \"common.h\""], &re()),
            Some(Problem::MultiplyIncluded)
        );
        assert_eq!(check_lines(&["#include \"notcommon.h\""], &re()), Some(Problem::NotIncluded));
    }

    #[test]
    fn padded_display() {
        assert_eq!(format!("{:<25}|", Problem::NotFirst), "Not first                |");
    }

    #[test]
    fn scans_cpp_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.cpp"), "#include \"common.h\"\n").unwrap();
        std::fs::write(dir.path().join("B.CPP"), "#include <map>\n").unwrap();
        std::fs::write(dir.path().join("c.h"), "int c;\n").unwrap();

        let found = scan(dir.path(), "common.h", &[]).unwrap();
        assert_eq!(found, vec![(dir.path().join("B.CPP"), Problem::NotIncluded)]);
    }
}
