//! compile_commands.json loading
//!
//! Each entry is reduced to a [`CompileUnit`]: the normalized source path,
//! the original argument vector, the arguments with driver-specific flags
//! stripped, and the include directories those arguments name.

use std::path::Path;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::infra::utils::PathUtils;

#[derive(Debug, Deserialize)]
struct RawEntry {
    directory: String,
    file: String,
    #[serde(default)]
    arguments: Option<Vec<String>>,
    #[serde(default)]
    command: Option<String>,
}

/// One compiler invocation, ready for parsing
#[derive(Debug, Clone)]
pub struct CompileUnit {
    pub source: Utf8PathBuf,
    pub directory: Utf8PathBuf,
    pub original_args: Vec<String>,
    pub args: Vec<String>,
    pub include_dirs: Vec<Utf8PathBuf>,
}

#[derive(Debug)]
pub struct CompilationDatabase {
    pub build_dir: Utf8PathBuf,
    // Keyed by normalized source; a file compiled twice keeps its last command
    entries: IndexMap<Utf8PathBuf, (Utf8PathBuf, Vec<String>)>,
}

impl CompilationDatabase {
    /// Load `<dir>/compile_commands.json`
    pub fn from_directory(dir: &Path) -> Result<Self> {
        let abs = dunce::canonicalize(dir)
            .with_context(|| format!("Build directory not found: {}", dir.display()))?;
        let build_dir = Utf8PathBuf::from_path_buf(abs)
            .map_err(|p| anyhow::anyhow!("Non UTF-8 build directory: {}", p.display()))?;
        let path = build_dir.join("compile_commands.json");
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read compilation database {path}"))?;
        Self::from_json(&build_dir, &text)
    }

    pub fn from_json(build_dir: &Utf8Path, text: &str) -> Result<Self> {
        let raw: Vec<RawEntry> =
            serde_json::from_str(text).context("Failed to parse compile_commands.json")?;

        let build_dir = PathUtils::normalize(build_dir.as_str());
        let mut entries = IndexMap::new();

        for entry in raw {
            let directory = PathUtils::resolve(&build_dir, &entry.directory);
            let source = PathUtils::resolve(&directory, &entry.file);
            let args = match (entry.arguments, entry.command) {
                (Some(args), _) => args,
                (None, Some(cmd)) => split_command(&cmd),
                (None, None) => {
                    tracing::warn!("compile command for {source} has no arguments");
                    continue;
                }
            };
            entries.insert(source, (directory, args));
        }

        Ok(Self { build_dir, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Units whose path contains `filter` and none of `exclude`. Resource
    /// compiler invocations are skipped.
    pub fn units(&self, filter: &str, exclude: &[String]) -> Vec<CompileUnit> {
        self.entries
            .iter()
            .filter(|(src, _)| !exclude.iter().any(|x| src.as_str().contains(x.as_str())))
            .filter(|(src, _)| src.as_str().contains(filter))
            .filter_map(|(src, (dir, args))| {
                let driver = args.first()?;
                if driver.ends_with("rc.exe") {
                    tracing::debug!("skipping resource compile of {src}");
                    return None;
                }
                let adjusted = adjust_arguments(args);
                Some(CompileUnit {
                    source: src.clone(),
                    directory: dir.clone(),
                    include_dirs: include_dirs(&adjusted, dir),
                    original_args: args.clone(),
                    args: adjusted,
                })
            })
            .collect()
    }
}

/// Flags the embedded frontend chokes on
fn driver_specific(arg: &str) -> bool {
    arg == "-TP" || arg == "/MP" || arg.starts_with("/F")
}

/// Drop the driver, everything from `-c` on, and driver-specific flags
pub fn adjust_arguments(args: &[String]) -> Vec<String> {
    let rest = args.get(1..).unwrap_or_default();
    let end = rest.iter().position(|a| a == "-c").unwrap_or(rest.len());
    rest[..end]
        .iter()
        .filter(|a| !driver_specific(a))
        .cloned()
        .collect()
}

/// Include directories named by `-I`, `/I` or `-iquote`, joined or separate
pub fn include_dirs(args: &[String], directory: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let value = ["-iquote", "-I", "/I"].iter().find_map(|flag| {
            let tail = arg.strip_prefix(flag)?;
            if tail.is_empty() {
                iter.next().map(String::as_str)
            } else {
                Some(tail)
            }
        });
        if let Some(dir) = value {
            let resolved = PathUtils::resolve(directory, dir.trim_matches('"'));
            if !out.contains(&resolved) {
                out.push(resolved);
            }
        }
    }
    out
}

/// Split a shell-style command string. Handles single and double quotes and
/// backslash escapes of quotes; other backslashes are kept so Windows paths
/// survive.
pub fn split_command(cmd: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = cmd.chars().peekable();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"') | None, '\\') if matches!(chars.peek(), Some('"' | '\\')) => {
                if let Some(next) = chars.next() {
                    cur.push(next);
                }
                in_word = true;
            }
            (Some(_), c) => cur.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    out.push(std::mem::take(&mut cur));
                    in_word = false;
                }
            }
            (None, c) => {
                cur.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        out.push(cur);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn adjust_strips_driver_and_compile_tail() {
        let args = strings(&["clang-cl", "/MP", "-TP", "/Fo:x.obj", "/Iinc", "-DX", "-c", "a.cpp"]);
        assert_eq!(adjust_arguments(&args), strings(&["/Iinc", "-DX"]));
    }

    #[test]
    fn adjust_without_compile_flag_keeps_everything() {
        let args = strings(&["c++", "-Isrc", "a.cpp"]);
        assert_eq!(adjust_arguments(&args), strings(&["-Isrc", "a.cpp"]));
    }

    #[test]
    fn include_dirs_joined_and_separate() {
        let args = strings(&["-I../src", "-iquote", "gen", "/I", "C:/sdk/include", "-Isrc"]);
        let dirs = include_dirs(&args, Utf8Path::new("/w/build"));
        assert_eq!(
            dirs,
            vec![
                Utf8PathBuf::from("/w/src"),
                Utf8PathBuf::from("/w/build/gen"),
                Utf8PathBuf::from("C:/sdk/include"),
                Utf8PathBuf::from("/w/build/src"),
            ]
        );
    }

    #[test]
    fn split_command_honours_quotes() {
        let parts = split_command(r#"c++ -DNAME="\"x y\"" '-Ia b' -c  src\main.cpp"#);
        assert_eq!(parts, strings(&["c++", r#"-DNAME="x y""#, "-Ia b", "-c", r"src\main.cpp"]));
    }

    #[test]
    fn last_entry_wins_and_filters_apply() {
        let json = r#"[
            {"directory": "/w/build", "file": "../src/a.cpp", "arguments": ["c++", "-O0", "-c", "a.cpp"]},
            {"directory": "/w/build", "file": "../libs/z.cpp", "arguments": ["c++", "-c", "z.cpp"]},
            {"directory": "/w/build", "file": "../src/res.rc", "arguments": ["C:/bin/rc.exe", "res.rc"]},
            {"directory": "/w/build", "file": "/w/src/a.cpp", "command": "c++ -O2 -c a.cpp"}
        ]"#;
        let db = CompilationDatabase::from_json(Utf8Path::new("/w/build"), json).unwrap();
        assert_eq!(db.len(), 3);

        let units = db.units("", &strings(&["libs/"]));
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].source, Utf8PathBuf::from("/w/src/a.cpp"));
        assert_eq!(units[0].args, strings(&["-O2"]));

        assert!(db.units("b.cpp", &[]).iter().all(|u| u.source.as_str().contains("b.cpp")));
    }
}
