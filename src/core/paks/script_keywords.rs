//! Keyword census over shader, particle and trail scripts inside paks
//!
//! The tokenizer is deliberately loose: anything identifier-shaped inside
//! braces counts, so single-word asset names show up as keywords too.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use rayon::prelude::*;
use regex::Regex;
use regex::bytes::Regex as BytesRegex;

use super::{entry_names, find_paks, open_pak, read_entry};
use crate::cli::{AppContext, ScriptKeywordsArgs, ScriptKind};
use crate::infra::config::load_config;
use crate::infra::io::read_lines;
use crate::infra::utils::ProgressUtils;

static COMMENT: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"(?s-u)//[^\n]*|/\*.*?\*/").expect("valid comment regex"));

static TOKEN: LazyLock<BytesRegex> = LazyLock::new(|| {
    BytesRegex::new(r"(?-u)[{}]|[^\s{}]+[/\\][^\s{}]+|[a-zA-Z]\w*").expect("valid token regex")
});

/// Keyword counts of one script plus whether its braces balanced
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScriptCensus {
    pub keywords: BTreeMap<String, usize>,
    pub unexpected_close: bool,
    pub unclosed: bool,
}

pub fn count_keywords(text: &[u8], any_depth: bool) -> ScriptCensus {
    let text = COMMENT.replace_all(text, &b""[..]);
    let mut census = ScriptCensus::default();
    let mut depth = 0usize;

    for m in TOKEN.find_iter(&text) {
        match m.as_bytes() {
            b"{" => depth += 1,
            b"}" => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => census.unexpected_close = true,
            },
            token => {
                let counted = (any_depth || depth > 0)
                    && token.len() > 1
                    && !token.iter().any(|&b| b == b'/' || b == b'\\');
                if counted {
                    let kw = String::from_utf8_lossy(token).to_lowercase();
                    *census.keywords.entry(kw).or_insert(0) += 1;
                }
            }
        }
    }
    census.unclosed = depth != 0;
    census
}

/// Entries under `scripts/` ending in the kind's extension, any case
pub fn script_regex(kind: ScriptKind) -> Result<Regex> {
    Regex::new(&format!(r"(?i)^scripts/.*\.{}$", kind.extension())).context("Bad script regex")
}

/// (keyword, script, count) rows of one pak
pub fn scan_pak(pak: &Path, scripts: &Regex, any_depth: bool) -> Result<Vec<(String, String, usize)>> {
    let mut archive = open_pak(pak)?;
    let mut rows = Vec::new();
    for name in entry_names(&archive) {
        if !scripts.is_match(&name) {
            continue;
        }
        let text = match read_entry(&mut archive, &name) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Bad zip file {}: {e:#}", pak.display());
                continue;
            }
        };
        let census = count_keywords(&text, any_depth);
        if census.unexpected_close {
            tracing::warn!("Unexpected closing brace {} {name}", pak.display());
        }
        if census.unclosed {
            tracing::warn!("Unclosed brace {} {name}", pak.display());
        }
        for (kw, count) in census.keywords {
            rows.push((kw, name.clone(), count));
        }
    }
    Ok(rows)
}

/// Directories are searched for paks; files list one pak per line
pub fn collect_paks(paths: &[PathBuf], ignore_patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            out.extend(find_paks(&[path], ignore_patterns)?);
        } else {
            out.extend(
                read_lines(path)?
                    .into_iter()
                    .filter(|l| !l.is_empty())
                    .map(PathBuf::from),
            );
        }
    }
    Ok(out)
}

/// keyword → sorted (pak, script, count)
pub type Census = BTreeMap<String, Vec<(String, String, usize)>>;

pub fn census(paks: &[PathBuf], kind: ScriptKind, any_depth: bool, quiet: bool) -> Result<Census> {
    let scripts = script_regex(kind)?;
    let progress = ProgressUtils::bar(paks.len(), quiet, "reading scripts");
    let per_pak: Vec<(String, Vec<(String, String, usize)>)> = paks
        .par_iter()
        .filter_map(|pak| {
            let rows = scan_pak(pak, &scripts, any_depth);
            progress.inc(1);
            match rows {
                Ok(rows) => Some((pak.display().to_string(), rows)),
                Err(e) => {
                    tracing::warn!("{e:#}");
                    None
                }
            }
        })
        .collect();
    progress.finish_and_clear();

    let mut census = Census::new();
    for (pak, rows) in per_pak {
        for (kw, script, count) in rows {
            census.entry(kw).or_default().push((pak.clone(), script, count));
        }
    }
    for rows in census.values_mut() {
        rows.sort();
    }
    Ok(census)
}

pub fn render(census: &Census) -> String {
    let mut out = String::new();
    for (kw, rows) in census {
        out.push_str(kw);
        out.push('\n');
        for (pak, script, count) in rows {
            out.push_str(&format!("\t{pak} {script} {count}\n"));
        }
    }
    out
}

pub fn run(args: ScriptKeywordsArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;
    let paks = collect_paks(&args.paths, &config.ignore_patterns)?;
    tracing::info!("Searching {} paks", paks.len());
    if ctx.dry_run {
        println!("Would census .{} scripts in {} paks", args.kind.extension(), paks.len());
        return Ok(());
    }
    print!("{}", render(&census(&paks, args.kind, args.any_depth, ctx.quiet)?));
    Ok(())
}
