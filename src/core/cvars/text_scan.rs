//! Free-text fallback scan
//!
//! Finds identifier-shaped words matching a tracked name or display name in
//! every source file, markup and scripts included. A hit is dropped when the
//! AST already classified something at the same place; with
//! [`TextDedup::Line`] any classified occurrence on the line suppresses it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;

use super::ledger::{Ledger, Role};
use super::location::Occurrence;
use crate::infra::config::TextDedup;
use crate::infra::source_cache::SourceCache;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("valid word regex"));

/// Add `Text` occurrences to `ledger`; returns the number added
#[tracing::instrument(skip_all, fields(files = sources.len()))]
pub fn scan(
    ledger: &mut Ledger,
    sources: &BTreeSet<Utf8PathBuf>,
    cache: &mut SourceCache,
    dedup: TextDedup,
) -> Result<usize> {
    let keys = ledger.text_keys();

    // Per symbol: lines and exact positions the AST already claimed
    let mut claimed_lines: HashMap<&str, HashSet<(Utf8PathBuf, usize)>> = HashMap::new();
    let mut claimed_exact: HashMap<&str, HashSet<Occurrence>> = HashMap::new();
    for (name, rec) in &ledger.symbols {
        for (_, occ) in rec.ast_occurrences() {
            claimed_lines
                .entry(name.as_str())
                .or_default()
                .insert((occ.file.clone(), occ.line));
            claimed_exact.entry(name.as_str()).or_default().insert(occ.clone());
        }
    }

    let mut hits: Vec<(String, Occurrence)> = Vec::new();
    for src in sources {
        for (idx, line) in cache.lines(src)?.iter().enumerate() {
            for m in WORD.find_iter(line) {
                let Some(name) = keys.get(&m.as_str().to_lowercase()) else {
                    continue;
                };
                let at = Occurrence::new(src.clone(), idx + 1, m.start() + 1);
                let seen = match dedup {
                    TextDedup::Line => claimed_lines
                        .get(name.as_str())
                        .is_some_and(|s| s.contains(&(src.clone(), at.line))),
                    TextDedup::Exact => claimed_exact
                        .get(name.as_str())
                        .is_some_and(|s| s.contains(&at)),
                };
                if !seen {
                    hits.push((name.clone(), at));
                }
            }
        }
    }
    drop(claimed_lines);
    drop(claimed_exact);

    let added = hits.len();
    for (name, at) in hits {
        if let Some(rec) = ledger.symbols.get_mut(&name) {
            rec.add(Role::Text, at);
        }
    }
    Ok(added)
}

/// Whether some run of `path`'s components equals one of `dirs`, so a
/// relative `src/sgame` matches anywhere in an absolute path
pub fn in_any_dir(path: &Utf8Path, dirs: &[String]) -> bool {
    let parts: Vec<&str> = path.components().map(|c| c.as_str()).collect();
    dirs.iter().any(|d| {
        let want: Vec<&str> = Utf8Path::new(d).components().map(|c| c.as_str()).collect();
        !want.is_empty() && parts.windows(want.len()).any(|w| w == want.as_slice())
    })
}
