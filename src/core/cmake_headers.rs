//! Headers missing from CMake source lists
//!
//! Each check walks a header tree and looks for every header's
//! forward-slash path inside a CMake file, after `${VAR}` substitution.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cli::{AppContext, CmakeHeadersArgs};
use crate::infra::config::{CmakeCheck, load_config};
use crate::infra::utils::PathUtils;
use crate::infra::walk::FileWalker;

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audit {
    pub name: String,
    pub total: usize,
    pub missing: Vec<String>,
}

impl Audit {
    pub fn render(&self) -> String {
        let mut out = format!("Missing headers from {} (out of {}):\n", self.name, self.total);
        for h in &self.missing {
            out.push_str(&format!("  {h}\n"));
        }
        out
    }
}

/// `.h` files under `root` (any case) outside the ignored sub-paths, as
/// normalized forward-slash paths
pub fn headers(root: &str, ignore: &[String]) -> Result<Vec<String>> {
    let root = PathUtils::normalize(root);
    let ignore: Vec<String> = ignore
        .iter()
        .map(|i| PathUtils::normalize(root.join(i).as_str()).into_string())
        .collect();

    let walker = FileWalker::new(&[])?.with_extensions(&["h"]);
    Ok(walker
        .walk_files(&root)
        .into_iter()
        .map(|p| PathUtils::normalize(&p.to_string_lossy()).into_string())
        .filter(|h| !ignore.iter().any(|i| h.starts_with(i.as_str())))
        .collect())
}

/// Replace every `${KEY}` with its value
pub fn substitute(text: &str, substitutions: &BTreeMap<String, String>) -> String {
    substitutions
        .iter()
        .fold(text.to_string(), |acc, (k, v)| acc.replace(&format!("${{{k}}}"), v))
}

pub fn audit(check: &CmakeCheck) -> Result<Audit> {
    let hdrs = headers(&check.path.to_string_lossy(), &check.ignore)?;
    let cmake = std::fs::read_to_string(&check.cmake)
        .with_context(|| format!("Failed to read {}", check.cmake.display()))?;
    let cmake = substitute(&cmake, &check.substitutions);

    Ok(Audit {
        name: check.name.clone(),
        total: hdrs.len(),
        missing: hdrs.into_iter().filter(|h| !cmake.contains(h.as_str())).collect(),
    })
}

fn parse_substitution(raw: &str) -> Result<(String, String)> {
    let (k, v) = raw
        .split_once('=')
        .with_context(|| format!("Expected KEY=VALUE, got {raw:?}"))?;
    Ok((k.to_string(), v.to_string()))
}

/// The ad-hoc check from the command line, if one was given
fn adhoc_check(args: &CmakeHeadersArgs) -> Result<Option<CmakeCheck>> {
    let (Some(path), Some(cmake)) = (&args.path, &args.cmake) else {
        return Ok(None);
    };
    let substitutions = args
        .substitutions
        .iter()
        .map(|s| parse_substitution(s))
        .collect::<Result<_>>()?;
    Ok(Some(CmakeCheck {
        name: args.name.clone(),
        path: PathBuf::from(path),
        cmake: PathBuf::from(cmake),
        ignore: args.ignore.clone(),
        substitutions,
    }))
}

pub fn run(args: CmakeHeadersArgs, ctx: &AppContext) -> Result<()> {
    let checks = match adhoc_check(&args)? {
        Some(check) => vec![check],
        None => load_config()?.cmake.checks,
    };
    if checks.is_empty() {
        anyhow::bail!("No checks configured; add [[cmake.checks]] to enginekit.toml or pass --path/--cmake");
    }

    for check in &checks {
        if ctx.dry_run {
            println!("Would check {} against {}", check.path.display(), check.cmake.display());
            continue;
        }
        print!("{}", audit(check)?.render());
    }
    Ok(())
}
