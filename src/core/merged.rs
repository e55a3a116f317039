//! Branch merge checker
//!
//! Rebased commits get new hashes, so landing is judged by one-line
//! summary: each commit on `base..feature` is looked up in `git log base`.

use std::collections::HashMap;

use anyhow::Result;

use crate::cli::{AppContext, MergedArgs};
use crate::core::git::log_summaries;
use crate::infra::config::load_config;

/// Where a feature commit was found on the base branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landing {
    pub summary: String,
    /// Distance from the base tip, `None` when absent
    pub index: Option<usize>,
}

impl Landing {
    pub fn location(&self) -> String {
        match self.index {
            Some(i) => format!("~{i}"),
            None => "not found".to_string(),
        }
    }
}

/// Match `commits` (oldest first) against `base_log` (newest first). The
/// first, newest occurrence of a summary wins.
pub fn search(commits: &[String], base_log: &[String]) -> Vec<Landing> {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    for (i, summary) in base_log.iter().enumerate() {
        first_seen.entry(summary.as_str()).or_insert(i);
    }
    commits
        .iter()
        .map(|summary| Landing {
            summary: summary.clone(),
            index: first_seen.get(summary.as_str()).copied(),
        })
        .collect()
}

pub fn run(args: MergedArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;
    let base = args.base.unwrap_or(config.merged.base);
    let max = config.merged.max_commits;
    let range = format!("{base}..{}", args.feature);

    if ctx.dry_run {
        println!("Would compare {range} in {}", args.repo.display());
        return Ok(());
    }

    let limit = format!("-{}", max + 1);
    let mut commits = log_summaries(&args.repo, &[limit.as_str(), range.as_str()])?;
    if commits.len() > max {
        anyhow::bail!("more than {max} commits found. Wrong base branch?");
    }
    commits.reverse();

    let base_log = log_summaries(&args.repo, &[base.as_str()])?;
    for landing in search(&commits, &base_log) {
        println!("{:<12} {}", landing.location(), landing.summary);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn finds_rebased_summaries() {
        let commits = strings(&["Add foo", "Fix bar", "WIP"]);
        let base = strings(&["Fix bar", "Unrelated", "Add foo", "Fix bar"]);
        let found = search(&commits, &base);

        assert_eq!(found[0].index, Some(2));
        assert_eq!(found[1].index, Some(0));
        assert_eq!(found[2].location(), "not found");
        assert_eq!(format!("{:<12} {}", found[0].location(), found[0].summary), "~2           Add foo");
    }
}
