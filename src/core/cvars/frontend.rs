//! Parallel parse of translation units
//!
//! Two passes on a bounded pool: include closures per unit, then one parse
//! per distinct file. Any failure aborts with [`CvarError::ParseFailed`]
//! naming the unit's command lines; grammar errors only warn.

use std::collections::{BTreeSet, HashSet};

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use rayon::prelude::*;

use super::error::CvarError;
use crate::core::compdb::CompileUnit;
use crate::infra::config::CvarsConfig;
use crate::infra::utils::ProgressUtils;
use crate::parsers::cpp_parser::{CppParser, ParsedFile, ParsedUnit, include_closure};

fn parse_failed(unit: &CompileUnit, reason: String) -> anyhow::Error {
    CvarError::ParseFailed {
        source_file: unit.source.clone(),
        reason,
        original_args: unit.original_args.clone(),
        adjusted_args: unit.args.clone(),
    }
    .into()
}

/// Whether a diagnostic is on the allow-list
pub fn is_benign(message: &str, benign: &[String]) -> bool {
    benign.iter().any(|b| message.contains(b.as_str()))
}

/// Parse every file reachable from `units` inside `sources`. Each distinct
/// file is parsed once; output order follows first discovery.
#[tracing::instrument(skip_all, fields(units = units.len(), jobs = jobs))]
pub fn parse_units(
    units: &[CompileUnit],
    sources: &BTreeSet<Utf8PathBuf>,
    cfg: &CvarsConfig,
    jobs: usize,
    quiet: bool,
) -> Result<Vec<ParsedFile>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to build parser thread pool")?;
    let known: HashSet<Utf8PathBuf> = sources.iter().cloned().collect();

    let progress = ProgressUtils::bar(units.len(), quiet, "include closures");
    let closures: Vec<Result<ParsedUnit>> = pool.install(|| {
        units
            .par_iter()
            .map(|unit| {
                let closure = include_closure(&unit.source, &unit.include_dirs, &known)
                    .map_err(|e| parse_failed(unit, format!("{e:#}")));
                progress.inc(1);
                closure
            })
            .collect()
    });
    progress.finish_and_clear();

    // First unit to reach a file owns it for error reporting
    let mut owners: IndexMap<Utf8PathBuf, &CompileUnit> = IndexMap::new();
    for (unit, closure) in units.iter().zip(closures) {
        for file in closure?.files {
            owners.entry(file).or_insert(unit);
        }
    }
    let work: Vec<(Utf8PathBuf, &CompileUnit)> = owners.into_iter().collect();
    tracing::info!("parsing {} files from {} units", work.len(), units.len());

    let parser = CppParser::new();
    let progress = ProgressUtils::bar(work.len(), quiet, "parsing");
    let parsed: Vec<Result<ParsedFile>> = pool.install(|| {
        work.par_iter()
            .map(|(path, unit)| {
                let file = match parser.parse_path(path) {
                    Ok(Some(file)) => Ok(file),
                    Ok(None) => Err(parse_failed(unit, format!("{path}: no syntax tree"))),
                    Err(e) => Err(parse_failed(unit, format!("{e:#}"))),
                };
                progress.inc(1);
                file
            })
            .collect()
    });
    progress.finish_and_clear();

    let mut files = Vec::with_capacity(parsed.len());
    for file in parsed {
        let file = file?;
        for diag in CppParser::diagnostics(&file) {
            if is_benign(&diag.message, &cfg.benign_diagnostics) {
                tracing::trace!("suppressed {diag}");
            } else {
                tracing::warn!("{diag}");
            }
        }
        files.push(file);
    }
    Ok(files)
}
