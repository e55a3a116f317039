//! Cvar usage ledger
//!
//! Parses every translation unit in a compilation database, records where
//! each console variable is declared, registered, read and written, adds
//! free-text mentions from markup and scripts, then per symbol prints a
//! listing and either a removal patch (dead symbols) or a migration patch
//! (live symbols, `--migrate`).

pub mod classify;
pub mod error;
pub mod frontend;
pub mod ledger;
pub mod location;
pub mod review;
pub mod rewrite;
pub mod sources;
pub mod text_scan;
pub mod walker;

use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;
use camino::Utf8PathBuf;

pub use classify::{LivePolicy, Verdict, classify};
pub use error::CvarError;
pub use ledger::{Ledger, Role, SymbolRecord};
pub use location::Occurrence;
use review::{GitApplier, Outcome, PatchSink, Printer, Reviewer};
use rewrite::{Migration, removal_patch};

use crate::cli::{AppContext, CvarsArgs};
use crate::core::compdb::CompilationDatabase;
use crate::core::patch::RenderStyle;
use crate::infra::config::{CvarsConfig, load_config};
use crate::infra::source_cache::SourceCache;

/// Inputs of one analysis
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub build_dir: PathBuf,
    pub file_filter: String,
    pub jobs: usize,
    pub text_scan: bool,
    pub quiet: bool,
    /// Re-read files for every patch baseline (interactive apply)
    pub reread_disk: bool,
}

/// The finished ledger with the files it points into
pub struct Analysis {
    pub ledger: Ledger,
    pub sources: BTreeSet<Utf8PathBuf>,
    pub cache: SourceCache,
}

/// Build the ledger: compile database, source set, parse, walk, text scan
#[tracing::instrument(skip_all, fields(build_dir = %opts.build_dir.display()))]
pub fn analyze(cfg: &CvarsConfig, ignore_patterns: &[String], opts: &AnalyzeOptions) -> Result<Analysis> {
    let db = CompilationDatabase::from_directory(&opts.build_dir)?;
    let units = db.units(&opts.file_filter, &cfg.exclude_paths);
    if units.is_empty() {
        tracing::warn!("no translation units selected out of {}", db.len());
    }

    let compiled: Vec<Utf8PathBuf> = units.iter().map(|u| u.source.clone()).collect();
    let sources = sources::all_sources(&compiled, cfg, ignore_patterns)?;
    let files = frontend::parse_units(&units, &sources, cfg, opts.jobs, opts.quiet)?;

    let mut cache = SourceCache::new(opts.reread_disk);
    for file in &files {
        cache.insert(file.path.clone(), &file.source);
    }

    let mut ledger = Ledger::new();
    for finding in walker::walk_all(&files, cfg)? {
        ledger.record(finding);
    }
    drop(files);
    ledger.resolve_writes();

    if opts.text_scan {
        let added = text_scan::scan(&mut ledger, &sources, &mut cache, cfg.text_dedup)?;
        tracing::debug!("{added} free-text mentions");
    }
    ledger.scrub_table_lines();
    tracing::info!("{} cvars tracked", ledger.symbols.len());

    Ok(Analysis {
        ledger,
        sources,
        cache,
    })
}

/// Per-symbol reporting knobs
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub cvar_filter: String,
    pub migrate: bool,
    pub context: usize,
}

impl Analysis {
    /// Names selected for reporting: matching the filter and used from at
    /// least one `.cpp` file
    pub fn selected(&self, filter: &str) -> Result<Vec<&str>> {
        let filter = filter.to_lowercase();
        let mut out = Vec::new();
        for (name, rec) in &self.ledger.symbols {
            if !name.to_lowercase().contains(&filter) {
                continue;
            }
            let mut in_cpp = false;
            for (_, occ) in rec.ast_occurrences() {
                if !self.sources.contains(&occ.file) {
                    return Err(CvarError::LocationOutsideSources {
                        path: occ.file.clone(),
                    }
                    .into());
                }
                in_cpp |= occ.file.extension() == Some("cpp");
            }
            if in_cpp {
                out.push(name.as_str());
            }
        }
        Ok(out)
    }
}

/// Name, quoted display names, one tagged line per occurrence
pub fn listing(name: &str, rec: &SymbolRecord, cache: &mut SourceCache) -> Result<String> {
    let mut out = name.to_string();
    for display in &rec.display_names {
        out.push_str(&format!(" \"{display}\""));
    }
    out.push('\n');
    for (role, occ) in rec.all_occurrences() {
        let text = cache.line(&occ.file, occ.line)?.unwrap_or_default();
        out.push_str(&format!("{} {} {}\n", role.tag(), occ, text.trim()));
    }
    Ok(out)
}

/// List, classify and patch every selected symbol through `sink`
pub fn report(
    analysis: &mut Analysis,
    cfg: &CvarsConfig,
    opts: &ReportOptions,
    sink: &mut dyn PatchSink,
) -> Result<()> {
    let policy = LivePolicy {
        live_flags: cfg.live_flags.clone(),
        live_text_dirs: cfg.live_text_dirs.clone(),
    };
    let names: Vec<String> = analysis
        .selected(&opts.cvar_filter)?
        .into_iter()
        .map(str::to_string)
        .collect();
    let Analysis { ledger, cache, .. } = analysis;

    for name in &names {
        let Some(rec) = ledger.get(name) else { continue };
        sink.emit(&listing(name, rec, cache)?)?;

        let verdict = classify(rec, &policy);
        if let Some(banner) = verdict.banner() {
            sink.emit(&format!("{banner}\n"))?;
        }

        let outcome = match (opts.migrate, verdict) {
            (false, Verdict::Dead) => {
                let mut patch = removal_patch(rec, cache, opts.context)?;
                sink.removal(&mut patch, cache)?
            }
            (true, Verdict::Live | Verdict::ProbablyLive) => {
                let mut migration = Migration::new(name, rec);
                sink.migration(&mut migration, cfg, cache, opts.context)?
            }
            _ => Outcome::Skipped,
        };
        sink.emit("\n")?;
        if outcome == Outcome::Quit {
            tracing::info!("input closed; stopping");
            break;
        }
    }
    Ok(())
}

pub fn run(args: CvarsArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;
    let cfg = &config.cvars;

    let build_dir = args.build_dir.clone().unwrap_or_else(|| cfg.build_dir.clone());
    let build_dir = PathBuf::from(shellexpand::tilde(&build_dir.to_string_lossy()).into_owned());
    let opts = AnalyzeOptions {
        build_dir,
        file_filter: args.file_filter.clone(),
        jobs: args.jobs.unwrap_or(cfg.jobs),
        text_scan: !args.no_text,
        quiet: ctx.quiet,
        reread_disk: args.interactive,
    };
    let report_opts = ReportOptions {
        cvar_filter: args.cvar_filter.clone(),
        migrate: args.migrate,
        context: args.context,
    };

    if ctx.dry_run {
        println!("build dir:   {}", opts.build_dir.display());
        println!("tu filter:   {:?}", opts.file_filter);
        println!("cvar filter: {:?}", report_opts.cvar_filter);
        println!("jobs:        {}", opts.jobs);
        println!("text scan:   {}", opts.text_scan);
        println!("mode:        {}", if args.migrate { "migrate" } else { "remove" });
        return Ok(());
    }

    let mut analysis = analyze(cfg, &config.ignore_patterns, &opts)?;
    let color = !ctx.no_color && std::io::stdout().is_terminal();

    if args.interactive {
        let applier = GitApplier::new(cfg)?;
        let mut reviewer = Reviewer::new(std::io::stdin().lock(), std::io::stdout(), &applier, color);
        report(&mut analysis, cfg, &report_opts, &mut reviewer)
    } else {
        let style = if color { RenderStyle::Color } else { RenderStyle::Plain };
        let mut printer = Printer::new(std::io::stdout().lock(), style);
        report(&mut analysis, cfg, &report_opts, &mut printer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::utils::PathUtils;

    const HEADER: &str = "extern vmCvar_t cg_dead;\nextern vmCvar_t cg_live;\n";
    const SOURCE: &str = "#include \"cg_local.h\"\n\
        \n\
        vmCvar_t cg_dead;\n\
        vmCvar_t cg_live;\n\
        \n\
        int f() {\n\
        \treturn cg_live.integer;\n\
        }\n";

    fn checkout() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = PathUtils::from_std(dir.path()).unwrap();
        let cgame = root.join("src/cgame");
        std::fs::create_dir_all(&cgame).unwrap();
        std::fs::create_dir_all(root.join("build")).unwrap();
        std::fs::write(cgame.join("cg_local.h"), HEADER).unwrap();
        std::fs::write(cgame.join("cg_main.cpp"), SOURCE).unwrap();
        let db = serde_json::json!([{
            "directory": root.join("build"),
            "file": cgame.join("cg_main.cpp"),
            "arguments": ["c++", format!("-I{cgame}"), "-c", cgame.join("cg_main.cpp")],
        }]);
        std::fs::write(root.join("build/compile_commands.json"), db.to_string()).unwrap();
        (dir, root)
    }

    const TABLE_HEADER: &str = "extern vmCvar_t cg_tab;\nextern vmCvar_t cg_unused;\n";
    const TABLE_SOURCE: &str = "#include \"cg_local.h\"\n\
        vmCvar_t cg_tab;\n\
        vmCvar_t cg_unused;\n\
        static const cvarTable_t cvarTable[] = {\n\
        \t{ &cg_tab, \"cg_tab\", \"1\", CVAR_ARCHIVE },\n\
        \t{ &cg_unused, \"cg_unused\", \"0\", 0 },\n\
        };\n\
        int f() {\n\
        \treturn cg_tab.integer;\n\
        }\n";

    fn table_checkout() -> (tempfile::TempDir, Utf8PathBuf) {
        let (dir, root) = checkout();
        let cgame = root.join("src/cgame");
        std::fs::write(cgame.join("cg_local.h"), TABLE_HEADER).unwrap();
        std::fs::write(cgame.join("cg_main.cpp"), TABLE_SOURCE).unwrap();
        (dir, root)
    }

    fn run_report(root: &Utf8PathBuf, opts: ReportOptions) -> String {
        run_report_with(root, &CvarsConfig::default(), opts)
    }

    fn run_report_with(root: &Utf8PathBuf, cfg: &CvarsConfig, opts: ReportOptions) -> String {
        let mut analysis = analyze(
            cfg,
            &[],
            &AnalyzeOptions {
                build_dir: root.join("build").into_std_path_buf(),
                file_filter: String::new(),
                jobs: 2,
                text_scan: true,
                quiet: true,
                reread_disk: false,
            },
        )
        .unwrap();
        let mut printer = Printer::new(Vec::new(), RenderStyle::Plain);
        report(&mut analysis, cfg, &opts, &mut printer).unwrap();
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn dead_cvar_patch_deletes_declaration_and_definition_only() {
        let (_dir, root) = checkout();
        let out = run_report(
            &root,
            ReportOptions {
                cvar_filter: "dead".into(),
                migrate: false,
                context: 3,
            },
        );

        let header = root.join("src/cgame/cg_local.h");
        let source = root.join("src/cgame/cg_main.cpp");
        assert!(out.starts_with("cg_dead\n"), "{out}");
        assert!(out.contains(&format!("DECL {header}:17 extern vmCvar_t cg_dead;\n")));
        assert!(out.contains(&format!("DEF {source}:10 vmCvar_t cg_dead;\n")));
        assert!(out.contains("UU: yes\n"));

        let removed: Vec<&str> = out
            .lines()
            .filter(|l| l.starts_with('-') && !l.starts_with("---"))
            .collect();
        assert_eq!(removed, vec!["-extern vmCvar_t cg_dead;", "-vmCvar_t cg_dead;"]);
        assert!(!out.lines().any(|l| l.starts_with('+') && !l.starts_with("+++")));
        assert!(!out.contains("cg_live\n"));
    }

    #[test]
    fn live_cvar_is_listed_without_patch() {
        let (_dir, root) = checkout();
        let out = run_report(
            &root,
            ReportOptions {
                cvar_filter: "LIVE".into(),
                migrate: false,
                context: 3,
            },
        );
        assert!(out.contains("INT "), "{out}");
        assert!(!out.contains("UU:"));
        assert!(!out.contains("@@"));
    }

    #[test]
    fn live_cvar_migrates_to_wrapped_type() {
        let (_dir, root) = checkout();
        let out = run_report(
            &root,
            ReportOptions {
                cvar_filter: String::new(),
                migrate: true,
                context: 3,
            },
        );
        assert!(out.contains("+extern Cvar::Cvar<int> cg_live;"), "{out}");
        assert!(out.contains("+Cvar::Cvar<int> cg_live(\"cg_live\", \"\", Cvar::NONE, 0);"));
        assert!(out.contains("+\treturn cg_live.Get();"));
        assert!(!out.contains("-vmCvar_t cg_dead;"));
    }

    fn removed_and_added(out: &str) -> (Vec<&str>, Vec<&str>) {
        let body = |c: char, skip: &'static str| {
            out.lines()
                .filter(move |l| l.starts_with(c) && !l.starts_with(skip))
                .collect::<Vec<_>>()
        };
        (body('-', "---"), body('+', "+++"))
    }

    #[test]
    fn table_registered_cvar_migrates_end_to_end() {
        let (_dir, root) = table_checkout();
        let out = run_report(
            &root,
            ReportOptions {
                cvar_filter: "cg_tab".into(),
                migrate: true,
                context: 3,
            },
        );

        let (removed, added) = removed_and_added(&out);
        assert!(out.contains("TAB "), "{out}");
        assert!(removed.contains(&"-\t{ &cg_tab, \"cg_tab\", \"1\", CVAR_ARCHIVE },"), "{out}");
        assert!(!added.iter().any(|l| l.contains("\"cg_tab\", \"1\"")), "{out}");
        assert!(added.contains(&"+extern Cvar::Cvar<int> cg_tab;"), "{out}");
        assert!(added.contains(&"+Cvar::Cvar<int> cg_tab(\"cg_tab\", \"\", Cvar::ARCHIVE, 1);"), "{out}");
        assert!(added.contains(&"+\treturn cg_tab.Get();"), "{out}");
    }

    // Typed reads make a cvar live, so removal mode leaves it alone even
    // with a declaration, definition and default in place.
    #[test]
    fn cvar_with_int_read_is_never_removed() {
        let (_dir, root) = table_checkout();
        let out = run_report(
            &root,
            ReportOptions {
                cvar_filter: "cg_tab".into(),
                migrate: false,
                context: 3,
            },
        );
        assert!(out.starts_with("cg_tab \"cg_tab\"\n"), "{out}");
        assert!(out.contains("INT "));
        assert!(!out.contains("UU:"));
        assert!(!out.contains("@@"));
    }

    // Column-exact dedup lets the table line's own words through the text
    // scan; they must be scrubbed before classification.
    #[test]
    fn table_line_words_do_not_keep_a_cvar_alive() {
        let (_dir, root) = table_checkout();
        let cfg = CvarsConfig {
            text_dedup: crate::infra::config::TextDedup::Exact,
            ..CvarsConfig::default()
        };
        let out = run_report_with(
            &root,
            &cfg,
            ReportOptions {
                cvar_filter: "unused".into(),
                migrate: false,
                context: 3,
            },
        );

        assert!(!out.contains("TEXT "), "{out}");
        assert!(out.contains("UU: yes\n"), "{out}");
        let (removed, added) = removed_and_added(&out);
        assert_eq!(
            removed,
            vec![
                "-extern vmCvar_t cg_unused;",
                "-vmCvar_t cg_unused;",
                "-\t{ &cg_unused, \"cg_unused\", \"0\", 0 },",
            ]
        );
        assert!(added.is_empty());
    }

    #[test]
    fn occurrences_outside_sources_are_fatal() {
        let mut ledger = Ledger::new();
        let mut rec = SymbolRecord::default();
        rec.add(Role::Def, Occurrence::new("/elsewhere/x.cpp", 1, 1));
        ledger.symbols.insert("cg_x".into(), rec);
        let analysis = Analysis {
            ledger,
            sources: BTreeSet::new(),
            cache: SourceCache::new(false),
        };
        let err = analysis.selected("").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CvarError>(),
            Some(CvarError::LocationOutsideSources { .. })
        ));
    }
}
