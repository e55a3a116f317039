//! Interactive patch review
//!
//! A blocking prompt loop over any reader/writer pair. Applying goes through
//! a [`PatchApplier`] so the loop can be driven without git in tests. End of
//! input quits the whole run.

use std::io::{BufRead, Write};
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use thiserror::Error;

use super::rewrite::{CvarType, Migration};
use crate::core::git::{GitEngine, GitOptions, render_conflict_summary};
use crate::core::patch::{Patch, RenderStyle};
use crate::infra::config::CvarsConfig;
use crate::infra::source_cache::SourceCache;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("git apply rejected the patch:\n{stderr}{summary}")]
    Rejected { stderr: String, summary: String },

    #[error("editor `{editor}` failed: {status}")]
    Editor { editor: String, status: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Applies a rendered diff to the working tree
pub trait PatchApplier {
    /// `edit` opens the diff in an editor first
    fn apply(&self, diff: &str, edit: bool) -> Result<(), ApplyError>;
}

/// `git apply -p0 --unsafe-paths` from the filesystem root
pub struct GitApplier {
    editor: String,
    engine: GitEngine,
}

impl GitApplier {
    /// `EDITOR` wins over the configured editor
    pub fn new(cfg: &CvarsConfig) -> Result<Self> {
        let editor = std::env::var("EDITOR")
            .ok()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| cfg.editor.clone());
        Ok(Self {
            editor,
            engine: GitEngine::new(GitOptions::default())?,
        })
    }

    fn run_editor(&self, file: &Path) -> Result<(), ApplyError> {
        let status = Command::new(&self.editor)
            .arg(file)
            .status()
            .with_context(|| format!("Failed to spawn editor {}", self.editor))?;
        if !status.success() {
            return Err(ApplyError::Editor {
                editor: self.editor.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

impl PatchApplier for GitApplier {
    fn apply(&self, diff: &str, edit: bool) -> Result<(), ApplyError> {
        let mut file = tempfile::Builder::new()
            .prefix("ekit-")
            .suffix(".patch")
            .tempfile()?;
        file.write_all(diff.as_bytes())?;
        file.flush()?;

        if edit {
            self.run_editor(file.path())?;
        }

        let outcome = self.engine.apply_file(file.path())?;
        if outcome.success {
            return Ok(());
        }
        Err(ApplyError::Rejected {
            summary: render_conflict_summary(&outcome.conflicts),
            stderr: outcome.stderr_raw,
        })
    }
}

/// Where per-symbol listings and patches go
pub trait PatchSink {
    fn emit(&mut self, text: &str) -> Result<()>;

    fn removal(&mut self, patch: &mut Patch, cache: &mut SourceCache) -> Result<Outcome>;

    fn migration(
        &mut self,
        migration: &mut Migration<'_>,
        cfg: &CvarsConfig,
        cache: &mut SourceCache,
        context: usize,
    ) -> Result<Outcome>;
}

/// Prints patches without applying anything
pub struct Printer<W> {
    out: W,
    style: RenderStyle,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, style: RenderStyle) -> Self {
        Self { out, style }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PatchSink for Printer<W> {
    fn emit(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes())?;
        Ok(())
    }

    fn removal(&mut self, patch: &mut Patch, cache: &mut SourceCache) -> Result<Outcome> {
        let diff = patch.render(cache, self.style)?;
        self.emit(&diff)?;
        Ok(Outcome::Skipped)
    }

    fn migration(
        &mut self,
        migration: &mut Migration<'_>,
        cfg: &CvarsConfig,
        cache: &mut SourceCache,
        context: usize,
    ) -> Result<Outcome> {
        let diff = migration.patch(cfg, cache, context)?.render(cache, self.style)?;
        self.emit(&diff)?;
        Ok(Outcome::Skipped)
    }
}

/// What happened to one symbol's patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped,
    /// Input ended; stop reviewing
    Quit,
}

pub struct Reviewer<'a, R, W, A> {
    input: R,
    output: W,
    applier: &'a A,
    color: bool,
}

impl<'a, R: BufRead, W: Write, A: PatchApplier> Reviewer<'a, R, W, A> {
    pub fn new(input: R, output: W, applier: &'a A, color: bool) -> Self {
        Self {
            input,
            output,
            applier,
            color,
        }
    }

    fn render_style(&self) -> RenderStyle {
        if self.color { RenderStyle::Color } else { RenderStyle::Plain }
    }

    /// `[y]es, [n]o` with highlighted letters
    fn choices(&self, options: &[&str]) -> String {
        options
            .iter()
            .map(|opt| {
                let (key, rest) = opt.split_at(opt.chars().next().map_or(0, char::len_utf8));
                if self.color {
                    format!("[{}]{}", key.yellow(), rest)
                } else {
                    format!("[{key}]{rest}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Print `question` and read one line; `None` at end of input
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        let question = if self.color {
            question.yellow().to_string()
        } else {
            question.to_string()
        };
        write!(self.output, "{question} ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask_choice(&mut self, question: &str, options: &[&str]) -> Result<Option<String>> {
        let prompt = format!("{question} {}", self.choices(options));
        Ok(self.ask(&prompt)?.map(|a| a.to_lowercase()))
    }

    fn show(&mut self, patch: &Patch, cache: &mut SourceCache) -> Result<String> {
        let shown = patch.render(cache, self.render_style())?;
        write!(self.output, "{shown}")?;
        patch.render(cache, RenderStyle::Plain)
    }

    fn report(&mut self, err: &ApplyError) -> Result<()> {
        writeln!(self.output, "{err}")?;
        Ok(())
    }

    /// `[y]es, [n]o, [c]ontext++, [e]dit`, repeated until applied or refused
    pub fn review_removal(&mut self, patch: &mut Patch, cache: &mut SourceCache) -> Result<Outcome> {
        loop {
            let diff = self.show(patch, cache)?;
            let Some(choice) = self.ask_choice("Apply patch?", &["yes", "no", "context++", "edit"])? else {
                return Ok(Outcome::Quit);
            };
            match choice.as_str() {
                "y" | "e" => match self.applier.apply(&diff, choice == "e") {
                    Ok(()) => return Ok(Outcome::Applied),
                    Err(err) => self.report(&err)?,
                },
                "n" => return Ok(Outcome::Skipped),
                "c" => patch.context += 1,
                _ => {}
            }
        }
    }

    /// Type choice, description, then apply
    pub fn review_migration(
        &mut self,
        migration: &mut Migration<'_>,
        cfg: &CvarsConfig,
        cache: &mut SourceCache,
        context: usize,
    ) -> Result<Outcome> {
        loop {
            let patch = migration.patch(cfg, cache, context)?;
            self.show(&patch, cache)?;
            let question = format!("Migrate {} as {}?", migration.name, migration.ty);
            let Some(choice) = self.ask_choice(&question, &["accept", "reject", "type override"])? else {
                return Ok(Outcome::Quit);
            };
            match choice.as_str() {
                "a" => break,
                "r" => return Ok(Outcome::Skipped),
                "t" => match self.ask_type()? {
                    Some(Some(ty)) => migration.ty = ty,
                    Some(None) => writeln!(self.output, "unknown type")?,
                    None => return Ok(Outcome::Quit),
                },
                _ => {}
            }
        }

        let Some(description) = self.ask("Description:")? else {
            return Ok(Outcome::Quit);
        };
        migration.description = description;

        let patch = migration.patch(cfg, cache, context)?;
        let diff = self.show(&patch, cache)?;
        loop {
            let Some(choice) = self.ask_choice("Apply patch?", &["yes", "edit", "no"])? else {
                return Ok(Outcome::Quit);
            };
            let edit = match choice.as_str() {
                "y" => false,
                "e" => true,
                "n" => return Ok(Outcome::Skipped),
                _ => continue,
            };
            match self.applier.apply(&diff, edit) {
                Ok(()) => return Ok(Outcome::Applied),
                Err(err) => {
                    self.report(&err)?;
                    return self.retry_edit(&diff);
                }
            }
        }
    }

    /// After a failed apply: `[e]dit again, [a]bandon`
    fn retry_edit(&mut self, diff: &str) -> Result<Outcome> {
        loop {
            let Some(choice) = self.ask_choice("Patch failed.", &["edit again", "abandon"])? else {
                return Ok(Outcome::Quit);
            };
            match choice.as_str() {
                "e" => match self.applier.apply(diff, true) {
                    Ok(()) => return Ok(Outcome::Applied),
                    Err(err) => self.report(&err)?,
                },
                "a" => return Ok(Outcome::Skipped),
                _ => {}
            }
        }
    }

    /// `Some(None)` for an unknown name, `None` at end of input
    fn ask_type(&mut self) -> Result<Option<Option<CvarType>>> {
        let Some(choice) = self.ask("Type [bool, int, float, string, range-int, range-float]:")? else {
            return Ok(None);
        };
        let bounds = if CvarType::is_range_choice(&choice) {
            let Some(min) = self.ask("Min:")? else {
                return Ok(None);
            };
            let Some(max) = self.ask("Max:")? else {
                return Ok(None);
            };
            Some((min, max))
        } else {
            None
        };
        Ok(Some(CvarType::from_choice(&choice, bounds)))
    }
}

impl<R: BufRead, W: Write, A: PatchApplier> PatchSink for Reviewer<'_, R, W, A> {
    fn emit(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes())?;
        Ok(())
    }

    fn removal(&mut self, patch: &mut Patch, cache: &mut SourceCache) -> Result<Outcome> {
        self.review_removal(patch, cache)
    }

    fn migration(
        &mut self,
        migration: &mut Migration<'_>,
        cfg: &CvarsConfig,
        cache: &mut SourceCache,
        context: usize,
    ) -> Result<Outcome> {
        self.review_migration(migration, cfg, cache, context)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Cursor;

    use camino::Utf8PathBuf;

    use super::*;
    use crate::core::cvars::ledger::{Role, SymbolRecord};
    use crate::core::cvars::location::Occurrence;
    use crate::infra::utils::PathUtils;

    /// Records calls; fails the first `fail_first` of them
    struct FakeApplier {
        calls: RefCell<Vec<(String, bool)>>,
        fail_first: usize,
    }

    impl FakeApplier {
        fn new(fail_first: usize) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                fail_first,
            }
        }
    }

    impl PatchApplier for FakeApplier {
        fn apply(&self, diff: &str, edit: bool) -> Result<(), ApplyError> {
            let mut calls = self.calls.borrow_mut();
            calls.push((diff.to_string(), edit));
            if calls.len() <= self.fail_first {
                return Err(ApplyError::Rejected {
                    stderr: "error: patch does not apply\n".into(),
                    summary: String::new(),
                });
            }
            Ok(())
        }
    }

    fn fixture() -> (tempfile::TempDir, Utf8PathBuf, SymbolRecord) {
        let dir = tempfile::tempdir().unwrap();
        let file = PathUtils::from_std(&dir.path().join("g.cpp")).unwrap();
        std::fs::write(&file, "vmCvar_t g_dead;\nint keep;\n").unwrap();
        let mut rec = SymbolRecord::default();
        rec.add(Role::Def, Occurrence::new(file.clone(), 1, 10));
        (dir, file, rec)
    }

    #[test]
    fn removal_context_then_yes() {
        let (_dir, _file, rec) = fixture();
        let mut cache = SourceCache::new(true);
        let mut patch = crate::core::cvars::rewrite::removal_patch(&rec, &mut cache, 3).unwrap();
        let applier = FakeApplier::new(0);
        let mut out = Vec::new();

        let outcome = Reviewer::new(Cursor::new("c\ny\n"), &mut out, &applier, false)
            .review_removal(&mut patch, &mut cache)
            .unwrap();

        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(patch.context, 4);
        let calls = applier.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("-vmCvar_t g_dead;"));
        assert!(!calls[0].1);
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("Apply patch? [y]es, [n]o, [c]ontext++, [e]dit"));
    }

    #[test]
    fn removal_eof_quits() {
        let (_dir, _file, rec) = fixture();
        let mut cache = SourceCache::new(true);
        let mut patch = crate::core::cvars::rewrite::removal_patch(&rec, &mut cache, 3).unwrap();
        let applier = FakeApplier::new(0);
        let outcome = Reviewer::new(Cursor::new(""), Vec::new(), &applier, false)
            .review_removal(&mut patch, &mut cache)
            .unwrap();
        assert_eq!(outcome, Outcome::Quit);
        assert!(applier.calls.borrow().is_empty());
    }

    #[test]
    fn migration_type_override_and_retry() {
        let (_dir, _file, rec) = fixture();
        let mut cache = SourceCache::new(true);
        let mut migration = Migration::new("g_dead", &rec);
        let applier = FakeApplier::new(1);
        let input = "t\nrange-int\n0\n5\na\nspeed limit\ny\ne\n";

        let outcome = Reviewer::new(Cursor::new(input), Vec::new(), &applier, false)
            .review_migration(&mut migration, &CvarsConfig::default(), &mut cache, 3)
            .unwrap();

        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(
            migration.ty,
            CvarType::RangeInt {
                min: "0".into(),
                max: "5".into()
            }
        );
        let calls = applier.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].0.contains(
            "+Cvar::Range<Cvar::Cvar<int>> g_dead(\"g_dead\", \"speed limit\", Cvar::NONE, 0, 0, 5);"
        ));
        assert_eq!((calls[0].1, calls[1].1), (false, true));
    }
}
