//! Git integration: patch application and commit summaries
//!
//! Patches are applied with `git apply -p0 --unsafe-paths` from the
//! filesystem root because their headers carry absolute paths. Stderr is
//! parsed into [`GitConflict`] values so a failed apply can be explained.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Git apply configuration
#[derive(Debug, Clone)]
pub struct GitOptions {
    /// Directory git runs in
    pub work_dir: PathBuf,
    /// Leading path components stripped from patch headers (`-p`)
    pub strip: u8,
    /// Allow paths outside the repository of `work_dir`
    pub unsafe_paths: bool,
}

impl Default for GitOptions {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/"),
            strip: 0,
            unsafe_paths: true,
        }
    }
}

/// Git apply outcome
#[derive(Debug)]
pub struct GitOutcome {
    pub success: bool,
    pub conflicts: Vec<GitConflict>,
    pub stderr_raw: String,
}

/// Git conflict types with user-friendly categorization
#[derive(Debug, Clone)]
pub enum GitConflict {
    PreimageMismatch { path: PathBuf, hint: &'static str },
    MissingFile { path: PathBuf, hint: &'static str },
    CorruptPatch { line: String, hint: &'static str },
    Other(String),
}

/// Git apply engine
pub struct GitEngine {
    options: GitOptions,
    git_executable: PathBuf,
}

impl GitEngine {
    pub fn new(options: GitOptions) -> Result<Self> {
        let git_executable = detect_git_executable()?;
        Ok(Self {
            options,
            git_executable,
        })
    }

    /// Apply a patch file
    pub fn apply_file(&self, patch: &Path) -> Result<GitOutcome> {
        let mut cmd = Command::new(&self.git_executable);
        cmd.current_dir(&self.options.work_dir)
            .arg("apply")
            .arg(format!("-p{}", self.options.strip));
        if self.options.unsafe_paths {
            cmd.arg("--unsafe-paths");
        }
        cmd.arg("--verbose").arg(patch).stdin(Stdio::null());

        tracing::debug!("running {:?}", cmd);
        let output = cmd.output().context("Failed to run git apply")?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        Ok(GitOutcome {
            success: output.status.success(),
            conflicts: parse_git_stderr(&stderr),
            stderr_raw: stderr,
        })
    }
}

/// Detect git executable and verify it answers
pub fn detect_git_executable() -> Result<PathBuf> {
    let output = Command::new("git")
        .arg("--version")
        .output()
        .context("Git executable not found in PATH")?;

    if !output.status.success() {
        anyhow::bail!("Git command failed");
    }

    let version_str = String::from_utf8_lossy(&output.stdout);
    if !version_str.contains("git version") {
        anyhow::bail!("Unexpected git version output: {}", version_str);
    }

    Ok(PathBuf::from("git"))
}

/// Parse git apply stderr into structured conflicts
pub fn parse_git_stderr(stderr: &str) -> Vec<GitConflict> {
    let mut conflicts = Vec::new();

    for line in stderr.lines() {
        let line = line.trim();

        if line.contains("patch does not apply") {
            conflicts.push(GitConflict::PreimageMismatch {
                path: extract_path_from_error(line).unwrap_or_else(|| PathBuf::from("unknown")),
                hint: "The file changed since the patch was built. Re-run to regenerate it.",
            });
        } else if line.contains("No such file or directory") || line.contains("does not exist in index") {
            conflicts.push(GitConflict::MissingFile {
                path: extract_path_from_error(line).unwrap_or_else(|| PathBuf::from("unknown")),
                hint: "The patch names a file that is gone.",
            });
        } else if line.contains("corrupt patch") {
            conflicts.push(GitConflict::CorruptPatch {
                line: line.to_string(),
                hint: "Hunk headers no longer match their bodies; check hand edits.",
            });
        } else if line.starts_with("error:") || line.starts_with("fatal:") {
            if line.starts_with("error: patch failed:") {
                continue;
            }
            conflicts.push(GitConflict::Other(line.to_string()));
        }
    }

    conflicts
}

/// File path from an `error: <path>: ...` line
fn extract_path_from_error(error_line: &str) -> Option<PathBuf> {
    let rest = error_line
        .strip_prefix("error:")
        .or_else(|| error_line.strip_prefix("fatal:"))
        .unwrap_or(error_line)
        .trim();
    let (path, _) = rest.rsplit_once(": ")?;
    let path = path.trim_matches(|c| c == '\'' || c == '"');
    (!path.is_empty()).then(|| PathBuf::from(path))
}

/// Render user-friendly conflict summary
pub fn render_conflict_summary(conflicts: &[GitConflict]) -> String {
    if conflicts.is_empty() {
        return String::new();
    }

    let mut output = format!("Conflicts ({})\n", conflicts.len());

    for conflict in conflicts {
        match conflict {
            GitConflict::PreimageMismatch { path, hint } => {
                output.push_str(&format!(
                    "  • {}: preimage mismatch\n    Remedy: {}\n",
                    path.display(),
                    hint
                ));
            }
            GitConflict::MissingFile { path, hint } => {
                output.push_str(&format!(
                    "  • {}: missing file\n    Remedy: {}\n",
                    path.display(),
                    hint
                ));
            }
            GitConflict::CorruptPatch { line, hint } => {
                output.push_str(&format!("  • {line}\n    Remedy: {hint}\n"));
            }
            GitConflict::Other(msg) => {
                output.push_str(&format!("  • Other: {msg}\n"));
            }
        }
    }

    output
}

/// Commit summaries (`%s`) of `git log <args>` run in `repo`
pub fn log_summaries(repo: &Path, args: &[&str]) -> Result<Vec<String>> {
    let git = detect_git_executable()?;
    let output = Command::new(git)
        .current_dir(repo)
        .arg("log")
        .arg("--format=%s")
        .args(args)
        .output()
        .context("Failed to run git log")?;

    if !output.status.success() {
        anyhow::bail!(
            "git log {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect())
}
