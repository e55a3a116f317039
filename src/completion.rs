//! `ekit completions`: shell completion scripts for every subcommand

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::Shell;

use crate::cli::{AppContext, Cli, CompletionsArgs};

const BIN: &str = "ekit";

/// Where the script is usually picked up from
pub fn install_hint(shell: Shell) -> &'static str {
    match shell {
        Shell::Bash => "source it from ~/.bashrc or copy it to ~/.local/share/bash-completion/completions/",
        Shell::Zsh => "put its directory on $fpath before compinit runs",
        Shell::Fish => "copy it to ~/.config/fish/completions/",
        Shell::PowerShell => "dot-source it from $PROFILE",
        Shell::Elvish => "`use` it from ~/.config/elvish/rc.elv",
        _ => "see your shell's completion docs",
    }
}

/// Completion script for `shell` as bytes
pub fn script(shell: Shell) -> Vec<u8> {
    let mut out = Vec::new();
    clap_complete::generate(shell, &mut Cli::command(), BIN, &mut out);
    out
}

pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    let Some(dir) = args.out_dir.filter(|_| !args.stdout) else {
        std::io::stdout()
            .write_all(&script(args.shell))
            .context("write completion script")?;
        return Ok(());
    };

    if ctx.dry_run {
        println!("Would write {} completions into {}", args.shell, dir.display());
        return Ok(());
    }

    std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let path: PathBuf = clap_complete::generate_to(args.shell, &mut Cli::command(), BIN, &dir)
        .context("generate completion file")?;

    if !ctx.quiet {
        eprintln!("Wrote {}; {}", path.display(), install_hint(args.shell));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_name_every_subcommand() {
        let bash = String::from_utf8(script(Shell::Bash)).unwrap();
        for sub in ["cvars", "pch-check", "cmake-headers", "map-entities", "script-keywords", "dup-paks", "merged"] {
            assert!(bash.contains(sub), "{sub} missing");
        }
    }

    #[test]
    fn out_dir_gets_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let args = CompletionsArgs {
            shell: Shell::Fish,
            out_dir: Some(dir.path().to_path_buf()),
            stdout: false,
        };
        let ctx = AppContext {
            quiet: true,
            no_color: true,
            dry_run: false,
        };
        run(args, &ctx).unwrap();
        assert!(dir.path().join("ekit.fish").exists());
    }
}
