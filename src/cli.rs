use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "ekit")]
#[command(about = "Maintenance utilities for a C++ game-engine codebase and its asset paks")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without executing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Raise log verbosity (repeatable; RUST_LOG overrides)
    #[arg(long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List cvar usage and build removal or migration patches
    Cvars(CvarsArgs),

    /// Check that every .cpp includes the precompiled header first
    PchCheck(PchCheckArgs),

    /// List headers missing from CMake source lists
    CmakeHeaders(CmakeHeadersArgs),

    /// Count entity classnames across BSPs inside paks
    MapEntities(MapEntitiesArgs),

    /// Census of shader/particle/trail script keywords inside paks
    ScriptKeywords(ScriptKeywordsArgs),

    /// Find byte-identical paks
    DupPaks(DupPaksArgs),

    /// Check whether a feature branch's commits landed on a base branch
    Merged(MergedArgs),

    /// List words that occur exactly once in a source tree
    UniqueWords(UniqueWordsArgs),

    /// Initialize an enginekit.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Parser)]
pub struct CvarsArgs {
    /// Build directory containing compile_commands.json
    #[arg(short = 'b', long = "build-dir")]
    pub build_dir: Option<PathBuf>,

    /// Only parse translation units whose path contains this substring
    #[arg(short = 'f', long = "file-filter", default_value = "")]
    pub file_filter: String,

    /// Parser threads
    #[arg(short = 'j', long = "jobs")]
    pub jobs: Option<usize>,

    /// Only report cvars whose name contains this substring
    #[arg(short = 'v', long = "cvar-filter", default_value = "")]
    pub cvar_filter: String,

    /// Disable the free-text scan over all sources
    #[arg(short = 'T', long = "no-text")]
    pub no_text: bool,

    /// Interactively review and apply patches
    #[arg(short = 'p', long = "interactive")]
    pub interactive: bool,

    /// Migrate live cvars to the wrapped-value API instead of removing dead ones
    #[arg(short = 'm', long = "migrate")]
    pub migrate: bool,

    /// Context lines in rendered diffs
    #[arg(long, default_value_t = 3)]
    pub context: usize,
}

#[derive(Debug, Parser)]
pub struct PchCheckArgs {
    /// Source root to scan (defaults to config pch.src)
    pub path: Option<PathBuf>,

    /// Precompiled header file name
    #[arg(long)]
    pub header: Option<String>,
}

#[derive(Debug, Parser)]
pub struct CmakeHeadersArgs {
    /// Label used in the report (ad-hoc check)
    #[arg(long, default_value = "headers")]
    pub name: String,

    /// Header tree to scan (ad-hoc check; requires --cmake)
    #[arg(long, requires = "cmake")]
    pub path: Option<PathBuf>,

    /// CMake file listing the sources (ad-hoc check)
    #[arg(long, requires = "path")]
    pub cmake: Option<PathBuf>,

    /// Sub-paths of --path to skip
    #[arg(long)]
    pub ignore: Vec<String>,

    /// CMake variable substitutions (KEY=VALUE)
    #[arg(long = "subst", value_name = "KEY=VALUE")]
    pub substitutions: Vec<String>,
}

#[derive(Debug, Parser)]
pub struct MapEntitiesArgs {
    /// Directories searched for .pk3/.dpk files
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScriptKind {
    Shader,
    Particle,
    Trail,
}

impl ScriptKind {
    /// File extension of scripts of this kind
    pub fn extension(self) -> &'static str {
        match self {
            ScriptKind::Shader => "shader",
            ScriptKind::Particle => "particle",
            ScriptKind::Trail => "trail",
        }
    }
}

#[derive(Debug, Parser)]
pub struct ScriptKeywordsArgs {
    /// Script flavour to census
    #[arg(value_enum)]
    pub kind: ScriptKind,

    /// Pak directories, or text files listing one pak per line
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Count keywords at any brace depth, including top level
    #[arg(long)]
    pub any_depth: bool,
}

#[derive(Debug, Parser)]
pub struct DupPaksArgs {
    /// Directories searched for .pk3/.dpk files
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Parser)]
pub struct MergedArgs {
    /// Feature branch whose commits are checked
    pub feature: String,

    /// Base branch (defaults to config merged.base)
    pub base: Option<String>,

    /// Repository to run git in
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,
}

#[derive(Debug, Parser)]
pub struct UniqueWordsArgs {
    /// Checkout root (defaults to config unique_words.root)
    pub root: Option<PathBuf>,

    /// Sub-paths of the root to scan (repeatable)
    #[arg(long = "subpath")]
    pub subpaths: Vec<String>,

    /// Drop words found under these relative prefixes (repeatable)
    #[arg(long = "exclude")]
    pub excludes: Vec<String>,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,

    /// Write `ekit.<ext>` into this directory instead of printing
    #[arg(long, conflicts_with = "stdout")]
    pub out_dir: Option<PathBuf>,

    /// Print to stdout (the default without --out-dir)
    #[arg(long)]
    pub stdout: bool,
}
