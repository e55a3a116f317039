//! **enginekit** - Maintenance utilities for a C++ game-engine checkout and its asset paks
//!
//! Standalone commands sharing one CLI: a cvar usage ledger with removal and
//! migration patches, source-tree audits, and pk3/dpk census tools.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core commands - one module per maintenance utility
pub mod core {
    /// compile_commands.json loading and compiler argument clean-up
    pub mod compdb;
    pub use compdb::{CompilationDatabase, CompileUnit};

    /// Cvar usage ledger, classifier, removal and migration patches
    pub mod cvars;
    pub use cvars::run as cvars_run;

    /// Line-level patch builder rendering unified diffs
    pub mod patch;
    pub use patch::{Patch, PatchSet, RenderStyle};

    /// git plumbing: `git apply` for patches, `git log` summaries
    pub mod git;

    /// Branch merge checker built on commit summaries
    pub mod merged;
    pub use merged::run as merged_run;

    /// Precompiled-header include order checker
    pub mod pch;
    pub use pch::run as pch_run;

    /// Headers missing from CMake source lists
    pub mod cmake_headers;
    pub use cmake_headers::run as cmake_headers_run;

    /// Asset pak scanners (entities, script keywords, duplicates)
    pub mod paks;

    /// Words that occur exactly once across a source tree
    pub mod unique_words;
    pub use unique_words::run as unique_words_run;
}

/// Language processing - tree-sitter C++ translation units
pub mod parsers {
    /// C++ parsing with quoted-include closure and syntax diagnostics
    pub mod cpp_parser;
    pub use cpp_parser::{CppParser, ParsedFile, ParsedUnit};
}

/// Infrastructure - Configuration, I/O, walking and logging
pub mod infra {
    /// Configuration management with TOML support
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Memory-mapped file I/O for large files (>1MB threshold)
    pub mod io;
    pub use io::{FileContent, read_file_smart};

    /// Per-run cache of source lines keyed by normalized path
    pub mod source_cache;
    pub use source_cache::SourceCache;

    /// Directory walking with extension filters and deterministic order
    pub mod walk;
    pub use walk::FileWalker;

    /// Path normalization, tree-sitter node helpers and progress bars
    pub mod utils;
    pub use utils::{PathUtils, ProgressUtils, TsNodeUtils};

    /// tracing subscriber setup
    pub mod logging;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use infra::{Config, FileWalker, load_config};
