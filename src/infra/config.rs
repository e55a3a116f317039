use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Extra ignore globs applied by every directory walk
    pub ignore_patterns: Vec<String>,

    /// Cvar ledger, classifier and patch settings
    pub cvars: CvarsConfig,

    /// Precompiled header checker settings
    pub pch: PchConfig,

    /// CMake source list audits
    pub cmake: CmakeConfig,

    /// Unique word finder settings
    pub unique_words: UniqueWordsConfig,

    /// Branch merge checker settings
    pub merged: MergedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CvarsConfig
{
    /// Build directory holding compile_commands.json
    pub build_dir: PathBuf,

    /// Parser worker threads
    pub jobs: usize,

    /// Editor used when the EDITOR variable is unset
    pub editor: String,

    /// Struct type names that identify a cvar
    pub cvar_types: Vec<String>,

    /// Registration table element type
    pub table_type: String,

    /// Positional field layout of the table type when no definition is parsed
    pub table_fields: Vec<String>,

    /// Table field holding the `&cvar` pointer
    pub table_cvar_field: String,

    /// Table field holding the display name literal
    pub table_name_field: String,

    /// Table field holding the default value
    pub table_default_field: String,

    /// Table field holding the flag expression
    pub table_flags_field: String,

    /// Field read as integer
    pub int_field: String,

    /// Field read as float
    pub float_field: String,

    /// Field read as string
    pub string_field: String,

    /// Functions writing a cvar by display name
    pub set_functions: Vec<String>,

    /// Functions asserting a cvar is within bounds
    pub range_functions: Vec<String>,

    /// Functions registering a cvar and returning its pointer
    pub get_functions: Vec<String>,

    /// Compile database entries containing any of these are skipped
    pub exclude_paths: Vec<String>,

    /// Folder name marking the root of a source tree
    pub source_root: String,

    /// Sibling of the source root whose presence enables `asset_dir`
    pub asset_marker: String,

    /// Asset directory scanned alongside the sources
    pub asset_dir: String,

    /// File extensions belonging to the source set
    pub extensions: Vec<String>,

    /// Diagnostics containing any of these are suppressed
    pub benign_diagnostics: Vec<String>,

    /// Flags implying consumption the AST cannot see
    pub live_flags: Vec<String>,

    /// Directories where a text hit plus a live flag means live
    pub live_text_dirs: Vec<String>,

    /// Free-text de-duplication granularity
    pub text_dedup: TextDedup,
}

/// How free-text hits are de-duplicated against classified occurrences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextDedup
{
    /// Any classified occurrence on the same line suppresses the hit
    Line,

    /// Only a classified occurrence at the same column suppresses the hit
    Exact,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PchConfig
{
    pub src: PathBuf,
    pub header: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CmakeConfig
{
    pub checks: Vec<CmakeCheck>,
}

/// One header tree audited against one CMake file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmakeCheck
{
    pub name: String,
    pub path: PathBuf,
    pub cmake: PathBuf,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub substitutions: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UniqueWordsConfig
{
    pub root: PathBuf,
    pub subpaths: Vec<String>,
    pub exclude_prefixes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MergedConfig
{
    pub base: String,
    pub max_commits: usize,
}

fn strings(items: &[&str]) -> Vec<String>
{
    items
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for CvarsConfig
{
    fn default() -> Self
    {
        Self {
            build_dir: PathBuf::from("build"),
            jobs: 6,
            editor: "vi".to_string(),
            cvar_types: strings(&["cvar_t", "vmCvar_t"]),
            table_type: "cvarTable_t".to_string(),
            table_fields: strings(&["vmCvar", "cvarName", "defaultString", "cvarFlags"]),
            table_cvar_field: "vmCvar".to_string(),
            table_name_field: "cvarName".to_string(),
            table_default_field: "defaultString".to_string(),
            table_flags_field: "cvarFlags".to_string(),
            int_field: "integer".to_string(),
            float_field: "value".to_string(),
            string_field: "string".to_string(),
            set_functions: strings(&["trap_Cvar_Set", "Cvar_Set"]),
            range_functions: strings(&["AssertCvarRange"]),
            get_functions: strings(&["trap_Cvar_Get", "Cvar_Get"]),
            exclude_paths: strings(&["libs/"]),
            source_root: "src".to_string(),
            asset_marker: "pkg".to_string(),
            asset_dir: "pkg/unvanquished_src.dpkdir/ui".to_string(),
            extensions: strings(&["h", "cpp", "rml", "lua"]),
            benign_diagnostics: strings(&["NORETURN", "PRINTF_LIKE", "ALIGNED("]),
            live_flags: strings(&["CVAR_USERINFO", "CVAR_SERVERINFO", "CVAR_ROM"]),
            live_text_dirs: strings(&["src/sgame/"]),
            text_dedup: TextDedup::Line,
        }
    }
}

impl Default for PchConfig
{
    fn default() -> Self
    {
        Self { src: PathBuf::from("daemon/src"), header: "common.h".to_string() }
    }
}

impl Default for UniqueWordsConfig
{
    fn default() -> Self
    {
        Self {
            root: PathBuf::from("."),
            subpaths: strings(&["libs", "src", "daemon/src", "daemon/libs"]),
            exclude_prefixes: strings(&["libs", "daemon/libs", "daemon/external_deps"]),
        }
    }
}

impl Default for MergedConfig
{
    fn default() -> Self
    {
        Self { base: "origin/master".to_string(), max_commits: 30 }
    }
}

pub fn load_config() -> Result<Config>
{
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    let config_paths = ["enginekit.toml", "enginekit.yaml", "enginekit.json", ".enginekit.toml"];

    for path in &config_paths
    {
        if Path::new(path).exists()
        {
            builder = builder.add_source(config::File::with_name(path));
            break;
        }
    }

    // Add environment variables with ENGINEKIT_ prefix (ENGINEKIT_CVARS__JOBS=8)
    builder = builder.add_source(
        config::Environment::with_prefix("ENGINEKIT")
            .prefix_separator("_")
            .separator("__"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("enginekit.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        println!("{toml_string}");
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml()
    {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.cvars.jobs, 6);
        assert_eq!(parsed.cvars.text_dedup, TextDedup::Line);
        assert_eq!(parsed.merged.max_commits, 30);
    }

    #[test]
    fn partial_config_keeps_defaults()
    {
        let parsed: Config = toml::from_str("[cvars]\njobs = 2\n").unwrap();
        assert_eq!(parsed.cvars.jobs, 2);
        assert_eq!(parsed.cvars.table_type, "cvarTable_t");
        assert_eq!(parsed.pch.header, "common.h");
    }
}
