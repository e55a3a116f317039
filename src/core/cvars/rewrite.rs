//! Removal and migration patches for one symbol
//!
//! Removal deletes every line the symbol touches. Migration rewrites a cvar
//! from the struct-plus-field idiom to the wrapped `Cvar::Cvar<T>` API,
//! marking with the sentinel whatever it cannot rewrite mechanically.
//! Edits are gathered per line first so several occurrences on one line
//! produce one coherent replacement.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use anyhow::Result;
use camino::Utf8PathBuf;
use regex::{Captures, Regex};

use super::ledger::{Role, SymbolRecord};
use crate::core::patch::{Patch, SENTINEL};
use crate::infra::config::CvarsConfig;
use crate::infra::source_cache::SourceCache;

const LATCH_FLAG: &str = "CVAR_LATCH";
const READ_ONLY_FLAG: &str = "CVAR_ROM";

/// Legacy flag → wrapped-API flag
const FLAG_TABLE: &[(&str, &str)] = &[
    ("CVAR_ARCHIVE", "Cvar::ARCHIVE"),
    ("CVAR_USERINFO", "Cvar::USERINFO"),
    ("CVAR_SERVERINFO", "Cvar::SERVERINFO"),
    ("CVAR_SYSTEMINFO", "Cvar::SYSTEMINFO"),
    ("CVAR_ROM", "Cvar::ROM"),
    ("CVAR_CHEAT", "Cvar::CHEAT"),
    ("CVAR_TEMP", "Cvar::TEMPORARY"),
    ("CVAR_USER_ARCHIVE", "Cvar::USER_ARCHIVE"),
];

/// Target value type of a migrated cvar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CvarType {
    Bool,
    Int,
    Float,
    Str,
    RangeInt { min: String, max: String },
    RangeFloat { min: String, max: String },
}

impl CvarType {
    /// Float reads win over int reads; anything else is a string. Captured
    /// bounds make numeric types ranged.
    pub fn infer(rec: &SymbolRecord) -> Self {
        let bounds = rec.bounds.first().cloned();
        if rec.bounds.len() > 1 {
            tracing::warn!("several range assertions; using the first");
        }
        match (rec.has(Role::Flt), rec.has(Role::Int), bounds) {
            (true, _, Some(b)) => CvarType::RangeFloat { min: b.min, max: b.max },
            (true, _, None) => CvarType::Float,
            (false, true, Some(b)) => CvarType::RangeInt { min: b.min, max: b.max },
            (false, true, None) => CvarType::Int,
            (false, false, _) => CvarType::Str,
        }
    }

    /// Operator override by name; ranged names take bounds
    pub fn from_choice(choice: &str, bounds: Option<(String, String)>) -> Option<Self> {
        let ty = match (choice.trim(), bounds) {
            ("bool", _) => CvarType::Bool,
            ("int", _) => CvarType::Int,
            ("float", _) => CvarType::Float,
            ("string", _) => CvarType::Str,
            ("range-int", Some((min, max))) => CvarType::RangeInt { min, max },
            ("range-float", Some((min, max))) => CvarType::RangeFloat { min, max },
            _ => return None,
        };
        Some(ty)
    }

    pub fn is_range_choice(choice: &str) -> bool {
        matches!(choice.trim(), "range-int" | "range-float")
    }

    pub fn value_type(&self) -> &'static str {
        match self {
            CvarType::Bool => "bool",
            CvarType::Int | CvarType::RangeInt { .. } => "int",
            CvarType::Float | CvarType::RangeFloat { .. } => "float",
            CvarType::Str => "std::string",
        }
    }

    pub fn bounds(&self) -> Option<(&str, &str)> {
        match self {
            CvarType::RangeInt { min, max } | CvarType::RangeFloat { min, max } => Some((min, max)),
            _ => None,
        }
    }

    pub fn is_ranged(&self) -> bool {
        self.bounds().is_some()
    }

    pub fn is_string(&self) -> bool {
        *self == CvarType::Str
    }
}

impl fmt::Display for CvarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = format!("Cvar::Cvar<{}>", self.value_type());
        if self.is_ranged() {
            write!(f, "Cvar::Range<{inner}>")
        } else {
            f.write_str(&inner)
        }
    }
}

/// Translate legacy flags. Returns the new flag list and whether the cvar
/// latched.
pub fn translate_flags(flags: &[String]) -> (Vec<String>, bool) {
    let mut out = Vec::new();
    let mut latch = false;
    for flag in flags {
        let flag = flag.trim();
        if flag == "0" || flag.is_empty() {
            continue;
        }
        if flag == LATCH_FLAG {
            latch = true;
            continue;
        }
        let mapped = FLAG_TABLE
            .iter()
            .find(|(old, _)| *old == flag)
            .map(|(_, new)| new.to_string())
            .unwrap_or_else(|| format!("XXX_FLAG_{flag}"));
        if !out.contains(&mapped) {
            out.push(mapped);
        }
    }
    (out, latch)
}

pub fn render_flags(flags: &[String]) -> String {
    if flags.is_empty() {
        "Cvar::NONE".to_string()
    } else {
        flags.join(" | ")
    }
}

fn strip_quotes(raw: &str) -> &str {
    let t = raw.trim();
    t.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(t)
}

/// Convert a legacy value expression for the target type
pub fn convert_value(raw: &str, ty: &CvarType) -> String {
    match ty {
        CvarType::Str => raw.trim().to_string(),
        CvarType::Bool => {
            let v = strip_quotes(raw);
            match v {
                "qtrue" | "true" => "true".to_string(),
                "qfalse" | "false" => "false".to_string(),
                _ => match v.parse::<i64>() {
                    Ok(n) => (n != 0).to_string(),
                    Err(_) => v.to_string(),
                },
            }
        }
        _ => strip_quotes(raw).to_string(),
    }
}

fn default_literal(ty: &CvarType) -> &'static str {
    match ty {
        CvarType::Bool => "false",
        CvarType::Str => "\"\"",
        _ => "0",
    }
}

fn indent_of(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Deletes every line the symbol touches
pub fn removal_patch(rec: &SymbolRecord, cache: &mut SourceCache, context: usize) -> Result<Patch> {
    let mut patch = Patch::new(context);
    let lines: BTreeSet<(Utf8PathBuf, usize)> = rec
        .all_occurrences()
        .map(|(_, o)| (o.file.clone(), o.line))
        .collect();
    for (file, line) in lines {
        patch.delete_line(cache, &file, line)?;
    }
    Ok(patch)
}

/// What happens to one source line
#[derive(Debug, Default)]
struct LineEdit {
    delete: bool,
    /// Replacement for the whole line; wins over `delete`
    whole: Option<String>,
    latch: Option<String>,
    substitutions: Vec<(String, String)>,
    rewrite_reads: bool,
    mark: bool,
}

/// A planned migration of one cvar
#[derive(Debug, Clone)]
pub struct Migration<'a> {
    pub name: &'a str,
    pub rec: &'a SymbolRecord,
    pub ty: CvarType,
    pub description: String,
}

impl<'a> Migration<'a> {
    pub fn new(name: &'a str, rec: &'a SymbolRecord) -> Self {
        Self {
            name,
            rec,
            ty: CvarType::infer(rec),
            description: String::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.rec
            .display_names
            .iter()
            .next()
            .map(String::as_str)
            .unwrap_or(self.name)
    }

    pub fn read_only(&self) -> bool {
        self.rec.has_flag(READ_ONLY_FLAG)
    }

    fn default_value(&self) -> String {
        if self.rec.defaults.len() > 1 {
            tracing::warn!("{} has several defaults; using the first", self.name);
        }
        self.rec
            .defaults
            .iter()
            .next()
            .map(|d| convert_value(d, &self.ty))
            .unwrap_or_else(|| default_literal(&self.ty).to_string())
    }

    /// `extern T name;`
    pub fn declaration(&self, indent: &str) -> String {
        format!("{indent}extern {} {};", self.ty, self.name)
    }

    /// `[static ]T name("display", "desc", FLAGS, default[, min, max]);`
    pub fn definition(&self, indent: &str, is_static: bool) -> String {
        let (flags, _) = translate_flags(&self.rec.flags);
        let mut args = vec![
            format!("\"{}\"", escape_literal(self.display_name())),
            format!("\"{}\"", escape_literal(&self.description)),
            render_flags(&flags),
            self.default_value(),
        ];
        if let Some((min, max)) = self.ty.bounds() {
            args.push(min.to_string());
            args.push(max.to_string());
        }
        let storage = if is_static { "static " } else { "" };
        format!("{indent}{storage}{} {}({});", self.ty, self.name, args.join(", "))
    }

    /// Replacement for a write call
    pub fn write_call(&self, raw_value: &str) -> String {
        if self.read_only() {
            format!("Cvar::SetValueForce(\"{}\", {})", escape_literal(self.display_name()), raw_value.trim())
        } else {
            format!("{}.Set({})", self.name, convert_value(raw_value, &self.ty))
        }
    }

    fn read_regex(&self, cfg: &CvarsConfig) -> Result<Regex> {
        Ok(Regex::new(&format!(
            r"\b{}\s*(?:\.|->)\s*({}|{}|{})\b",
            regex::escape(self.name),
            regex::escape(&cfg.int_field),
            regex::escape(&cfg.float_field),
            regex::escape(&cfg.string_field),
        ))?)
    }

    /// Build the migration patch
    pub fn patch(&self, cfg: &CvarsConfig, cache: &mut SourceCache, context: usize) -> Result<Patch> {
        let (_, latch) = translate_flags(&self.rec.flags);
        let mut edits: BTreeMap<(Utf8PathBuf, usize), LineEdit> = BTreeMap::new();

        for (role, occ) in self.rec.all_occurrences() {
            let edit = edits.entry((occ.file.clone(), occ.line)).or_default();
            match role {
                Role::Decl | Role::Def => {
                    let original = cache.line(&occ.file, occ.line)?.unwrap_or_default();
                    let indent = indent_of(&original);
                    edit.whole = Some(if role == Role::Decl {
                        self.declaration(indent)
                    } else {
                        self.definition(indent, original.trim_start().starts_with("static "))
                    });
                }
                Role::Set => match self.rec.writes.get(occ) {
                    Some(site) => edit
                        .substitutions
                        .push((site.call.clone(), self.write_call(&site.value))),
                    None => edit.mark = true,
                },
                Role::Int | Role::Flt | Role::Str => edit.rewrite_reads = true,
                Role::Get => {
                    if latch {
                        let original = cache.line(&occ.file, occ.line)?.unwrap_or_default();
                        edit.latch = Some(format!("{}Cvar::Latch({});", indent_of(&original), self.name));
                    } else {
                        edit.delete = true;
                    }
                }
                Role::Tab => edit.delete = true,
                Role::Range if self.ty.is_ranged() => edit.delete = true,
                Role::Range | Role::Other | Role::Text => edit.mark = true,
            }
        }

        let reads = self.read_regex(cfg)?;
        let mut patch = Patch::new(context);
        for ((file, line), mut edit) in edits {
            if edit.whole.is_none() && edit.latch.is_none() && edit.delete {
                patch.delete_line(cache, &file, line)?;
                continue;
            }
            let Some(original) = cache.line(&file, line)? else {
                tracing::warn!("{file}:{line} is gone; edit skipped");
                continue;
            };
            // A registration sharing the definition's line keeps its latch
            let (mut text, mut mark, trailing) = match (edit.whole.take(), edit.latch.take()) {
                (Some(whole), latch) => (whole, false, latch),
                (None, Some(latch)) => (latch, false, None),
                (None, None) => {
                    let (text, mark) = self.rewrite_line(&original, &edit, &reads, cfg);
                    (text, mark, None)
                }
            };
            mark |= edit.mark;
            if mark {
                text = format!("{SENTINEL}{text}");
            }
            match trailing {
                Some(latch) => {
                    patch.replace_line_with(cache, &file, line, vec![text, latch])?;
                }
                None if text != original => {
                    patch.replace_line(cache, &file, line, text)?;
                }
                None => {}
            }
        }
        Ok(patch)
    }

    /// Apply call substitutions and read rewrites; the flag reports whether
    /// something could not be rewritten
    fn rewrite_line(&self, original: &str, edit: &LineEdit, reads: &Regex, cfg: &CvarsConfig) -> (String, bool) {
        let mut text = original.to_string();
        let mut unresolved = false;

        for (from, to) in &edit.substitutions {
            if text.contains(from.as_str()) {
                text = text.replacen(from.as_str(), to, 1);
            } else {
                unresolved = true;
            }
        }

        if edit.rewrite_reads {
            if !reads.is_match(&text) {
                unresolved = true;
            }
            let replaced = reads.replace_all(&text, |caps: &Captures| {
                let field = &caps[1];
                if field == cfg.string_field {
                    if self.ty.is_string() {
                        format!("{}.Get().c_str()", self.name)
                    } else {
                        unresolved = true;
                        caps[0].to_string()
                    }
                } else if self.ty.is_string() {
                    unresolved = true;
                    caps[0].to_string()
                } else {
                    format!("{}.Get()", self.name)
                }
            });
            text = replaced.into_owned();
        }

        (text, unresolved)
    }
}
