//! Per-symbol usage ledger
//!
//! One [`SymbolRecord`] per tracked cvar name, holding its occurrences
//! partitioned by [`Role`] plus the registration metadata gathered along the
//! way. The ledger is built by a single sequential pass after parsing, then
//! only shrinks (table scrub) or gains free-text hits.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use camino::Utf8Path;

use super::location::Occurrence;
use super::walker::{Finding, Pattern, ReadKind};

/// Syntactic role of an occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Decl,
    Def,
    Get,
    Int,
    Flt,
    Str,
    Tab,
    Set,
    Range,
    Other,
    Text,
}

impl Role {
    pub const ALL: [Role; 11] = [
        Role::Decl,
        Role::Def,
        Role::Get,
        Role::Int,
        Role::Flt,
        Role::Str,
        Role::Tab,
        Role::Set,
        Role::Range,
        Role::Other,
        Role::Text,
    ];

    /// Listing tag
    pub fn tag(self) -> &'static str {
        match self {
            Role::Decl => "DECL",
            Role::Def => "DEF",
            Role::Get => "GET",
            Role::Int => "INT",
            Role::Flt => "FLT",
            Role::Str => "STR",
            Role::Tab => "TAB",
            Role::Set => "SET",
            Role::Range => "RANGE",
            Role::Other => "OTHER",
            Role::Text => "TEXT",
        }
    }

    /// Produced by the AST walk rather than the text scan
    pub fn is_ast(self) -> bool {
        self != Role::Text
    }

    pub fn is_typed_read(self) -> bool {
        matches!(self, Role::Int | Role::Flt | Role::Str)
    }
}

impl From<ReadKind> for Role {
    fn from(kind: ReadKind) -> Self {
        match kind {
            ReadKind::Int => Role::Int,
            ReadKind::Float => Role::Flt,
            ReadKind::String => Role::Str,
        }
    }
}

/// A write call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSite {
    /// Raw source of the written value expression
    pub value: String,
    /// Raw source of the whole call, used for in-line replacement
    pub call: String,
}

/// Captured range-assertion bounds (raw source text)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bounds {
    pub min: String,
    pub max: String,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolRecord {
    pub roles: BTreeMap<Role, BTreeSet<Occurrence>>,
    pub display_names: BTreeSet<String>,
    pub flags: Vec<String>,
    pub bounds: Vec<Bounds>,
    pub defaults: BTreeSet<String>,
    pub writes: BTreeMap<Occurrence, WriteSite>,
}

impl SymbolRecord {
    pub fn add(&mut self, role: Role, at: Occurrence) {
        self.roles.entry(role).or_default().insert(at);
    }

    pub fn occurrences(&self, role: Role) -> impl Iterator<Item = &Occurrence> {
        self.roles.get(&role).into_iter().flatten()
    }

    pub fn has(&self, role: Role) -> bool {
        self.roles.get(&role).is_some_and(|s| !s.is_empty())
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// Occurrences from the AST walk, every role but text
    pub fn ast_occurrences(&self) -> impl Iterator<Item = (Role, &Occurrence)> {
        self.roles
            .iter()
            .filter(|(role, _)| role.is_ast())
            .flat_map(|(role, set)| set.iter().map(move |o| (*role, o)))
    }

    pub fn all_occurrences(&self) -> impl Iterator<Item = (Role, &Occurrence)> {
        self.roles
            .iter()
            .flat_map(|(role, set)| set.iter().map(move |o| (*role, o)))
    }

    fn merge_flags(&mut self, flags: &[String]) {
        for flag in flags {
            if !self.has_flag(flag) {
                self.flags.push(flag.clone());
            }
        }
    }

    fn note_registration(&mut self, display: &Option<String>, default: &Option<String>, flags: &[String]) {
        if let Some(d) = display {
            self.display_names.insert(d.clone());
        }
        if let Some(d) = default {
            self.defaults.insert(d.clone());
        }
        self.merge_flags(flags);
    }

    /// Remove every non-table occurrence sharing a (file, line) with a table
    /// entry
    pub fn scrub_table_lines(&mut self) {
        let table: HashSet<(&Utf8Path, usize)> = match self.roles.get(&Role::Tab) {
            Some(set) => set.iter().map(|o| (o.file.as_path(), o.line)).collect(),
            None => return,
        };
        let doomed: Vec<(Role, Occurrence)> = self
            .roles
            .iter()
            .filter(|(role, _)| **role != Role::Tab)
            .flat_map(|(role, set)| {
                set.iter()
                    .filter(|o| table.contains(&o.line_key()))
                    .map(move |o| (*role, o.clone()))
            })
            .collect();
        for (role, occ) in doomed {
            if let Some(set) = self.roles.get_mut(&role) {
                set.remove(&occ);
            }
            self.writes.remove(&occ);
        }
    }
}

/// Write recorded before its symbol is known
#[derive(Debug, Clone)]
struct PendingWrite {
    key: String,
    at: Occurrence,
    site: WriteSite,
}

#[derive(Debug, Default)]
pub struct Ledger {
    pub symbols: BTreeMap<String, SymbolRecord>,
    pending_writes: Vec<PendingWrite>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&SymbolRecord> {
        self.symbols.get(name)
    }

    fn entry(&mut self, name: &str) -> &mut SymbolRecord {
        self.symbols.entry(name.to_string()).or_default()
    }

    /// Fold one walker finding into the ledger
    pub fn record(&mut self, finding: Finding) {
        let Finding { pattern, at } = finding;
        match pattern {
            Pattern::Declaration { name, definition } => {
                let role = if definition { Role::Def } else { Role::Decl };
                self.entry(&name).add(role, at);
            }
            Pattern::FieldRead { name, kind } => self.entry(&name).add(kind.into(), at),
            Pattern::SetCall { key, value, call } => self.pending_writes.push(PendingWrite {
                key,
                at,
                site: WriteSite { value, call },
            }),
            Pattern::RangeAssert { name, min, max } => {
                let rec = self.entry(&name);
                rec.add(Role::Range, at);
                let b = Bounds { min, max };
                if !rec.bounds.contains(&b) {
                    rec.bounds.push(b);
                }
            }
            Pattern::Registration {
                name,
                display,
                default,
                flags,
            } => {
                let rec = self.entry(&name);
                rec.add(Role::Get, at);
                rec.note_registration(&display, &default, &flags);
            }
            Pattern::TableEntry {
                name,
                display,
                default,
                flags,
            } => {
                let rec = self.entry(&name);
                rec.add(Role::Tab, at);
                rec.note_registration(&display, &default, &flags);
            }
            Pattern::AddressOf { name } => self.entry(&name).add(Role::Other, at),
            Pattern::Unrecognized { name, context } => {
                tracing::warn!("unhandled use of {name} at {}:{}: {context}", at.file, at.line);
            }
        }
    }

    /// Lower-cased name and display name → symbol name
    pub fn text_keys(&self) -> HashMap<String, String> {
        let mut keys: HashMap<String, String> = self
            .symbols
            .keys()
            .map(|name| (name.to_lowercase(), name.clone()))
            .collect();
        for (name, rec) in &self.symbols {
            for display in &rec.display_names {
                keys.entry(display.to_lowercase())
                    .or_insert_with(|| name.clone());
            }
        }
        keys
    }

    /// Attach pending writes to symbols by lower-cased name or display name
    pub fn resolve_writes(&mut self) {
        let keys = self.text_keys();
        for w in std::mem::take(&mut self.pending_writes) {
            match keys.get(&w.key) {
                Some(name) => {
                    let rec = self.entry(name);
                    rec.add(Role::Set, w.at.clone());
                    rec.writes.insert(w.at, w.site);
                }
                None => tracing::debug!("write to unknown cvar \"{}\" at {}", w.key, w.at),
            }
        }
    }

    pub fn scrub_table_lines(&mut self) {
        for rec in self.symbols.values_mut() {
            rec.scrub_table_lines();
        }
    }
}
