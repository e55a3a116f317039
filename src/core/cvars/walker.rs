//! AST classification of cvar mentions
//!
//! Two sweeps over the parsed files. The first collects the tracked names
//! (file-scope declarations of a cvar type) and the registration table
//! layout. The second visits every node depth-first and turns recognized
//! shapes into [`Pattern`]s. Nodes consumed by a recognized parent never
//! produce their own pattern, but the walk still descends into them.

use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::Result;
use itertools::Itertools;
use regex::Regex;
use tree_sitter::Node;

use super::error::CvarError;
use super::location::Occurrence;
use crate::infra::config::CvarsConfig;
use crate::infra::utils::TsNodeUtils;
use crate::parsers::ParsedFile;

static PLAIN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]\w*$").expect("valid name regex"));

/// Which typed field a read goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    Int,
    Float,
    String,
}

/// Recognized syntactic shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// File-scope variable of a cvar type; `definition` is false for a bare
    /// `extern` declaration
    Declaration { name: String, definition: bool },
    /// `name.field` or `name->field` on one of the typed fields
    FieldRead { name: String, kind: ReadKind },
    /// Set function called with a literal cvar name; keyed lower-cased
    SetCall { key: String, value: String, call: String },
    /// Range assertion on a tracked cvar
    RangeAssert { name: String, min: String, max: String },
    /// `name = Get("display", default, flags)`
    Registration {
        name: String,
        display: Option<String>,
        default: Option<String>,
        flags: Vec<String>,
    },
    /// One element of a registration table
    TableEntry {
        name: String,
        display: Option<String>,
        default: Option<String>,
        flags: Vec<String>,
    },
    /// `&name` outside any recognized shape
    AddressOf { name: String },
    /// Tracked name in an unrecognized position
    Unrecognized { name: String, context: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub pattern: Pattern,
    pub at: Occurrence,
}

/// Output of the first sweep
#[derive(Debug, Clone, Default)]
pub struct Globals {
    pub tracked: HashSet<String>,
    pub table_fields: Vec<String>,
}

/// Word-boundary matcher over a list of type names
#[derive(Debug, Clone)]
struct TypeMatcher(Regex);

impl TypeMatcher {
    fn new(names: &[String]) -> Result<Self> {
        let alts = names.iter().map(|n| regex::escape(n)).join("|");
        Ok(Self(Regex::new(&format!(r"\b(?:{alts})\b"))?))
    }

    fn matches(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

/// Name of the variable a declarator introduces, if it introduces one
fn declarator_name(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "identifier" | "field_identifier" => Some(node),
        "function_declarator" | "abstract_function_declarator" => None,
        "init_declarator"
        | "pointer_declarator"
        | "reference_declarator"
        | "array_declarator"
        | "parenthesized_declarator"
        | "attributed_declarator" => {
            let inner = node.child_by_field_name("declarator").or_else(|| {
                TsNodeUtils::named_children(node).into_iter().find(|c| {
                    matches!(c.kind(), "identifier" | "field_identifier") || c.kind().ends_with("declarator")
                })
            })?;
            declarator_name(inner)
        }
        _ => None,
    }
}

fn field_nodes<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Contents of a plain string literal, without prefix or quotes
fn literal_content(node: Node, bytes: &[u8]) -> Option<String> {
    if node.kind() != "string_literal" {
        return None;
    }
    let text = TsNodeUtils::text(node, bytes);
    let start = text.find('"')?;
    let end = text.rfind('"')?;
    (end > start).then(|| text[start + 1..end].to_string())
}

/// Split a flag expression on `|`
fn split_flags(text: &str) -> Vec<String> {
    text.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Last `::` segment of a callee
fn callee_name<'a>(node: Node, bytes: &'a [u8]) -> Option<&'a str> {
    let f = node.child_by_field_name("function")?;
    let text = TsNodeUtils::text(f, bytes);
    Some(text.rsplit("::").next().unwrap_or(text).trim())
}

fn call_arguments(node: Node<'_>) -> Vec<Node<'_>> {
    node.child_by_field_name("arguments")
        .map(TsNodeUtils::named_children)
        .unwrap_or_default()
}

/// `&ident` → ident
fn address_of_target<'a>(node: Node<'a>, bytes: &[u8]) -> Option<Node<'a>> {
    if node.kind() != "pointer_expression" {
        return None;
    }
    let op = node.child_by_field_name("operator")?;
    if TsNodeUtils::text(op, bytes) != "&" {
        return None;
    }
    node.child_by_field_name("argument")
        .filter(|a| a.kind() == "identifier")
}

fn is_null_literal(node: Node, bytes: &[u8]) -> bool {
    matches!(node.kind(), "null" | "nullptr")
        || matches!(TsNodeUtils::text(node, bytes).trim(), "NULL" | "0" | "nullptr")
}

fn is_file_scope(node: Node) -> bool {
    !TsNodeUtils::has_ancestor(node, "compound_statement")
        && !TsNodeUtils::has_ancestor(node, "field_declaration_list")
        && !TsNodeUtils::has_ancestor(node, "parameter_list")
}

fn occurrence(file: &ParsedFile, node: Node) -> Occurrence {
    let (line, column) = TsNodeUtils::start_1based(node);
    Occurrence::new(file.path.clone(), line, column)
}

/// First sweep: tracked global names and the table layout
pub fn collect_globals(files: &[ParsedFile], cfg: &CvarsConfig) -> Result<Globals> {
    let cvar_type = TypeMatcher::new(&cfg.cvar_types)?;
    let mut globals = Globals::default();
    let mut layout: Option<Vec<String>> = None;

    for file in files {
        let bytes = file.bytes();
        let mut stack = vec![file.tree.root_node()];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "declaration" if is_file_scope(node) => {
                    let ty = TsNodeUtils::field_text(node, "type", bytes).unwrap_or("");
                    if cvar_type.matches(ty) {
                        for d in field_nodes(node, "declarator") {
                            if let Some(id) = declarator_name(d) {
                                globals.tracked.insert(TsNodeUtils::text(id, bytes).to_string());
                            }
                        }
                    }
                }
                "type_definition" if layout.is_none() => {
                    let named = field_nodes(node, "declarator")
                        .iter()
                        .any(|d| TsNodeUtils::text(*d, bytes) == cfg.table_type);
                    if let Some(body) = node
                        .child_by_field_name("type")
                        .filter(|_| named)
                        .and_then(|t| t.child_by_field_name("body"))
                    {
                        layout = Some(struct_fields(body, bytes));
                    }
                }
                "struct_specifier" if layout.is_none() => {
                    if TsNodeUtils::field_text(node, "name", bytes) == Some(cfg.table_type.as_str())
                        && let Some(body) = node.child_by_field_name("body")
                    {
                        layout = Some(struct_fields(body, bytes));
                    }
                }
                _ => {}
            }
            stack.extend(TsNodeUtils::named_children(node));
        }
    }

    globals.table_fields = layout
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| cfg.table_fields.clone());
    tracing::debug!(
        "tracking {} cvars; table layout {:?}",
        globals.tracked.len(),
        globals.table_fields
    );
    Ok(globals)
}

fn struct_fields(body: Node, bytes: &[u8]) -> Vec<String> {
    TsNodeUtils::named_children(body)
        .into_iter()
        .filter(|n| n.kind() == "field_declaration")
        .flat_map(|fd| field_nodes(fd, "declarator"))
        .filter_map(declarator_name)
        .map(|id| TsNodeUtils::text(id, bytes).to_string())
        .collect()
}

/// Second sweep over one file
pub struct Walker<'a> {
    cfg: &'a CvarsConfig,
    globals: &'a Globals,
    file: &'a ParsedFile,
    cvar_type: TypeMatcher,
    table_type: TypeMatcher,
    consumed: HashSet<usize>,
    shadowed: Vec<HashSet<String>>,
    findings: Vec<Finding>,
}

impl<'a> Walker<'a> {
    pub fn new(cfg: &'a CvarsConfig, globals: &'a Globals, file: &'a ParsedFile) -> Result<Self> {
        Ok(Self {
            cfg,
            globals,
            file,
            cvar_type: TypeMatcher::new(&cfg.cvar_types)?,
            table_type: TypeMatcher::new(std::slice::from_ref(&cfg.table_type))?,
            consumed: HashSet::new(),
            shadowed: Vec::new(),
            findings: Vec::new(),
        })
    }

    /// Walk the whole file
    pub fn run(mut self) -> Result<Vec<Finding>> {
        let root = self.file.tree.root_node();
        self.visit(root)?;
        Ok(self.findings)
    }

    fn bytes(&self) -> &'a [u8] {
        self.file.bytes()
    }

    fn text(&self, node: Node) -> &'a str {
        TsNodeUtils::text(node, self.bytes())
    }

    fn consume(&mut self, node: Node) {
        self.consumed.insert(node.id());
    }

    fn is_consumed(&self, node: Node) -> bool {
        self.consumed.contains(&node.id())
    }

    /// Tracked global that no enclosing function shadows
    fn is_live_name(&self, name: &str) -> bool {
        self.globals.tracked.contains(name) && !self.shadowed.iter().any(|s| s.contains(name))
    }

    fn emit(&mut self, pattern: Pattern, node: Node) {
        let at = occurrence(self.file, node);
        self.findings.push(Finding { pattern, at });
    }

    fn visit(&mut self, node: Node) -> Result<()> {
        let scoped = matches!(node.kind(), "function_definition" | "lambda_expression");
        if scoped {
            let names = self.function_locals(node);
            self.shadowed.push(names);
        }

        match node.kind() {
            "declaration" => self.declaration(node)?,
            "field_expression" => self.field_read(node),
            "call_expression" => self.call(node),
            "assignment_expression" => self.assignment(node),
            "pointer_expression" => self.address_of(node),
            "identifier" => self.unrecognized(node),
            _ => {}
        }

        for child in TsNodeUtils::children(node) {
            self.visit(child)?;
        }

        if scoped {
            self.shadowed.pop();
        }
        Ok(())
    }

    /// Parameters and local declarations of a function or lambda
    fn function_locals(&self, func: Node) -> HashSet<String> {
        let mut names = HashSet::new();
        let mut stack = vec![func];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "parameter_declaration" | "optional_parameter_declaration" | "for_range_loop" => {
                    if let Some(id) = node.child_by_field_name("declarator").and_then(declarator_name) {
                        names.insert(self.text(id).to_string());
                    }
                }
                "declaration" if node.id() != func.id() => {
                    for d in field_nodes(node, "declarator") {
                        if let Some(id) = declarator_name(d) {
                            names.insert(self.text(id).to_string());
                        }
                    }
                }
                _ => {}
            }
            // Nested functions get their own scope
            let nested = node.id() != func.id()
                && matches!(node.kind(), "function_definition" | "lambda_expression");
            if !nested {
                stack.extend(TsNodeUtils::named_children(node));
            }
        }
        names
    }

    fn declaration(&mut self, node: Node) -> Result<()> {
        let ty = TsNodeUtils::field_text(node, "type", self.bytes()).unwrap_or("");
        let is_extern = TsNodeUtils::children(node)
            .iter()
            .any(|c| c.kind() == "storage_class_specifier" && self.text(*c) == "extern");

        if self.table_type.matches(ty) {
            for d in field_nodes(node, "declarator") {
                if let Some(list) = d
                    .child_by_field_name("value")
                    .filter(|v| v.kind() == "initializer_list")
                {
                    self.table(list)?;
                }
            }
            return Ok(());
        }

        let cvar_typed = self.cvar_type.matches(ty);
        let file_scope = is_file_scope(node);

        for d in field_nodes(node, "declarator") {
            let Some(id) = declarator_name(d) else {
                continue;
            };
            let init = (d.kind() == "init_declarator")
                .then(|| d.child_by_field_name("value"))
                .flatten();

            if cvar_typed && file_scope {
                let name = self.text(id).to_string();
                self.consume(id);
                let definition = !is_extern || init.is_some();
                self.emit(Pattern::Declaration { name: name.clone(), definition }, id);
            }

            // `cvar_t *x = Get(...)` registers x when x is the tracked global
            if let Some(call) = init.filter(|v| v.kind() == "call_expression") {
                let name = self.text(id);
                if cvar_typed && file_scope && self.is_live_name(name) {
                    self.registration(name.to_string(), call);
                }
            }
        }
        Ok(())
    }

    fn field_read(&mut self, node: Node) {
        let Some(arg) = node.child_by_field_name("argument").filter(|a| a.kind() == "identifier") else {
            return;
        };
        let field = TsNodeUtils::field_text(node, "field", self.bytes()).unwrap_or("");
        let kind = if field == self.cfg.int_field {
            ReadKind::Int
        } else if field == self.cfg.float_field {
            ReadKind::Float
        } else if field == self.cfg.string_field {
            ReadKind::String
        } else {
            return;
        };
        let name = self.text(arg);
        if self.is_consumed(arg) || !self.is_live_name(name) {
            return;
        }
        self.consume(arg);
        self.emit(
            Pattern::FieldRead {
                name: name.to_string(),
                kind,
            },
            arg,
        );
    }

    fn call(&mut self, node: Node) {
        if self.is_consumed(node) {
            return;
        }
        let Some(callee) = callee_name(node, self.bytes()) else {
            return;
        };
        let args = call_arguments(node);

        if self.cfg.set_functions.iter().any(|f| f == callee) {
            let Some(key) = args.first().and_then(|a| literal_content(*a, self.bytes())) else {
                tracing::debug!("set call without literal name: {}", self.text(node));
                return;
            };
            let value = args.get(1).map(|v| self.text(*v).to_string()).unwrap_or_default();
            let call = self.text(node).to_string();
            self.consume(node);
            self.emit(
                Pattern::SetCall {
                    key: key.to_lowercase(),
                    value,
                    call,
                },
                node,
            );
        } else if self.cfg.range_functions.iter().any(|f| f == callee) {
            let Some(first) = args.first().copied() else {
                return;
            };
            let target = address_of_target(first, self.bytes())
                .or_else(|| (first.kind() == "identifier").then_some(first));
            let Some(id) = target else {
                return;
            };
            let name = self.text(id);
            if !self.is_live_name(name) {
                return;
            }
            let bound = |i: usize| args.get(i).map(|a| self.text(*a).to_string()).unwrap_or_default();
            let pattern = Pattern::RangeAssert {
                name: name.to_string(),
                min: bound(1),
                max: bound(2),
            };
            self.consume(first);
            self.consume(id);
            self.consume(node);
            self.emit(pattern, node);
        }
    }

    fn assignment(&mut self, node: Node) {
        let (Some(left), Some(right)) = (node.child_by_field_name("left"), node.child_by_field_name("right"))
        else {
            return;
        };
        if left.kind() != "identifier" || right.kind() != "call_expression" {
            return;
        }
        let name = self.text(left);
        if !self.is_live_name(name) {
            return;
        }
        let is_get = callee_name(right, self.bytes())
            .is_some_and(|c| self.cfg.get_functions.iter().any(|f| f == c));
        if is_get {
            self.consume(left);
            self.registration(name.to_string(), right);
        }
    }

    /// Record a get-or-register call assigned into `name`
    fn registration(&mut self, name: String, call: Node) {
        let is_get = callee_name(call, self.bytes())
            .is_some_and(|c| self.cfg.get_functions.iter().any(|f| f == c));
        if !is_get {
            return;
        }
        let args = call_arguments(call);
        let display = args.first().and_then(|a| literal_content(*a, self.bytes()));
        let default = args.get(1).map(|a| self.text(*a).to_string());
        let flags = args.get(2).map(|a| split_flags(self.text(*a))).unwrap_or_default();
        self.consume(call);
        self.emit(
            Pattern::Registration {
                name,
                display,
                default,
                flags,
            },
            call,
        );
    }

    fn address_of(&mut self, node: Node) {
        if self.is_consumed(node) {
            return;
        }
        let Some(id) = address_of_target(node, self.bytes()) else {
            return;
        };
        let name = self.text(id);
        if self.is_consumed(id) || !PLAIN_NAME.is_match(name) || !self.is_live_name(name) {
            return;
        }
        self.consume(id);
        self.emit(Pattern::AddressOf { name: name.to_string() }, node);
    }

    fn unrecognized(&mut self, node: Node) {
        if self.is_consumed(node) {
            return;
        }
        let name = self.text(node);
        if !self.is_live_name(name) {
            return;
        }
        // The callee of a call is a function, not a use
        if let Some(parent) = node.parent()
            && parent.kind() == "call_expression"
            && parent.child_by_field_name("function").map(|f| f.id()) == Some(node.id())
        {
            return;
        }
        let (line, _) = TsNodeUtils::start_1based(node);
        let context = self.file.line(line).trim().to_string();
        self.emit(
            Pattern::Unrecognized {
                name: name.to_string(),
                context,
            },
            node,
        );
    }

    /// Every element of a registration table initializer
    fn table(&mut self, list: Node) -> Result<()> {
        for entry in TsNodeUtils::named_children(list) {
            if entry.kind() == "initializer_list" {
                self.table_entry(entry)?;
            }
        }
        Ok(())
    }

    fn table_entry(&mut self, entry: Node) -> Result<()> {
        let bytes = self.bytes();
        let at = occurrence(self.file, entry);
        let malformed = |reason: String| CvarError::MalformedTable {
            location: at.clone(),
            reason,
        };

        let fields = &self.globals.table_fields;
        let mut cvar = None;
        let mut display = None;
        let mut default = None;
        let mut flags = Vec::new();

        for (i, value) in TsNodeUtils::named_children(entry).into_iter().enumerate() {
            let (field, value) = if value.kind() == "initializer_pair" {
                let designator = value
                    .child_by_field_name("designator")
                    .map(|d| TsNodeUtils::text(d, bytes).trim_start_matches('.').trim())
                    .unwrap_or("");
                let Some(v) = value.child_by_field_name("value") else {
                    continue;
                };
                (designator, v)
            } else {
                let Some(field) = fields.get(i) else {
                    return Err(malformed(format!("{} values for {} fields", i + 1, fields.len())).into());
                };
                (field.as_str(), value)
            };

            if field == self.cfg.table_cvar_field {
                if is_null_literal(value, bytes) {
                    return Ok(());
                }
                let Some(id) = address_of_target(value, bytes) else {
                    return Err(malformed(format!("cvar field is not an address-of: {}", TsNodeUtils::text(value, bytes))).into());
                };
                let name = TsNodeUtils::text(id, bytes);
                if !PLAIN_NAME.is_match(name) {
                    return Err(malformed(format!("unexpected cvar name {name}")).into());
                }
                cvar = Some((name.to_string(), value, id));
            } else if field == self.cfg.table_name_field {
                let Some(lit) = literal_content(value, bytes) else {
                    return Err(malformed(format!("name field is not a string literal: {}", TsNodeUtils::text(value, bytes))).into());
                };
                display = Some(lit);
            } else if field == self.cfg.table_default_field {
                default = Some(TsNodeUtils::text(value, bytes).to_string());
            } else if field == self.cfg.table_flags_field {
                flags = split_flags(TsNodeUtils::text(value, bytes));
            }
        }

        let Some((name, addr, id)) = cvar else {
            tracing::debug!("table entry without a cvar at {}:{}", at.file, at.line);
            return Ok(());
        };
        self.consume(addr);
        self.consume(id);
        self.findings.push(Finding {
            pattern: Pattern::TableEntry {
                name,
                display,
                default,
                flags,
            },
            at,
        });
        Ok(())
    }
}

/// Run both sweeps over every file
pub fn walk_all(files: &[ParsedFile], cfg: &CvarsConfig) -> Result<Vec<Finding>> {
    let globals = collect_globals(files, cfg)?;
    let mut out = Vec::new();
    for file in files {
        out.extend(Walker::new(cfg, &globals, file)?.run()?);
    }
    Ok(out)
}
