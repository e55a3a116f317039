//! Filepath: src/infra/utils.rs
//! Utility helpers organized by small, focused structs.
//! All functions are associated fns to keep call sites
//! ergonomic, testable, and discoverable.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
// Progress reporting for the parallel scanners
use indicatif::{ProgressBar, ProgressStyle};
// Tree-sitter types for node helpers
use tree_sitter::Node;

/// Lexical path helpers shared by the compile database, the
/// source walkers and the ledger
pub struct PathUtils;

impl PathUtils
{
    /// Forward-slash, lexically normalized form of `path`. `.` segments are
    /// dropped and `..` pops the previous normal segment. The filesystem is
    /// never consulted, so symlinks are not resolved.
    pub fn normalize(path: &str) -> Utf8PathBuf
    {
        let unified = path.replace('\\', "/");
        let mut out = Utf8PathBuf::new();

        for comp in Utf8Path::new(&unified).components()
        {
            match comp
            {
                Utf8Component::CurDir =>
                {}
                Utf8Component::ParentDir =>
                {
                    // Keep a leading `..` on relative paths
                    let popped = matches!(
                        out.components()
                            .next_back(),
                        Some(Utf8Component::Normal(_))
                    ) && out.pop();
                    if !popped && !out.has_root()
                    {
                        out.push("..");
                    }
                }
                other => out.push(other.as_str()),
            }
        }

        out
    }

    /// Resolve `path` against `base` when relative, then normalize
    pub fn resolve(
        base: &Utf8Path,
        path: &str,
    ) -> Utf8PathBuf
    {
        let unified = path.replace('\\', "/");
        if Utf8Path::new(&unified).is_absolute() || Self::has_drive(&unified)
        {
            Self::normalize(&unified)
        }
        else
        {
            Self::normalize(base.join(&unified).as_str())
        }
    }

    /// Windows drive prefix (`C:/`), which is not absolute on unix hosts
    fn has_drive(path: &str) -> bool
    {
        let b = path.as_bytes();
        b.len() >= 3 && b[0].is_ascii_alphabetic() && b[1] == b':' && b[2] == b'/'
    }

    /// Convert a std path, rejecting non-UTF-8 names
    pub fn from_std(path: &std::path::Path) -> Option<Utf8PathBuf>
    {
        Utf8Path::from_path(path).map(|p| Self::normalize(p.as_str()))
    }
}

/// Common Tree-sitter node helpers
pub struct TsNodeUtils;

impl TsNodeUtils
{
    /// Check if `node` has an ancestor of the given kind
    pub fn has_ancestor(
        node: Node,
        kind: &str,
    ) -> bool
    {
        Self::find_ancestor(node, kind).is_some()
    }

    /// Find the first ancestor of the given kind
    pub fn find_ancestor<'a>(
        mut node: Node<'a>,
        kind: &str,
    ) -> Option<Node<'a>>
    {
        // Walk up parents until we match or hit root
        while let Some(p) = node.parent()
        {
            if p.kind() == kind
            {
                return Some(p);
            }

            node = p;
        }

        // No ancestor found
        None
    }

    /// All children, named and anonymous
    pub fn children(node: Node<'_>) -> Vec<Node<'_>>
    {
        let mut cursor = node.walk();
        node.children(&mut cursor)
            .collect()
    }

    /// Named children only (skips punctuation and comments)
    pub fn named_children(node: Node<'_>) -> Vec<Node<'_>>
    {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .collect()
    }

    /// Source text covered by `node`
    pub fn text<'a>(
        node: Node,
        bytes: &'a [u8],
    ) -> &'a str
    {
        node.utf8_text(bytes)
            .unwrap_or("")
    }

    /// Extract text of a child field if present
    pub fn field_text<'a>(
        node: Node,
        field: &str,
        bytes: &'a [u8],
    ) -> Option<&'a str>
    {
        // Locate the child by field name
        let child = node.child_by_field_name(field)?;

        // Convert to utf8 text
        child
            .utf8_text(bytes)
            .ok()
    }

    /// 1-based (line, column) of the node start
    pub fn start_1based(node: Node) -> (usize, usize)
    {
        let s = node.start_position();
        (s.row + 1, s.column + 1)
    }
}

/// Progress bars shared by the parallel passes
pub struct ProgressUtils;

impl ProgressUtils
{
    /// Bar over `len` items, hidden in quiet mode
    pub fn bar(
        len: usize,
        quiet: bool,
        msg: &'static str,
    ) -> ProgressBar
    {
        if quiet
        {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(msg);
        pb
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn normalize_collapses_dots_and_backslashes()
    {
        assert_eq!(PathUtils::normalize("/a/./b/../c.cpp"), Utf8PathBuf::from("/a/c.cpp"));
        assert_eq!(PathUtils::normalize("C:\\unv\\src\\x.h"), Utf8PathBuf::from("C:/unv/src/x.h"));
        assert_eq!(PathUtils::normalize("../x/y"), Utf8PathBuf::from("../x/y"));
        assert_eq!(PathUtils::normalize("/../x"), Utf8PathBuf::from("/x"));
    }

    #[test]
    fn resolve_joins_relative_paths()
    {
        let base = Utf8Path::new("/build/dir");
        assert_eq!(PathUtils::resolve(base, "../src/a.cpp"), Utf8PathBuf::from("/build/src/a.cpp"));
        assert_eq!(PathUtils::resolve(base, "/abs/a.cpp"), Utf8PathBuf::from("/abs/a.cpp"));
        assert_eq!(PathUtils::resolve(base, "D:/w/a.cpp"), Utf8PathBuf::from("D:/w/a.cpp"));
    }

    #[test]
    fn node_helpers_on_cpp()
    {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_cpp::LANGUAGE.into())
            .unwrap();
        let src = "void f() { int x = 1; }\n";
        let tree = parser
            .parse(src, None)
            .unwrap();
        let root = tree.root_node();
        let func = TsNodeUtils::named_children(root)[0];
        assert_eq!(func.kind(), "function_definition");
        let body = func
            .child_by_field_name("body")
            .unwrap();
        let decl = TsNodeUtils::named_children(body)[0];
        assert!(TsNodeUtils::has_ancestor(decl, "function_definition"));
        assert_eq!(TsNodeUtils::field_text(decl, "type", src.as_bytes()), Some("int"));
        assert_eq!(TsNodeUtils::start_1based(decl), (1, 12));
    }
}
