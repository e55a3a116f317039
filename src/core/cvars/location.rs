//! Source locations of cvar mentions

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};

/// One token-level mention: normalized file path, 1-based line and column.
/// Several occurrences may share a (file, line).
///
/// `column` counts bytes, not characters: tree-sitter and the text scan
/// both report byte offsets, so a column after non-ASCII text on the same
/// line is larger than what an editor shows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Occurrence {
    pub file: Utf8PathBuf,
    pub line: usize,
    pub column: usize,
}

impl Occurrence {
    pub fn new(file: impl Into<Utf8PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// (file, line) key used for line-level de-duplication
    pub fn line_key(&self) -> (&Utf8Path, usize) {
        (&self.file, self.line)
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.column)
    }
}
