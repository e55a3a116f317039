use camino::Utf8PathBuf;
use thiserror::Error;

use super::location::Occurrence;

/// Conditions under which the cvar ledger cannot be trusted. All of them
/// abort the run: a patch built on a partial ledger would be wrong.
#[derive(Debug, Error)]
pub enum CvarError {
    /// A translation unit could not be read or produced no syntax tree
    #[error(
        "failed to parse {source_file}: {reason}\n  original command line: {original_args:?}\n  modified args: {adjusted_args:?}"
    )]
    ParseFailed {
        source_file: Utf8PathBuf,
        reason: String,
        original_args: Vec<String>,
        adjusted_args: Vec<String>,
    },

    /// An AST occurrence points outside the all-sources set
    #[error("occurrence in {path} is outside the scanned source set")]
    LocationOutsideSources { path: Utf8PathBuf },

    /// A registration table entry does not have the expected shape
    #[error("malformed cvar table entry at {location}: {reason}")]
    MalformedTable { location: Occurrence, reason: String },

    /// A line the patch expects is gone from disk
    #[error("line {line} of {path} does not exist")]
    LineNotFound { path: Utf8PathBuf, line: usize },
}
