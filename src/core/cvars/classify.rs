//! Usage verdicts

use super::ledger::{Role, SymbolRecord};
use super::text_scan::in_any_dir;

/// Policy knobs for the flag heuristic
#[derive(Debug, Clone)]
pub struct LivePolicy {
    pub live_flags: Vec<String>,
    pub live_text_dirs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No definition was seen; needs a human
    NoDefinition,
    Live,
    /// Only free-text evidence; reported, never removed
    ProbablyLive,
    /// Safe to delete
    Dead,
}

impl Verdict {
    /// Line printed under the listing, if any
    pub fn banner(self) -> Option<&'static str> {
        match self {
            Verdict::NoDefinition => Some("UU: no def"),
            Verdict::ProbablyLive => Some("UU: probably"),
            Verdict::Dead => Some("UU: yes"),
            Verdict::Live => None,
        }
    }
}

/// First matching rule wins
pub fn classify(rec: &SymbolRecord, policy: &LivePolicy) -> Verdict {
    if !rec.has(Role::Def) {
        return Verdict::NoDefinition;
    }
    if [Role::Int, Role::Flt, Role::Str, Role::Other]
        .into_iter()
        .any(|r| rec.has(r))
    {
        return Verdict::Live;
    }
    let flagged = policy.live_flags.iter().any(|f| rec.has_flag(f));
    let text_in_live_dir = rec
        .occurrences(Role::Text)
        .any(|o| in_any_dir(&o.file, &policy.live_text_dirs));
    if flagged && text_in_live_dir {
        return Verdict::Live;
    }
    if rec.has(Role::Text) {
        return Verdict::ProbablyLive;
    }
    Verdict::Dead
}
