//! Query, match, and result types shared between the planner and the search
//! driver.

use crate::ids::{ChunkId, FileId};

/// An optional secondary regex filter (file path / tree / tags), with the
/// `not_*` negation flag folded in.
#[derive(Debug, Clone)]
pub struct PatternFilter {
    pub pattern: String,
    pub negate: bool,
}

/// One search request. `line` is the only required field.
#[derive(Debug, Clone)]
pub struct Query {
    pub line: String,
    pub file: Option<PatternFilter>,
    pub tree: Option<PatternFilter>,
    pub tags: Option<PatternFilter>,
    /// `None` selects the spec-mandated default: case-sensitive if `line`
    /// contains an uppercase ASCII letter, case-insensitive otherwise.
    pub fold_case: Option<bool>,
    pub max_matches: i32,
    pub filename_only: bool,
}

impl Query {
    pub fn new(line: impl Into<String>) -> Self {
        Query {
            line: line.into(),
            file: None,
            tree: None,
            tags: None,
            fold_case: None,
            max_matches: 50,
            filename_only: false,
        }
    }

    /// Resolves the effective case-folding behavior for this query's line
    /// pattern.
    pub fn effective_fold_case(&self) -> bool {
        self.fold_case
            .unwrap_or_else(|| !self.line.bytes().any(|b| b.is_ascii_uppercase()))
    }
}

/// A reference to a line's bytes inside chunk data. Zero-copy: callers index
/// into the owning `Chunk`'s data slice with this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRef {
    pub chunk: ChunkId,
    pub offset: u32,
    pub len: u32,
}

/// One file's view of a matching line: the line number within that file and
/// up to three lines of context on each side. `file` is the first file the
/// resolver visited; `paths` additionally lists every other file coalesced
/// into this context because it shares identical before/after context bytes
/// (spec.md §4.5) — always non-empty and always starting with `file`.
#[derive(Debug, Clone)]
pub struct MatchContext {
    pub file: FileId,
    pub paths: Vec<FileId>,
    pub lno: u32,
    pub context_before: Vec<LineRef>,
    pub context_after: Vec<LineRef>,
}

/// A matching line, resolved to every file (and all their paths) that share
/// it, with the matched byte range within the line.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub contexts: Vec<MatchContext>,
    pub line: LineRef,
    pub match_left: u32,
    pub match_right: u32,
}

/// Why a query stopped early; `None` means it ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitReason {
    None = 0,
    Timeout = 1,
    MatchLimit = 2,
}

impl ExitReason {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ExitReason::Timeout,
            2 => ExitReason::MatchLimit,
            _ => ExitReason::None,
        }
    }
}

/// Terminal statistics delivered after the last `MatchResult`.
#[derive(Debug, Clone)]
pub struct SearchStats {
    pub re2_time_ms: u64,
    pub sort_time_ms: u64,
    pub index_time_ms: u64,
    pub analyze_time_ms: u64,
    pub exit_reason: ExitReason,
}
