use sqltmpl_core::{KeyIndex, KeyRegistry, Token};

use crate::condition::CondExpr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    Where,
    Having,
    Set,
    On,
    SelectList,
    GroupBy,
    OrderBy,
    ValuesList,
    CaseWhen,
    CaseThen,
    CaseElse,
    Other,
}

/// A token range introduced by a section keyword (or a sub-query paren),
/// hidden as a whole when none of its owned segments end up active.
#[derive(Debug, Clone)]
pub struct Clause {
    pub kind: ClauseKind,
    pub lead: Option<(u32, u32)>,
    pub trail: Option<(u32, u32)>,
    pub segment_ids: Vec<u32>,
    /// True for a `?SELECT`-marked column list: the renderer must raise
    /// `EmptyProjectionError` if every owned segment ends up inactive,
    /// rather than silently rendering a columnless `SELECT`.
    pub is_dynamic_projection: bool,
}

/// One independently-activated run of tokens. `range` always includes any
/// trailing swallowed operator/separator; `swallow` counts how many tokens
/// at the end of `range` those are, so the renderer can drop them when this
/// segment turns out to be the last active one in its clause.
#[derive(Debug, Clone)]
pub struct Segment {
    pub range: (u32, u32),
    pub condition: CondExpr,
    pub swallow: u32,
}

#[derive(Debug, Clone)]
pub struct DynamicProjection {
    pub columns: Vec<KeyIndex>,
    pub joined_groups: Vec<Vec<KeyIndex>>,
}

#[derive(Debug, Clone)]
pub struct Blueprint {
    pub template: String,
    pub tokens: Vec<Token>,
    pub keys: KeyRegistry,
    pub clauses: Vec<Clause>,
    pub segments: Vec<Segment>,
    pub projection: Option<DynamicProjection>,
    /// Marker/handler sigil configured for this compile, e.g. `@`. Carried
    /// here so the renderer can name generated bindings without the caller
    /// having to pass it a second time.
    pub prefix: char,
}
