use sqltmpl_core::{
    Bank, CompileError, HandlerClassifier, HandlerKind, KeyRegistryBuilder, Token, TokenKind,
};
use sqltmpl_lexer::LexerConfig;

use crate::blueprint::{Blueprint, Clause, ClauseKind, DynamicProjection, Segment};
use crate::condition::RawCondExpr;
use crate::marker::parse_marker;

struct RawClause {
    kind: ClauseKind,
    lead: Option<(u32, u32)>,
    segment_ids: Vec<usize>,
    is_dynamic_projection: bool,
}

struct RawSegment {
    range: (u32, u32),
    condition: RawCondExpr,
    swallow: u32,
}

#[derive(Default)]
struct RawProjection {
    columns: Vec<String>,
    joined_groups: Vec<Vec<String>>,
}

pub fn compile(
    template: &str,
    cfg: &LexerConfig,
    classifier: &dyn HandlerClassifier,
) -> Result<Blueprint, CompileError> {
    let tokens = sqltmpl_lexer::tokenize(template, cfg)?;
    let mut reg = KeyRegistryBuilder::new();
    prescan(&tokens, classifier, &mut reg)?;

    let mut clauses = Vec::new();
    let mut segments = Vec::new();
    let mut projection = None;
    build_structure(&tokens, cfg.prefix, &mut reg, &mut clauses, &mut segments, &mut projection)?;

    let keys = reg.finish();

    let segments: Vec<Segment> = segments
        .into_iter()
        .map(|s| Segment {
            range: s.range,
            condition: s.condition.resolve(&keys),
            swallow: s.swallow,
        })
        .collect();

    let clauses: Vec<Clause> = clauses
        .into_iter()
        .map(|c| Clause {
            kind: c.kind,
            lead: c.lead,
            trail: None,
            segment_ids: c.segment_ids.into_iter().map(|i| i as u32).collect(),
            is_dynamic_projection: c.is_dynamic_projection,
        })
        .collect();

    let projection = projection.map(|p| {
        let mut columns = Vec::new();
        for name in p.columns {
            if let Some(idx) = keys.index_of(&name) {
                if !columns.contains(&idx) {
                    columns.push(idx);
                }
            }
        }
        let joined_groups = p
            .joined_groups
            .into_iter()
            .map(|names| names.iter().filter_map(|n| keys.index_of(n)).collect())
            .collect();
        DynamicProjection { columns, joined_groups }
    });

    Ok(Blueprint {
        template: template.to_string(),
        tokens,
        keys,
        clauses,
        segments,
        projection,
        prefix: cfg.prefix,
    })
}

fn prescan(
    tokens: &[Token],
    classifier: &dyn HandlerClassifier,
    reg: &mut KeyRegistryBuilder,
) -> Result<(), CompileError> {
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i].kind {
            TokenKind::Variable { name, handler, .. } => {
                let bank = match handler {
                    None => Bank::Variable,
                    Some(letter) => match classifier.classify(*letter) {
                        Some(HandlerKind::Special) => Bank::Special,
                        Some(HandlerKind::Base) => Bank::Base,
                        None => {
                            return Err(CompileError::UnknownHandlerLetter {
                                name: name.to_string(),
                                letter: *letter,
                            })
                        }
                    },
                };
                reg.get_or_add(bank, name);
            }
            TokenKind::DynamicSelectMarker => {
                let select_kw_idx = i + 1;
                let (body_start, body_end) = select_body_range(tokens, select_kw_idx);
                for (s, e) in split_top_level(tokens, body_start, body_end) {
                    let name = last_identifier(tokens, s, e);
                    reg.get_or_add(Bank::Select, &name);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Ok(())
}

/// Tokens strictly between a `SELECT` keyword and the next top-level
/// section keyword (normally `FROM`).
fn select_body_range(tokens: &[Token], select_kw_idx: usize) -> (usize, usize) {
    let mut depth = 0i32;
    let mut j = select_kw_idx + 1;
    while j < tokens.len() {
        match tokens[j].kind {
            TokenKind::ParenOpen => depth += 1,
            TokenKind::ParenClose => depth -= 1,
            TokenKind::SectionKeyword if depth <= 0 => break,
            _ => {}
        }
        j += 1;
    }
    (select_kw_idx + 1, j)
}

/// Splits `[start, end)` on top-level (paren-depth 0) separators.
fn split_top_level(tokens: &[Token], start: usize, end: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut col_start = start;
    let mut j = start;
    while j < end {
        match tokens[j].kind {
            TokenKind::ParenOpen => depth += 1,
            TokenKind::ParenClose => depth -= 1,
            TokenKind::Separator if depth == 0 => {
                out.push((col_start, j));
                col_start = j + 1;
            }
            _ => {}
        }
        j += 1;
    }
    out.push((col_start, end));
    out
}

fn last_identifier(tokens: &[Token], start: usize, end: usize) -> String {
    for idx in (start..end).rev() {
        match &tokens[idx].kind {
            TokenKind::Text if is_identifier_text(&tokens[idx].text) => {
                return tokens[idx].text.to_string()
            }
            TokenKind::Variable { name, .. } => return name.to_string(),
            _ => {}
        }
    }
    tokens[start..end]
        .iter()
        .map(|t| t.text.as_str())
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_identifier_text(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn clause_kind_for(text: &str) -> ClauseKind {
    let normalized = text
        .split_whitespace()
        .map(|w| w.to_ascii_uppercase())
        .collect::<Vec<_>>()
        .join(" ");
    match normalized.as_str() {
        "WHERE" => ClauseKind::Where,
        "HAVING" => ClauseKind::Having,
        "SET" => ClauseKind::Set,
        "ON" => ClauseKind::On,
        "SELECT" => ClauseKind::SelectList,
        "GROUP BY" => ClauseKind::GroupBy,
        "ORDER BY" => ClauseKind::OrderBy,
        "VALUES" => ClauseKind::ValuesList,
        "WHEN" => ClauseKind::CaseWhen,
        "THEN" => ClauseKind::CaseThen,
        "ELSE" => ClauseKind::CaseElse,
        _ => ClauseKind::Other,
    }
}

fn is_dynamic_select(tokens: &[Token], select_kw_idx: usize) -> bool {
    select_kw_idx > 0 && matches!(tokens[select_kw_idx - 1].kind, TokenKind::DynamicSelectMarker)
}

#[allow(clippy::too_many_arguments)]
fn build_structure(
    tokens: &[Token],
    prefix: char,
    reg: &mut KeyRegistryBuilder,
    clauses: &mut Vec<RawClause>,
    segments: &mut Vec<RawSegment>,
    projection: &mut Option<RawProjection>,
) -> Result<(), CompileError> {
    let n = tokens.len();

    let mut cur_kind = ClauseKind::Other;
    let mut cur_lead: Option<(u32, u32)> = None;
    let mut cur_segs: Vec<usize> = Vec::new();
    let mut cur_seg_start: u32 = 0;
    let mut cur_seg_cond = RawCondExpr::always();
    // Condition a marker placed right before a section keyword contributes
    // to every segment of the clause that keyword opens, not to whatever
    // trailing segment precedes it.
    let mut clause_inherit = RawCondExpr::always();
    let mut pending_clause_cond = RawCondExpr::always();
    let mut pending_ctx_join = false;
    let mut paren_depth: i32 = 0;

    let mut i = 0usize;
    while i < n {
        match &tokens[i].kind {
            TokenKind::ParenOpen => {
                paren_depth += 1;
                i += 1;
            }
            TokenKind::ParenClose => {
                paren_depth -= 1;
                i += 1;
            }
            TokenKind::SectionKeyword => {
                let seg_end = trimmed_ws_end(tokens, i).max(cur_seg_start);
                close_segment(cur_seg_start, seg_end, 0, std::mem::take(&mut cur_seg_cond), segments, &mut cur_segs);
                clauses.push(RawClause {
                    kind: cur_kind,
                    lead: cur_lead,
                    segment_ids: std::mem::take(&mut cur_segs),
                    is_dynamic_projection: false,
                });

                let mut lead_start = i;
                while lead_start > 0
                    && matches!(
                        tokens[lead_start - 1].kind,
                        TokenKind::Ws | TokenKind::DynamicSelectMarker
                    )
                {
                    lead_start -= 1;
                }

                let kind = clause_kind_for(&tokens[i].text);
                if kind == ClauseKind::SelectList && is_dynamic_select(tokens, i) {
                    pending_clause_cond = RawCondExpr::always();
                    let (body_start, body_end) = select_body_range(tokens, i);
                    let trimmed_body_end = trimmed_ws_end(tokens, body_end) as usize;
                    let ids = build_projection_clause(
                        tokens, body_start, trimmed_body_end, prefix, reg, segments, projection,
                    )?;
                    clauses.push(RawClause {
                        kind: ClauseKind::SelectList,
                        lead: Some((lead_start as u32, (i + 1) as u32)),
                        segment_ids: ids,
                        is_dynamic_projection: true,
                    });
                    cur_kind = ClauseKind::Other;
                    cur_lead = None;
                    cur_segs = Vec::new();
                    cur_seg_start = body_end as u32;
                    cur_seg_cond = RawCondExpr::always();
                    i = body_end;
                    continue;
                }

                clause_inherit = std::mem::replace(&mut pending_clause_cond, RawCondExpr::always());
                cur_kind = kind;
                cur_lead = Some((lead_start as u32, (i + 1) as u32));
                cur_segs = Vec::new();
                cur_seg_start = (i + 1) as u32;
                cur_seg_cond = clause_inherit.clone();
                i += 1;
            }
            TokenKind::LogicalOp(_) | TokenKind::Separator => {
                if paren_depth > 0 {
                    i += 1;
                    continue;
                }
                if pending_ctx_join {
                    pending_ctx_join = false;
                    i += 1;
                    continue;
                }
                let mut swallow = 1u32;
                if i > 0 && matches!(tokens[i - 1].kind, TokenKind::Ws) {
                    swallow = 2;
                }
                let end = i as u32 + 1;
                close_segment(cur_seg_start, end, swallow, std::mem::take(&mut cur_seg_cond), segments, &mut cur_segs);
                cur_seg_start = end;
                cur_seg_cond = clause_inherit.clone();
                i += 1;
            }
            TokenKind::ContextJoin => {
                pending_ctx_join = true;
                i += 1;
            }
            TokenKind::ForcedBoundary => {
                // No trimming/skipping of neighbouring whitespace here: the
                // boundary forbids growth across it in either direction, so
                // each side keeps whatever whitespace is already on its side.
                close_segment(cur_seg_start, i as u32, 0, std::mem::take(&mut cur_seg_cond), segments, &mut cur_segs);
                cur_seg_start = (i + 1) as u32;
                cur_seg_cond = clause_inherit.clone();
                i += 1;
            }
            TokenKind::Comment { literal_hint } => {
                if !literal_hint {
                    let raw = parse_marker(&tokens[i].text, prefix, reg)?;
                    if marker_precedes_section_keyword(tokens, i) {
                        pending_clause_cond.and(RawCondExpr(vec![raw]));
                    } else {
                        cur_seg_cond.and(RawCondExpr(vec![raw]));
                    }
                }
                i += 1;
            }
            TokenKind::Variable { name, optional, .. } => {
                if *optional {
                    cur_seg_cond.and(RawCondExpr::from_name(name.to_string()));
                }
                i += 1;
            }
            TokenKind::EndOfFile => {
                let seg_end = trimmed_ws_end(tokens, i).max(cur_seg_start);
                close_segment(cur_seg_start, seg_end, 0, std::mem::take(&mut cur_seg_cond), segments, &mut cur_segs);
                clauses.push(RawClause {
                    kind: cur_kind,
                    lead: cur_lead,
                    segment_ids: std::mem::take(&mut cur_segs),
                    is_dynamic_projection: false,
                });
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }
    Ok(())
}

/// True when marker comment `i` is followed (modulo whitespace and a
/// dynamic-select marker) by a section keyword -- the case the condition
/// compiler promotes to a clause-conditional segment rather than attaching
/// to the trailing end of whatever clause precedes it.
fn marker_precedes_section_keyword(tokens: &[Token], i: usize) -> bool {
    let mut j = i + 1;
    while j < tokens.len()
        && matches!(tokens[j].kind, TokenKind::Ws | TokenKind::DynamicSelectMarker)
    {
        j += 1;
    }
    j < tokens.len() && matches!(tokens[j].kind, TokenKind::SectionKeyword)
}

/// End index (exclusive) of the segment closing right before token `i`,
/// with any immediately-preceding whitespace/dynamic-select-marker tokens
/// folded out so they can be re-homed onto whatever follows (mirrors the
/// backward scan a section keyword's `lead_start` performs) instead of
/// being claimed by both sides.
fn trimmed_ws_end(tokens: &[Token], i: usize) -> u32 {
    let mut end = i;
    while end > 0
        && matches!(
            tokens[end - 1].kind,
            TokenKind::Ws | TokenKind::DynamicSelectMarker
        )
    {
        end -= 1;
    }
    end as u32
}

fn close_segment(
    start: u32,
    end: u32,
    swallow: u32,
    condition: RawCondExpr,
    segments: &mut Vec<RawSegment>,
    cur_segs: &mut Vec<usize>,
) {
    let idx = segments.len();
    segments.push(RawSegment { range: (start, end), condition, swallow });
    cur_segs.push(idx);
}

#[allow(clippy::too_many_arguments)]
fn build_projection_clause(
    tokens: &[Token],
    body_start: usize,
    body_end: usize,
    prefix: char,
    reg: &mut KeyRegistryBuilder,
    segments: &mut Vec<RawSegment>,
    projection: &mut Option<RawProjection>,
) -> Result<Vec<usize>, CompileError> {
    let proj = projection.get_or_insert_with(RawProjection::default);
    let mut seg_ids = Vec::new();

    let mut depth = 0i32;
    let mut col_start = body_start;
    let mut group: Vec<(usize, usize)> = Vec::new();
    let mut j = body_start;
    while j < body_end {
        match tokens[j].kind {
            TokenKind::ParenOpen => depth += 1,
            TokenKind::ParenClose => depth -= 1,
            TokenKind::Separator if depth == 0 => {
                let merge = j > 0 && matches!(tokens[j - 1].kind, TokenKind::ContextJoin)
                    || (j > 1
                        && matches!(tokens[j - 1].kind, TokenKind::Ws)
                        && matches!(tokens[j - 2].kind, TokenKind::ContextJoin));
                group.push((col_start, j));
                col_start = j + 1;
                if !merge {
                    finalize_projection_group(
                        tokens, &mut group, 1, prefix, reg, segments, proj, &mut seg_ids,
                    )?;
                }
            }
            _ => {}
        }
        j += 1;
    }
    group.push((col_start, body_end));
    finalize_projection_group(tokens, &mut group, 0, prefix, reg, segments, proj, &mut seg_ids)?;

    Ok(seg_ids)
}

#[allow(clippy::too_many_arguments)]
fn finalize_projection_group(
    tokens: &[Token],
    group: &mut Vec<(usize, usize)>,
    swallow: u32,
    prefix: char,
    reg: &mut KeyRegistryBuilder,
    segments: &mut Vec<RawSegment>,
    proj: &mut RawProjection,
    seg_ids: &mut Vec<usize>,
) -> Result<(), CompileError> {
    if group.is_empty() {
        return Ok(());
    }
    let mut names = Vec::new();
    for &(s, e) in group.iter() {
        let name = last_identifier(tokens, s, e);
        reg.get_or_add(Bank::Select, &name);
        names.push(name);
    }

    let mut cond = RawCondExpr::default();
    for (idx, name) in names.iter().enumerate() {
        let atom = RawCondExpr::from_name(name.clone());
        if idx == 0 {
            cond = atom;
        } else {
            cond.or_merge(atom);
        }
    }
    for &(s, e) in group.iter() {
        for tok in &tokens[s..e] {
            if let TokenKind::Comment { literal_hint: false } = &tok.kind {
                let raw = parse_marker(&tok.text, prefix, reg)?;
                cond.and(RawCondExpr(vec![raw]));
            }
        }
    }

    if names.len() > 1 {
        proj.joined_groups.push(names.clone());
    }
    proj.columns.extend(names);

    let range = (group.first().unwrap().0 as u32, group.last().unwrap().1 as u32 + swallow);
    let idx = segments.len();
    segments.push(RawSegment { range, condition: cond, swallow });
    seg_ids.push(idx);
    group.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqltmpl_lexer::LexerConfig;

    /// `N`/`S`/`R` are base handlers, `X` is special -- mirrors the default
    /// registry without depending on the crate that owns it.
    struct TestClassifier;
    impl HandlerClassifier for TestClassifier {
        fn classify(&self, letter: char) -> Option<HandlerKind> {
            match letter.to_ascii_uppercase() {
                'N' | 'S' | 'R' => Some(HandlerKind::Base),
                'X' => Some(HandlerKind::Special),
                _ => None,
            }
        }
    }

    fn compiled(template: &str) -> Blueprint {
        compile(template, &LexerConfig::default(), &TestClassifier).unwrap()
    }

    /// Every token that can contribute output belongs to exactly one clause
    /// (via lead/trail/segments) -- the invariant the trimmed-whitespace
    /// boundary fixes restore. The `EndOfFile` sentinel and `???` itself
    /// carry no text and are never claimed by either side of the range they
    /// sit between.
    fn assert_full_token_coverage(bp: &Blueprint) {
        let mut covered = vec![false; bp.tokens.len()];
        let mut mark = |range: (u32, u32)| {
            for t in &mut covered[range.0 as usize..range.1 as usize] {
                assert!(!*t, "token covered twice");
                *t = true;
            }
        };
        for clause in &bp.clauses {
            if let Some(lead) = clause.lead {
                mark(lead);
            }
            if let Some(trail) = clause.trail {
                mark(trail);
            }
            for &id in &clause.segment_ids {
                mark(bp.segments[id as usize].range);
            }
        }
        for (idx, tok) in bp.tokens.iter().enumerate() {
            if matches!(tok.kind, TokenKind::EndOfFile | TokenKind::ForcedBoundary) {
                continue;
            }
            assert!(covered[idx], "token {idx} ({:?}) not claimed by any clause", tok.kind);
        }
    }

    #[test]
    fn every_token_is_claimed_by_exactly_one_clause() {
        for tmpl in [
            "SELECT * FROM Users WHERE IsActive = 1 AND Name = ?@Name",
            "?SELECT ID, Name FROM Users UNION ALL ?SELECT ID, Name FROM ArchivedUsers",
            "SELECT ?@Skip_N ??? DISTINCT Name FROM T",
            "SELECT CASE /*Flag*/ WHEN X=1 THEN 'a' ELSE 'b' END FROM T",
        ] {
            assert_full_token_coverage(&compiled(tmpl));
        }
    }

    #[test]
    fn forced_boundary_keeps_whitespace_on_each_side() {
        let bp = compiled("SELECT ?@Skip_N ??? DISTINCT Name FROM T");
        // Two segments before the FROM clause: the conditional Skip segment
        // and the always-on segment starting right after `???`.
        let select_clause = &bp.clauses[1];
        assert_eq!(select_clause.segment_ids.len(), 2);
        let second = &bp.segments[select_clause.segment_ids[1] as usize];
        assert!(second.condition.is_always());
        let text: String = bp.tokens[second.range.0 as usize..second.range.1 as usize]
            .iter()
            .map(|t| t.text.as_str())
            .collect();
        assert!(text.starts_with(' '), "whitespace after ??? must stay with the next segment");
    }

    #[test]
    fn marker_before_section_keyword_promotes_whole_clause() {
        let bp = compiled("SELECT CASE /*Flag*/ WHEN X=1 THEN 'a' ELSE 'b' END FROM T");
        let when_clause = bp
            .clauses
            .iter()
            .find(|c| c.kind == ClauseKind::CaseWhen)
            .unwrap();
        for &id in &when_clause.segment_ids {
            assert!(!bp.segments[id as usize].condition.is_always());
        }
    }

    #[test]
    fn dynamic_projection_shares_keys_by_name_across_unions() {
        let bp = compiled("?SELECT ID, Name FROM Users UNION ALL ?SELECT ID, Name FROM ArchivedUsers");
        assert_eq!(bp.keys.count() - bp.keys.end_selects() as usize, 0);
        assert_eq!(bp.keys.end_selects(), 2); // ID, Name -- deduplicated by name
    }
}
