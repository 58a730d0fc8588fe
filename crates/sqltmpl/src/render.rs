use sqltmpl_core::{KeyIndex, RenderError, TokenKind, Value};
use sqltmpl_parser::{Blueprint, Clause, Segment};

use crate::builder::{slot_active, Slot};
use crate::handlers::{Handler, HandlerRegistry};

/// One parameter binding produced during a render: the splice name, its
/// value, and the handler letter that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub value: Value,
    pub letter: char,
}

pub fn render(
    blueprint: &Blueprint,
    slots: &[Slot],
    handlers: &HandlerRegistry,
) -> Result<(String, Vec<Binding>), RenderError> {
    let keys = &blueprint.keys;
    let is_active = |key: KeyIndex| slot_active(keys, key, &slots[key as usize]);

    let seg_active: Vec<bool> = blueprint
        .segments
        .iter()
        .map(|seg: &Segment| seg.condition.eval(is_active))
        .collect();

    let mut out = String::with_capacity(blueprint.template.len());
    let mut bindings = Vec::new();

    for clause in &blueprint.clauses {
        let clause_active = clause.segment_ids.iter().any(|&id| seg_active[id as usize]);

        if clause.is_dynamic_projection && !clause_active {
            return Err(RenderError::EmptyProjection);
        }
        if !clause_active {
            continue;
        }

        if let Some(lead) = clause.lead {
            emit_range(blueprint, slots, handlers, lead, &mut out, &mut bindings)?;
        }

        let last_active = last_active_segment(clause, &seg_active);
        for &id in &clause.segment_ids {
            if !seg_active[id as usize] {
                continue;
            }
            let seg = &blueprint.segments[id as usize];
            let (start, end) = seg.range;
            let end = if Some(id) == last_active { end - seg.swallow } else { end };
            emit_range(blueprint, slots, handlers, (start, end), &mut out, &mut bindings)?;
        }

        if let Some(trail) = clause.trail {
            emit_range(blueprint, slots, handlers, trail, &mut out, &mut bindings)?;
        }
    }

    Ok((out, bindings))
}

/// Last segment of `clause` (in token order) that ended up active -- the
/// one whose swallowed trailing operator/separator must be dropped.
fn last_active_segment(clause: &Clause, seg_active: &[bool]) -> Option<u32> {
    clause
        .segment_ids
        .iter()
        .rev()
        .find(|&&id| seg_active[id as usize])
        .copied()
}

/// Emits every token in `[start, end)`, substituting handler output for
/// handled variables and skipping the tokens that never contribute text
/// (context-joins, dynamic-projection markers, marker comments).
fn emit_range(
    blueprint: &Blueprint,
    slots: &[Slot],
    handlers: &HandlerRegistry,
    (start, end): (u32, u32),
    out: &mut String,
    bindings: &mut Vec<Binding>,
) -> Result<(), RenderError> {
    for tok in &blueprint.tokens[start as usize..end as usize] {
        match &tok.kind {
            TokenKind::ContextJoin
            | TokenKind::DynamicSelectMarker
            | TokenKind::ForcedBoundary
            | TokenKind::EndOfFile => {}
            TokenKind::Comment { literal_hint } => {
                if *literal_hint {
                    out.push_str(&tok.text);
                }
            }
            TokenKind::Variable { handler: None, .. } => {
                out.push_str(&tok.text);
            }
            TokenKind::Variable {
                name,
                handler: Some(letter),
                optional,
            } => {
                emit_handled_variable(
                    blueprint, slots, handlers, name, *letter, *optional, out, bindings,
                )?;
            }
            _ => out.push_str(&tok.text),
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn emit_handled_variable(
    blueprint: &Blueprint,
    slots: &[Slot],
    handlers: &HandlerRegistry,
    name: &str,
    letter: char,
    optional: bool,
    out: &mut String,
    bindings: &mut Vec<Binding>,
) -> Result<(), RenderError> {
    let idx = blueprint
        .keys
        .index_of(name)
        .expect("handled variable was registered during compilation") as usize;
    let handler = handlers
        .get(letter)
        .expect("handler letter was validated at compile time");

    let value = match &slots[idx] {
        Slot::Value(v) => v,
        Slot::None | Slot::Used => {
            if optional {
                log::debug!("segment retained with no value bound for optional '{name}'");
            }
            return Err(RenderError::HandlerMissingValue {
                name: name.to_string(),
                letter,
            });
        }
    };

    match handler {
        Handler::Base(f) => {
            let text = f(name, value)?;
            out.push_str(&text);
        }
        Handler::Special(f) => {
            let produced = f(name, value)?;
            let mut first = true;
            for (binding_name, binding_value) in produced {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                out.push(blueprint.prefix);
                out.push_str(&binding_name);
                bindings.push(Binding {
                    name: binding_name,
                    value: binding_value,
                    letter,
                });
            }
        }
    }
    Ok(())
}
