use sqltmpl_core::{Bank, CompileError, KeyRegistryBuilder};

use crate::condition::{Join, RawAtom, RawLinearExpr};

/// Parses the body of a `/*…*/` marker into a linear, left-to-right chain
/// of atoms joined by `&` (AND) and `|` (OR). No precedence. Bare atoms are
/// registered as bank-2 flags; `@`-prefixed atoms must already name a
/// variable seen elsewhere in the template (the pre-scan pass guarantees
/// that check sees the whole template, not just what came before the
/// marker).
pub fn parse_marker(
    body: &str,
    prefix: char,
    reg: &mut KeyRegistryBuilder,
) -> Result<RawLinearExpr, CompileError> {
    let mut expr = Vec::new();
    for (join, atom) in split_atoms(body) {
        let atom = atom.trim();
        let name = if let Some(rest) = atom.strip_prefix(prefix) {
            if !reg.contains(rest) {
                return Err(CompileError::UnknownVariableInMarker {
                    name: rest.to_string(),
                });
            }
            rest.to_string()
        } else {
            reg.get_or_add(Bank::Flag, atom);
            atom.to_string()
        };
        expr.push(RawAtom { name, join });
    }
    Ok(expr)
}

/// Splits on top-level `&`/`|`, returning (join-before-this-atom, text).
/// The first atom's join is always `None`.
fn split_atoms(body: &str) -> Vec<(Option<Join>, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut join = None;
    for (i, b) in body.bytes().enumerate() {
        if b == b'&' || b == b'|' {
            out.push((join, &body[start..i]));
            join = Some(if b == b'&' { Join::And } else { Join::Or });
            start = i + 1;
        }
    }
    out.push((join, &body[start..]));
    out
}
