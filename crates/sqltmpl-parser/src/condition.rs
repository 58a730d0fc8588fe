use sqltmpl_core::{KeyIndex, KeyRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondAtom {
    pub key: KeyIndex,
    pub join: Option<Join>,
}

/// One `|`/`&`-chained run of atoms, evaluated strictly left-to-right with
/// no precedence: `((a op b) op c) ...`.
pub type LinearExpr = Vec<CondAtom>;

/// A segment's full condition: independent linear runs, implicitly ANDed
/// together. This is how "implicit AND within a segment" and "inheritance
/// from an enclosing clause" are both represented -- by appending another
/// run, never by re-grouping an existing one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CondExpr(pub Vec<LinearExpr>);

impl CondExpr {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn from_atom(key: KeyIndex) -> Self {
        Self(vec![vec![CondAtom { key, join: None }]])
    }

    pub fn is_always(&self) -> bool {
        self.0.is_empty()
    }

    /// ANDs `other`'s runs into `self` (used for implicit AND and clause
    /// inheritance).
    pub fn and(&mut self, other: CondExpr) {
        self.0.extend(other.0);
    }

    pub fn eval(&self, is_active: impl Fn(KeyIndex) -> bool) -> bool {
        self.0.iter().all(|run| eval_linear(run, &is_active))
    }
}

#[cfg(test)]
mod cond_expr_tests {
    use super::*;

    fn expr(runs: Vec<Vec<(u32, Option<Join>)>>) -> CondExpr {
        CondExpr(
            runs.into_iter()
                .map(|run| {
                    run.into_iter()
                        .map(|(key, join)| CondAtom { key, join })
                        .collect()
                })
                .collect(),
        )
    }

    #[test]
    fn always_true_on_empty_expression() {
        assert!(CondExpr::always().eval(|_| false));
    }

    #[test]
    fn single_atom_reads_through_directly() {
        let e = CondExpr::from_atom(3);
        assert!(e.eval(|k| k == 3));
        assert!(!e.eval(|k| k != 3));
    }

    #[test]
    fn linear_chain_has_no_precedence() {
        // (true OR false) AND false == false, evaluated strictly left-to-right.
        let e = expr(vec![vec![(0, None), (1, Some(Join::Or)), (2, Some(Join::And))]]);
        let active = |k: KeyIndex| matches!(k, 0);
        assert!(!e.eval(active));
    }

    #[test]
    fn multiple_runs_are_anded_together() {
        let mut e = CondExpr::from_atom(0);
        e.and(CondExpr::from_atom(1));
        assert!(e.eval(|_| true));
        assert!(!e.eval(|k| k == 0));
    }
}

fn eval_linear(run: &LinearExpr, is_active: &impl Fn(KeyIndex) -> bool) -> bool {
    let mut iter = run.iter();
    let Some(first) = iter.next() else {
        return true;
    };
    let mut acc = is_active(first.key);
    for atom in iter {
        let v = is_active(atom.key);
        acc = match atom.join.expect("non-first atom must carry a join") {
            Join::And => acc && v,
            Join::Or => acc || v,
        };
    }
    acc
}

/// A not-yet-resolved condition atom: the key is known only by name until
/// the registry is frozen (bank 2's contents keep shifting bank-3..5's
/// would-be indices until then).
#[derive(Debug, Clone)]
pub struct RawAtom {
    pub name: String,
    pub join: Option<Join>,
}

pub type RawLinearExpr = Vec<RawAtom>;

#[derive(Debug, Clone, Default)]
pub struct RawCondExpr(pub Vec<RawLinearExpr>);

impl RawCondExpr {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn from_name(name: impl Into<String>) -> Self {
        Self(vec![vec![RawAtom {
            name: name.into(),
            join: None,
        }]])
    }

    pub fn and(&mut self, other: RawCondExpr) {
        self.0.extend(other.0);
    }

    /// Merges `other`'s single run into `self`'s last run with an OR join,
    /// used for `&,`-joined dynamic-projection columns. Falls back to a
    /// plain AND-append if `self` has no runs yet.
    pub fn or_merge(&mut self, other: RawCondExpr) {
        let Some(last) = self.0.last_mut() else {
            self.0.extend(other.0);
            return;
        };
        for run in other.0 {
            for (i, mut atom) in run.into_iter().enumerate() {
                if i == 0 {
                    atom.join = Some(Join::Or);
                }
                last.push(atom);
            }
        }
    }

    pub fn resolve(self, keys: &KeyRegistry) -> CondExpr {
        CondExpr(
            self.0
                .into_iter()
                .map(|run| {
                    run.into_iter()
                        .map(|atom| CondAtom {
                            key: keys
                                .index_of(&atom.name)
                                .expect("condition atom name was registered during compilation"),
                            join: atom.join,
                        })
                        .collect()
                })
                .collect(),
        )
    }
}
