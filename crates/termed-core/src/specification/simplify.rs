//! Algebraic rewrites that keep [`Specification::test`] semantics.
//!
//! [`simplify`] is cheap and meant to run before compilation. The normal
//! forms ([`to_cnf`], [`to_dnf`]) distribute composites over each other and
//! can grow exponentially; they exist for debugging and equivalence testing.

use super::Specification;
use indexmap::IndexSet;
use std::hash::Hash;

/// Flatten nested composites, drop identity children, short-circuit on
/// absorbing children, remove duplicates, unwrap single-child composites and
/// eliminate double negation.
pub fn simplify<C: Clone + Eq + Hash>(spec: &Specification<C>) -> Specification<C> {
    match spec {
        Specification::MatchAll | Specification::MatchNone | Specification::Leaf(_) => spec.clone(),
        Specification::Not(child) => match simplify(child) {
            Specification::MatchAll => Specification::MatchNone,
            Specification::MatchNone => Specification::MatchAll,
            Specification::Not(inner) => *inner,
            other => Specification::Not(Box::new(other)),
        },
        Specification::And(children) => simplify_composite(children, true),
        Specification::Or(children) => simplify_composite(children, false),
    }
}

fn simplify_composite<C: Clone + Eq + Hash>(children: &[Specification<C>], conjunction: bool) -> Specification<C> {
    let (identity, absorbing) = if conjunction {
        (Specification::MatchAll, Specification::MatchNone)
    } else {
        (Specification::MatchNone, Specification::MatchAll)
    };

    let mut kept: IndexSet<Specification<C>> = IndexSet::new();
    for child in children.iter().map(simplify) {
        let nested = match child {
            Specification::And(grandchildren) if conjunction => grandchildren,
            Specification::Or(grandchildren) if !conjunction => grandchildren,
            other => vec![other],
        };
        for c in nested {
            if c == absorbing {
                return absorbing;
            }
            if c != identity {
                kept.insert(c);
            }
        }
    }

    match kept.len() {
        0 => identity,
        1 => kept.into_iter().next().unwrap_or(identity),
        _ if conjunction => Specification::And(kept.into_iter().collect()),
        _ => Specification::Or(kept.into_iter().collect()),
    }
}

/// Negation normal form: NOT only directly above leaves, no identities under
/// a NOT.
pub fn to_nnf<C: Clone>(spec: &Specification<C>) -> Specification<C> {
    nnf(spec, false)
}

fn nnf<C: Clone>(spec: &Specification<C>, negated: bool) -> Specification<C> {
    match (spec, negated) {
        (Specification::MatchAll, false) | (Specification::MatchNone, true) => Specification::MatchAll,
        (Specification::MatchAll, true) | (Specification::MatchNone, false) => Specification::MatchNone,
        (Specification::Leaf(_), false) => spec.clone(),
        (Specification::Leaf(_), true) => Specification::Not(Box::new(spec.clone())),
        (Specification::Not(child), _) => nnf(child, !negated),
        (Specification::And(children), false) | (Specification::Or(children), true) => {
            Specification::And(children.iter().map(|c| nnf(c, negated)).collect())
        }
        (Specification::Or(children), false) | (Specification::And(children), true) => {
            Specification::Or(children.iter().map(|c| nnf(c, negated)).collect())
        }
    }
}

/// Conjunction of disjunctions of literals.
pub fn to_cnf<C: Clone + Eq + Hash>(spec: &Specification<C>) -> Specification<C> {
    let clauses = clauses(&to_nnf(spec), true);
    simplify(&Specification::And(clauses.into_iter().map(Specification::Or).collect()))
}

/// Disjunction of conjunctions of literals.
pub fn to_dnf<C: Clone + Eq + Hash>(spec: &Specification<C>) -> Specification<C> {
    let clauses = clauses(&to_nnf(spec), false);
    simplify(&Specification::Or(clauses.into_iter().map(Specification::And).collect()))
}

/// Clauses of an NNF tree. With `cnf` each inner list is a disjunction and
/// the outer list a conjunction; otherwise the other way round.
fn clauses<C: Clone>(spec: &Specification<C>, cnf: bool) -> Vec<Vec<Specification<C>>> {
    match spec {
        // Outer identity: no clauses. Outer absorbing: a single empty clause.
        Specification::MatchAll => if cnf { vec![] } else { vec![vec![]] },
        Specification::MatchNone => if cnf { vec![vec![]] } else { vec![] },
        Specification::Leaf(_) | Specification::Not(_) => vec![vec![spec.clone()]],
        Specification::And(children) if cnf => children.iter().flat_map(|c| clauses(c, cnf)).collect(),
        Specification::Or(children) if !cnf => children.iter().flat_map(|c| clauses(c, cnf)).collect(),
        Specification::And(children) | Specification::Or(children) => {
            // Distribute: one clause per combination of child clauses.
            children.iter().fold(vec![vec![]], |acc, child| {
                let child_clauses = clauses(child, cnf);
                acc.iter()
                    .flat_map(|left| {
                        child_clauses.iter().map(move |right| {
                            let mut merged = left.clone();
                            merged.extend(right.iter().cloned());
                            merged
                        })
                    })
                    .collect()
            })
        }
    }
}
