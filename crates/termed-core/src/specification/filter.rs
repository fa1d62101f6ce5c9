use super::Specification;

/// Replace every node of `spec` that `accept` rejects with
/// [`Specification::MatchNone`], recursing into the children of accepted
/// composites. AND/OR keep their arity.
///
/// A rejection anywhere below a NOT turns the whole NOT into `MatchNone`:
/// negating a replaced clause would widen the result instead of narrowing it.
/// Existing `MatchNone` nodes are kept as they are, which makes the filter
/// idempotent.
pub fn filter_tree<C, F>(spec: &Specification<C>, accept: F) -> Specification<C>
where
    C: Clone,
    F: Fn(&Specification<C>) -> bool,
{
    filter_node(spec, &accept).0
}

/// Returns the filtered node and whether anything in it was rejected.
fn filter_node<C, F>(spec: &Specification<C>, accept: &F) -> (Specification<C>, bool)
where
    C: Clone,
    F: Fn(&Specification<C>) -> bool,
{
    if matches!(spec, Specification::MatchNone) {
        return (Specification::MatchNone, false);
    }
    if !accept(spec) {
        return (Specification::MatchNone, true);
    }

    match spec {
        Specification::And(children) => {
            let (children, rejected) = filter_children(children, accept);
            (Specification::And(children), rejected)
        }
        Specification::Or(children) => {
            let (children, rejected) = filter_children(children, accept);
            (Specification::Or(children), rejected)
        }
        Specification::Not(child) => match filter_node(child, accept) {
            (_, true) => (Specification::MatchNone, true),
            (child, false) => (Specification::Not(Box::new(child)), false),
        },
        other => (other.clone(), false),
    }
}

fn filter_children<C, F>(children: &[Specification<C>], accept: &F) -> (Vec<Specification<C>>, bool)
where
    C: Clone,
    F: Fn(&Specification<C>) -> bool,
{
    let mut rejected = false;
    let children = children
        .iter()
        .map(|child| {
            let (child, r) = filter_node(child, accept);
            rejected |= r;
            child
        })
        .collect();
    (children, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::tests::{is, Is};
    use pretty_assertions::assert_eq;

    fn no_odd(spec: &Specification<Is>) -> bool {
        !matches!(spec, Specification::Leaf(Is(n)) if n % 2 == 1)
    }

    #[test]
    fn rejected_leaves_become_match_none() {
        let spec = Specification::and([is(2), is(3), Specification::or([is(5), is(4)])]);
        let filtered = filter_tree(&spec, no_odd);
        assert_eq!(
            filtered,
            Specification::and([
                is(2),
                Specification::MatchNone,
                Specification::or([Specification::MatchNone, is(4)]),
            ])
        );
    }

    #[test]
    fn rejected_root_is_match_none() {
        assert_eq!(filter_tree(&is(1), no_odd), Specification::MatchNone);
    }

    #[test]
    fn rejection_under_not_fails_closed() {
        let spec = Specification::and([is(2), Specification::not(Specification::or([is(4), is(3)]))]);
        assert_eq!(filter_tree(&spec, no_odd), Specification::and([is(2), Specification::MatchNone]));
        for v in 0..6 {
            assert!(!filter_tree(&spec, no_odd).test(&(), &v) || spec.test(&(), &v));
        }
    }

    #[test]
    fn accepted_not_is_kept() {
        let spec = Specification::not(is(2));
        assert_eq!(filter_tree(&spec, no_odd), spec);
    }

    #[test]
    fn filter_is_idempotent() {
        let spec = Specification::or([
            Specification::not(is(1)),
            Specification::and([is(3), is(4)]),
            Specification::not(Specification::not(is(6))),
        ]);
        let once = filter_tree(&spec, no_odd);
        assert_eq!(filter_tree(&once, no_odd), once);
    }
}
