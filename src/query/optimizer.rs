//! ## Query optimizer
//!
//! Rewrites a query tree into an equivalent but cheaper one (§4.3.3): same-index
//! equality chains fold into `Any`/`All`, same-index range pairs fold into
//! `InRange`/`NotInRange`, and negation is pushed all the way down to the comparator
//! leaves rather than left sitting on a `Not` node. `optimize` never mutates its input —
//! it only ever reads through a shared reference and builds a fresh tree — so a subtree
//! shared between two top-level queries is unaffected by optimizing the other.

use super::node::{Comparator, Operand, QueryNode};

/// Rewrites `node` into an equivalent, optimized tree. Does not touch `node` itself.
pub fn optimize(node: &QueryNode) -> QueryNode {
    match node {
        QueryNode::Cmp { .. } => node.clone(),
        QueryNode::And(children) => {
            let optimized: Vec<QueryNode> = children.iter().map(optimize).collect();
            build_and(optimized)
        }
        QueryNode::Or(children) => {
            let optimized: Vec<QueryNode> = children.iter().map(optimize).collect();
            build_or(optimized)
        }
        QueryNode::Not(child) => {
            // Push the negation through De Morgan's laws (or straight onto a
            // comparator), then optimize the result — which may expose further
            // same-index folds that were hidden behind the `Not`.
            let pushed = optimize(child).negate();
            optimize(&pushed)
        }
    }
}

fn flatten_and(children: Vec<QueryNode>) -> Vec<QueryNode> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        match child {
            QueryNode::And(inner) => out.extend(flatten_and(inner)),
            other => out.push(other),
        }
    }
    out
}

fn flatten_or(children: Vec<QueryNode>) -> Vec<QueryNode> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        match child {
            QueryNode::Or(inner) => out.extend(flatten_or(inner)),
            other => out.push(other),
        }
    }
    out
}

/// Splits an n-ary operand's (already-flattened) children into same-index comparator
/// groups (preserving first-occurrence order) and everything else.
fn group_by_index(
    flat: Vec<QueryNode>,
) -> (Vec<(usize, QueryNode)>, Vec<(String, Vec<(usize, Comparator)>)>) {
    let mut others = Vec::new();
    let mut groups: Vec<(String, Vec<(usize, Comparator)>)> = Vec::new();
    for (pos, node) in flat.into_iter().enumerate() {
        match node {
            QueryNode::Cmp { index, comparator } => {
                if let Some(group) = groups.iter_mut().find(|(idx, _)| idx == &index) {
                    group.1.push((pos, comparator));
                } else {
                    groups.push((index, vec![(pos, comparator)]));
                }
            }
            other => others.push((pos, other)),
        }
    }
    (others, groups)
}

fn finish(mut positioned: Vec<(usize, QueryNode)>, as_and: bool) -> QueryNode {
    positioned.sort_by_key(|(pos, _)| *pos);
    let nodes: Vec<QueryNode> = positioned.into_iter().map(|(_, n)| n).collect();
    match nodes.len() {
        0 => {
            if as_and {
                QueryNode::And(nodes)
            } else {
                QueryNode::Or(nodes)
            }
        }
        1 => nodes.into_iter().next().unwrap(),
        _ => {
            if as_and {
                QueryNode::And(nodes)
            } else {
                QueryNode::Or(nodes)
            }
        }
    }
}

fn cmp(index: &str, comparator: Comparator) -> QueryNode {
    QueryNode::Cmp {
        index: index.to_string(),
        comparator,
    }
}

/// Rule 2 and rule 3 (§4.3.3): same-index `Eq` chains fold into `All`; a `Gt`/`Ge`
/// paired with a `Lt`/`Le` on the same index folds into `InRange`, with `Gt`/`Lt`
/// contributing the lower bound and `Le`/`Lt` the upper, independent exclusivity.
fn build_and(children: Vec<QueryNode>) -> QueryNode {
    let flat = flatten_and(children);
    let (others, groups) = group_by_index(flat);
    let mut positioned = others;

    for (index, entries) in groups {
        let mut eqs = Vec::new();
        let mut lower: Option<(usize, Operand, bool)> = None;
        let mut upper: Option<(usize, Operand, bool)> = None;
        let mut rest = Vec::new();

        for (pos, comparator) in entries {
            match comparator {
                Comparator::Eq(v) => eqs.push((pos, v)),
                Comparator::Gt(v) if lower.is_none() => lower = Some((pos, v, true)),
                Comparator::Ge(v) if lower.is_none() => lower = Some((pos, v, false)),
                Comparator::Lt(v) if upper.is_none() => upper = Some((pos, v, true)),
                Comparator::Le(v) if upper.is_none() => upper = Some((pos, v, false)),
                other => rest.push((pos, other)),
            }
        }

        if eqs.len() >= 2 {
            let pos = eqs[0].0;
            let values = eqs.into_iter().map(|(_, v)| v).collect();
            positioned.push((pos, cmp(&index, Comparator::All(Operand::List(values)))));
        } else {
            for (pos, v) in eqs {
                positioned.push((pos, cmp(&index, Comparator::Eq(v))));
            }
        }

        match (lower, upper) {
            (Some((lp, lv, lex)), Some((up, uv, uex))) => {
                positioned.push((
                    lp.min(up),
                    cmp(
                        &index,
                        Comparator::InRange {
                            start: lv,
                            end: uv,
                            start_exclusive: lex,
                            end_exclusive: uex,
                        },
                    ),
                ));
            }
            (Some((lp, lv, lex)), None) => {
                positioned.push((
                    lp,
                    cmp(&index, if lex { Comparator::Gt(lv) } else { Comparator::Ge(lv) }),
                ));
            }
            (None, Some((up, uv, uex))) => {
                positioned.push((
                    up,
                    cmp(&index, if uex { Comparator::Lt(uv) } else { Comparator::Le(uv) }),
                ));
            }
            (None, None) => {}
        }

        for (pos, comparator) in rest {
            positioned.push((pos, cmp(&index, comparator)));
        }
    }

    finish(positioned, true)
}

/// Rule 1 and rule 4 (§4.3.3): same-index `Eq` chains fold into `Any`; a `Lt`/`Le`
/// paired with a `Gt`/`Ge` on the same index folds into `NotInRange` — here the lower
/// (`Lt`/`Le`) branch contributes the start and the upper (`Gt`/`Ge`) branch the end,
/// since the disjunction describes everything *outside* the excluded interval.
fn build_or(children: Vec<QueryNode>) -> QueryNode {
    let flat = flatten_or(children);
    let (others, groups) = group_by_index(flat);
    let mut positioned = others;

    for (index, entries) in groups {
        let mut eqs = Vec::new();
        let mut start: Option<(usize, Operand, bool)> = None;
        let mut end: Option<(usize, Operand, bool)> = None;
        let mut rest = Vec::new();

        for (pos, comparator) in entries {
            match comparator {
                Comparator::Eq(v) => eqs.push((pos, v)),
                Comparator::Lt(v) if start.is_none() => start = Some((pos, v, true)),
                Comparator::Le(v) if start.is_none() => start = Some((pos, v, false)),
                Comparator::Gt(v) if end.is_none() => end = Some((pos, v, true)),
                Comparator::Ge(v) if end.is_none() => end = Some((pos, v, false)),
                other => rest.push((pos, other)),
            }
        }

        if eqs.len() >= 2 {
            let pos = eqs[0].0;
            let values = eqs.into_iter().map(|(_, v)| v).collect();
            positioned.push((pos, cmp(&index, Comparator::Any(Operand::List(values)))));
        } else {
            for (pos, v) in eqs {
                positioned.push((pos, cmp(&index, Comparator::Eq(v))));
            }
        }

        match (start, end) {
            (Some((sp, sv, sex)), Some((ep, ev, eex))) => {
                positioned.push((
                    sp.min(ep),
                    cmp(
                        &index,
                        Comparator::NotInRange {
                            start: sv,
                            end: ev,
                            start_exclusive: sex,
                            end_exclusive: eex,
                        },
                    ),
                ));
            }
            (Some((sp, sv, sex)), None) => {
                positioned.push((
                    sp,
                    cmp(&index, if sex { Comparator::Lt(sv) } else { Comparator::Le(sv) }),
                ));
            }
            (None, Some((ep, ev, eex))) => {
                positioned.push((
                    ep,
                    cmp(&index, if eex { Comparator::Gt(ev) } else { Comparator::Ge(ev) }),
                ));
            }
            (None, None) => {}
        }

        for (pos, comparator) in rest {
            positioned.push((pos, cmp(&index, comparator)));
        }
    }

    finish(positioned, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::node::{all_of, and, any_of, eq, gt, in_range, lt, not, not_eq, or};
    use crate::value::Value;

    #[test]
    fn test_or_of_eq_folds_into_any() {
        let q = or(vec![eq("a", 1i64), eq("a", 2i64), eq("a", 3i64)]);
        assert_eq!(optimize(&q), any_of("a", vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
    }

    #[test]
    fn test_and_of_eq_folds_into_all() {
        let q = and(vec![eq("a", 1i64), eq("a", 2i64)]);
        assert_eq!(optimize(&q), all_of("a", vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn test_and_gt_lt_folds_into_in_range() {
        let q = and(vec![gt("a", 0i64), lt("a", 5i64)]);
        assert_eq!(
            optimize(&q),
            in_range("a", Value::Int(0), Value::Int(5), true, true)
        );
    }

    #[test]
    fn test_mixed_or_eq_and_all_stays_split_by_literal_shape() {
        // "a == 1 or a == 2 and a == 3" -> Or(Eq(a,1), All(a,[2,3]))
        let q = or(vec![eq("a", 1i64), and(vec![eq("a", 2i64), eq("a", 3i64)])]);
        let optimized = optimize(&q);
        assert_eq!(
            optimized,
            or(vec![eq("a", 1i64), all_of("a", vec![Value::Int(2), Value::Int(3)])])
        );
    }

    #[test]
    fn test_negation_pushes_through_and_becomes_or() {
        let q = not(and(vec![eq("a", 1i64), eq("b", 2i64)]));
        let optimized = optimize(&q);
        assert_eq!(optimized, or(vec![not_eq("a", 1i64), not_eq("b", 2i64)]));
    }

    #[test]
    fn test_optimize_does_not_mutate_shared_subquery() {
        let shared = or(vec![eq("x", "p"), eq("x", "a")]);
        let combined = and(vec![shared.clone(), eq("y", "e")]);
        let _ = optimize(&combined);
        // `shared` is untouched — optimize only ever read through a reference.
        assert_eq!(shared, or(vec![eq("x", "p"), eq("x", "a")]));
    }

    #[test]
    fn test_range_fold_applies_across_nested_and_depths() {
        let q = and(vec![and(vec![gt("a", 0i64)]), lt("a", 5i64)]);
        assert_eq!(
            optimize(&q),
            in_range("a", Value::Int(0), Value::Int(5), true, true)
        );
    }
}
