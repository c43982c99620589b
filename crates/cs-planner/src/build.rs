//! Walks a parsed regex (`regex_syntax::hir::Hir`) and produces an
//! `IndexKey`, following the per-node-kind table ported from
//! `query_planner.cc::IndexWalker::PostVisit`.

use crate::error::PlannerError;
use crate::key::{self, IndexKey, Limits};
use crate::lex;
use regex_syntax::hir::{Class, Hir, HirKind};
use regex_syntax::ParserBuilder;

/// Parses `pattern` and plans an index key for it, or `None` if the regex is
/// unindexable (the caller should fall back to a full scan of every chunk).
pub fn plan_query(
    pattern: &str,
    fold_case: bool,
    limits: &Limits,
    max_hir_nodes: usize,
) -> Result<Option<IndexKey>, PlannerError> {
    let hir = ParserBuilder::new()
        .case_insensitive(fold_case)
        .unicode(true)
        .build()
        .parse(pattern)?;

    let nodes = count_hir_nodes(&hir);
    if nodes > max_hir_nodes {
        return Err(PlannerError::ProgramTooLarge { nodes, max: max_hir_nodes });
    }

    let planned = plan_node(&hir, limits);
    let weight = planned.stats.borrow().weight();
    if weight < limits.min_weight {
        Ok(None)
    } else {
        Ok(Some(planned))
    }
}

fn count_hir_nodes(hir: &Hir) -> usize {
    match hir.kind() {
        HirKind::Empty | HirKind::Literal(_) | HirKind::Class(_) | HirKind::Look(_) => 1,
        HirKind::Repetition(r) => 1 + count_hir_nodes(&r.sub),
        HirKind::Capture(c) => 1 + count_hir_nodes(&c.sub),
        HirKind::Concat(subs) | HirKind::Alternation(subs) => {
            1 + subs.iter().map(count_hir_nodes).sum::<usize>()
        }
    }
}

fn plan_node(hir: &Hir, limits: &Limits) -> IndexKey {
    match hir.kind() {
        HirKind::Empty => key::empty(),
        HirKind::Look(_) => key::empty(),
        HirKind::Literal(lit) => key::literal_bytes(&lit.0),
        HirKind::Class(Class::Unicode(c)) => {
            let ranges: Vec<(char, char)> = c.ranges().iter().map(|r| (r.start(), r.end())).collect();
            if ranges.len() > limits.max_width {
                key::any()
            } else {
                lex::class_to_index_key(&ranges, limits)
            }
        }
        HirKind::Class(Class::Bytes(c)) => {
            let ranges: Vec<(u8, u8)> = c.ranges().iter().map(|r| (r.start(), r.end())).collect();
            if ranges.len() > limits.max_width {
                key::any()
            } else {
                lex::byte_class_to_index_key(&ranges)
            }
        }
        HirKind::Repetition(rep) => {
            if rep.min == 0 {
                key::any()
            } else {
                let child = plan_node(&rep.sub, limits);
                let anchored_both = {
                    let a = *child.anchor.borrow();
                    a.left && a.right
                };
                if anchored_both {
                    let mut a = *child.anchor.borrow();
                    a.repeat = true;
                    *child.anchor.borrow_mut() = a;
                }
                child
            }
        }
        HirKind::Capture(cap) => plan_node(&cap.sub, limits),
        HirKind::Concat(subs) => plan_concat(subs, limits),
        HirKind::Alternation(subs) => plan_alternation(subs, limits),
    }
}

fn plan_alternation(subs: &[Hir], limits: &Limits) -> IndexKey {
    let mut iter = subs.iter().map(|h| plan_node(h, limits));
    let Some(first) = iter.next() else {
        return key::any();
    };
    let mut acc = first;
    for k in iter {
        acc = key::alternate(&acc, &k, limits);
    }
    acc
}

enum Item {
    Content(usize, IndexKey),
    Break,
}

fn plan_concat(subs: &[Hir], limits: &Limits) -> IndexKey {
    if subs.is_empty() {
        return key::empty();
    }
    let first_idx = 0usize;
    let last_idx = subs.len() - 1;

    let mut seq: Vec<Item> = Vec::new();
    let mut saw_break = false;
    for (idx, h) in subs.iter().enumerate() {
        let k = plan_node(h, limits);
        if key::is_any(&k) {
            seq.push(Item::Break);
            saw_break = true;
        } else if key::is_uninformative(&k) {
            // Empty(): zero-width, concat-neutral, drop it entirely.
        } else {
            seq.push(Item::Content(idx, k));
        }
    }

    let mut segments: Vec<Vec<(usize, IndexKey)>> = Vec::new();
    let mut cur: Vec<(usize, IndexKey)> = Vec::new();
    for item in seq {
        match item {
            Item::Content(idx, k) => cur.push((idx, k)),
            Item::Break => {
                if !cur.is_empty() {
                    segments.push(std::mem::take(&mut cur));
                }
            }
        }
    }
    if !cur.is_empty() {
        segments.push(cur);
    }

    if segments.is_empty() {
        return if saw_break { key::any() } else { key::empty() };
    }

    best_subsequence(&segments, limits, first_idx, last_idx)
}

/// Search every contiguous subsequence within each Any-free segment for the
/// one whose joined stats minimize selectivity (breaking ties toward the
/// longer subsequence), subject to `concat`'s node budget.
fn best_subsequence(
    segments: &[Vec<(usize, IndexKey)>],
    limits: &Limits,
    first_idx: usize,
    last_idx: usize,
) -> IndexKey {
    let mut best: Option<(f64, usize, IndexKey, usize, usize)> = None;

    for seg in segments {
        let n = seg.len();
        for i in 0..n {
            let mut acc = seg[i].1.clone();
            consider(&mut best, &acc, seg[i].0, seg[i].0);
            for j in (i + 1)..n {
                match key::concat(&acc, &seg[j].1, limits) {
                    Some(joined) => {
                        acc = joined;
                        consider(&mut best, &acc, seg[i].0, seg[j].0);
                    }
                    None => break,
                }
            }
        }
    }

    let (_, _, chosen, start, end) = best.expect("at least one non-empty segment");
    let mut anchor = *chosen.anchor.borrow();
    if start != first_idx {
        anchor.left = false;
    }
    if end != last_idx {
        anchor.right = false;
    }
    *chosen.anchor.borrow_mut() = anchor;
    chosen
}

fn consider(
    best: &mut Option<(f64, usize, IndexKey, usize, usize)>,
    cand: &IndexKey,
    start: usize,
    end: usize,
) {
    let sel = cand.stats.borrow().selectivity;
    let len = end - start + 1;
    let better = match best {
        None => true,
        Some((bsel, blen, ..)) => sel < *bsel - 1e-12 || ((sel - *bsel).abs() <= 1e-12 && len > *blen),
    };
    if better {
        *best = Some((sel, len, cand.clone(), start, end));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> Limits {
        Limits { min_weight: 16.0, max_width: 32, max_recursion: 10, max_nodes: 1 << 24 }
    }

    #[test]
    fn plain_literal_plans_to_a_selective_key() {
        let plan = plan_query("hello", false, &limits(), 100_000).unwrap();
        let k = plan.expect("literal should be indexable");
        assert_eq!(k.stats.borrow().depth, 5);
    }

    #[test]
    fn case_insensitive_ascii_literal_still_plans() {
        let plan = plan_query("hello", true, &limits(), 100_000).unwrap();
        assert!(plan.is_some());
    }

    #[test]
    fn dot_star_is_unindexable() {
        // ".*" alone carries no required substring at all.
        let plan = plan_query(".*", false, &limits(), 100_000).unwrap();
        assert!(plan.is_none());
    }

    #[test]
    fn low_selectivity_single_char_class_is_discarded() {
        // A single two-letter class like "[ab]" is too unselective on its own.
        let plan = plan_query("[ab]", false, &limits(), 100_000).unwrap();
        assert!(plan.is_none());
    }

    #[test]
    fn alternation_of_literals_plans() {
        let plan = plan_query("foo|bar", false, &limits(), 100_000).unwrap();
        let k = plan.expect("alternation of literals should be indexable");
        assert!(k.edges.borrow().len() >= 1);
    }

    #[test]
    fn concat_around_dot_star_drops_the_unanchored_middle() {
        // "foo.*bar" must plan a key around one of "foo"/"bar", not fail outright.
        let plan = plan_query("foo.*bar", false, &limits(), 100_000).unwrap();
        assert!(plan.is_some());
    }

    #[test]
    fn plus_repetition_plans_like_its_minimum() {
        let plan = plan_query("ab+c", false, &limits(), 100_000).unwrap();
        assert!(plan.is_some());
    }

    #[test]
    fn program_too_large_is_rejected() {
        // Build a pattern whose HIR node count exceeds a tiny ceiling.
        let err = plan_query("(a|b|c|d|e|f|g){1,}", false, &limits(), 3).unwrap_err();
        match err {
            PlannerError::ProgramTooLarge { .. } => {}
            _ => panic!("expected ProgramTooLarge"),
        }
    }

    #[test]
    fn invalid_regex_is_a_parse_error() {
        let err = plan_query("(unterminated", false, &limits(), 100_000).unwrap_err();
        match err {
            PlannerError::RegexParse(_) => {}
            _ => panic!("expected RegexParse"),
        }
    }
}
