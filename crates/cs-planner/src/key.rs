//! `IndexKey`: a trie of byte-range edges derived from a regex, used to prune
//! a chunk's suffix array.
//!
//! Ported from `query_planner.h`/`query_planner.cc`'s `QueryPlan` class. The
//! original shares sub-tries across an alternation's DAG via an intrusive
//! `ref_ptr` and mutates nodes in place during concatenation; grafting a
//! shared node in place would corrupt any other parent still holding it, so
//! this port instead does a path-copy on concat (share everything below the
//! graft point, copy the spine above it) — same effect, no spooky-action-at-
//! a-distance on `Rc` clones held elsewhere.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

/// Left/Right mark whether this key is pinned to the line-boundary edges of
/// the unit it was planned from; `Repeat` marks a key derived from `+` or
/// `{n,}` whose last (or first) occurrence is always adjacent to whatever
/// follows (or precedes) it, so it remains eligible for concatenation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Anchor {
    pub left: bool,
    pub right: bool,
    pub repeat: bool,
}

impl Anchor {
    pub const BOTH: Anchor = Anchor { left: true, right: true, repeat: false };
}

#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub selectivity: f64,
    pub depth: i32,
    pub nodes: i64,
    pub tail_paths: i64,
}

impl Stats {
    fn leaf() -> Stats {
        Stats { selectivity: 1.0, depth: 0, nodes: 1, tail_paths: 1 }
    }

    pub fn weight(&self) -> f64 {
        if self.selectivity <= 0.0 {
            f64::INFINITY
        } else {
            1.0 / self.selectivity
        }
    }
}

pub type Edges = BTreeMap<(u8, u8), Option<IndexKey>>;

pub struct IndexKeyNode {
    pub edges: RefCell<Edges>,
    pub anchor: RefCell<Anchor>,
    pub stats: RefCell<Stats>,
}

pub type IndexKey = Rc<IndexKeyNode>;

/// Tuning knobs threaded in from `cs_core::Config`.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub min_weight: f64,
    pub max_width: usize,
    pub max_recursion: u32,
    pub max_nodes: u64,
}

fn stats_for_edges(edges: &Edges) -> Stats {
    if edges.is_empty() {
        return Stats::leaf();
    }
    let mut selectivity = 0.0f64;
    let mut depth = 0i32;
    let mut nodes = 1i64;
    let mut tail_paths = 0i64;
    for (&(lo, hi), child) in edges.iter() {
        let width = (hi as i32 - lo as i32 + 1) as f64;
        match child {
            None => {
                selectivity += width / 100.0;
                depth = depth.max(1);
                tail_paths += 1;
            }
            Some(c) => {
                let cs = *c.stats.borrow();
                selectivity += width / 100.0 * cs.selectivity;
                depth = depth.max(1 + cs.depth);
                nodes += cs.nodes;
                tail_paths += cs.tail_paths;
            }
        }
    }
    Stats { selectivity: selectivity.min(1.0), depth, nodes, tail_paths }
}

fn new_node(edges: Edges, anchor: Anchor) -> IndexKey {
    let stats = stats_for_edges(&edges);
    Rc::new(IndexKeyNode {
        edges: RefCell::new(edges),
        anchor: RefCell::new(anchor),
        stats: RefCell::new(stats),
    })
}

/// Concat-neutral: anchored both ways, no edges. `concat(Empty(), x) == x`.
pub fn empty() -> IndexKey {
    new_node(BTreeMap::new(), Anchor::BOTH)
}

/// Unanchored, no edges. Absorbs into a surrounding concat as a break.
pub fn any() -> IndexKey {
    new_node(BTreeMap::new(), Anchor::default())
}

pub fn is_uninformative(k: &IndexKey) -> bool {
    k.edges.borrow().is_empty()
}

pub fn is_any(k: &IndexKey) -> bool {
    let a = *k.anchor.borrow();
    is_uninformative(k) && !a.left && !a.right
}

/// A chain of single-byte edges, anchored both sides, terminating in a leaf.
pub fn literal_bytes(bytes: &[u8]) -> IndexKey {
    assert!(!bytes.is_empty());
    let mut child: Option<IndexKey> = None;
    for &b in bytes.iter().rev() {
        let mut edges = BTreeMap::new();
        edges.insert((b, b), child.take());
        child = Some(new_node(edges, Anchor::BOTH));
    }
    child.unwrap()
}

/// A node with a single `[lo,hi]` edge, anchored both sides. Used to build
/// multi-byte UTF-8 range chains (see `lex.rs`).
pub fn range_node(lo: u8, hi: u8, child: Option<IndexKey>) -> IndexKey {
    let mut edges = BTreeMap::new();
    edges.insert((lo, hi), child);
    new_node(edges, Anchor::BOTH)
}

/// A single trie level with one edge per `(lo, hi, child)` triple. Ranges
/// must already be sorted and disjoint (as `regex-syntax` guarantees for a
/// parsed character class).
pub fn class_node(ranges: &[((u8, u8), Option<IndexKey>)], anchor: Anchor) -> IndexKey {
    let mut edges = BTreeMap::new();
    for &(range, ref child) in ranges {
        edges.insert(range, child.clone());
    }
    new_node(edges, anchor)
}

pub fn check_rep(node: &IndexKey) {
    let mut visited = std::collections::HashSet::new();
    check_rep_inner(node, &mut visited);
}

fn check_rep_inner(node: &IndexKey, visited: &mut std::collections::HashSet<usize>) {
    let ptr = Rc::as_ptr(node) as usize;
    if !visited.insert(ptr) {
        return;
    }
    let edges = node.edges.borrow();
    let mut prev_hi: Option<u8> = None;
    for &(lo, hi) in edges.keys() {
        debug_assert!(lo <= hi, "edge range inverted: {lo}..{hi}");
        if let Some(p) = prev_hi {
            debug_assert!(lo as i32 > p as i32, "edges not disjoint/sorted");
        }
        prev_hi = Some(hi);
    }
    for child in edges.values().flatten() {
        check_rep_inner(child, visited);
    }
}

/// Grafts `rhs` onto every tail (leaf edge, or the node itself if it has no
/// edges) of `lhs`, sharing untouched sub-tries and copying only the spine
/// from the root to each tail. `Empty()` operands are concat-neutral.
pub fn concat(lhs: &IndexKey, rhs: &IndexKey, limits: &Limits) -> Option<IndexKey> {
    if is_uninformative(lhs) {
        return Some(Rc::clone(rhs));
    }
    if is_uninformative(rhs) {
        return Some(Rc::clone(lhs));
    }
    let lstats = *lhs.stats.borrow();
    let rstats = *rhs.stats.borrow();
    let projected = lstats.nodes as i128 + lstats.tail_paths as i128 * rstats.nodes as i128;
    if projected > limits.max_nodes as i128 {
        return None;
    }
    let mut memo: HashMap<usize, IndexKey> = HashMap::new();
    let grafted = graft(lhs, rhs, &mut memo);
    let mut anchor = *grafted.anchor.borrow();
    anchor.right = rhs.anchor.borrow().right;
    anchor.repeat = false;
    *grafted.anchor.borrow_mut() = anchor;
    check_rep(&grafted);
    Some(grafted)
}

fn graft(node: &IndexKey, rhs: &IndexKey, memo: &mut HashMap<usize, IndexKey>) -> IndexKey {
    let ptr = Rc::as_ptr(node) as usize;
    if let Some(existing) = memo.get(&ptr) {
        return Rc::clone(existing);
    }
    let edges = node.edges.borrow();
    if edges.is_empty() {
        let result = Rc::clone(rhs);
        memo.insert(ptr, Rc::clone(&result));
        return result;
    }
    let mut new_edges = BTreeMap::new();
    for (&range, child) in edges.iter() {
        let new_child = match child {
            None => Rc::clone(rhs),
            Some(c) => graft(c, rhs, memo),
        };
        new_edges.insert(range, Some(new_child));
    }
    drop(edges);
    let anchor = *node.anchor.borrow();
    let result = new_node(new_edges, anchor);
    memo.insert(ptr, Rc::clone(&result));
    result
}

enum Coverage {
    NotCovered,
    Terminus,
    Child(IndexKey),
}

fn coverage(edges: &Edges, byte: u8) -> Coverage {
    for (&(lo, hi), child) in edges.iter() {
        if lo <= byte && byte <= hi {
            return match child {
                None => Coverage::Terminus,
                Some(c) => Coverage::Child(Rc::clone(c)),
            };
        }
    }
    Coverage::NotCovered
}

/// Binary union of two tries: byte ranges are split at intersection
/// boundaries and overlapping sub-ranges recurse; a range known only to one
/// side passes that side's child through unmodified. Memoized per `(lhs,
/// rhs)` pointer-identity pair for the lifetime of one top-level `alternate`
/// fold (mirrors the original's fold-scoped `alternate_cache`).
pub fn alternate(lhs: &IndexKey, rhs: &IndexKey, limits: &Limits) -> IndexKey {
    let mut memo = HashMap::new();
    alternate_internal(lhs, rhs, 0, limits, &mut memo)
}

fn alternate_internal(
    lhs: &IndexKey,
    rhs: &IndexKey,
    depth: u32,
    limits: &Limits,
    memo: &mut HashMap<(usize, usize), IndexKey>,
) -> IndexKey {
    if depth > limits.max_recursion {
        return any();
    }
    let key = (Rc::as_ptr(lhs) as usize, Rc::as_ptr(rhs) as usize);
    if let Some(existing) = memo.get(&key) {
        return Rc::clone(existing);
    }
    let result = {
        let le = lhs.edges.borrow();
        let re = rhs.edges.borrow();
        if le.is_empty() || re.is_empty() {
            any()
        } else {
            let merged = merge_edges(&le, &re, depth, limits, memo);
            if merged.len() > limits.max_width {
                any()
            } else {
                let la = *lhs.anchor.borrow();
                let ra = *rhs.anchor.borrow();
                let anchor = Anchor {
                    left: la.left && ra.left,
                    right: la.right && ra.right,
                    repeat: false,
                };
                new_node(merged, anchor)
            }
        }
    };
    memo.insert(key, Rc::clone(&result));
    result
}

fn merge_edges(
    le: &Edges,
    re: &Edges,
    depth: u32,
    limits: &Limits,
    memo: &mut HashMap<(usize, usize), IndexKey>,
) -> Edges {
    let mut points: Vec<u16> = Vec::new();
    for &(lo, hi) in le.keys() {
        points.push(lo as u16);
        points.push(hi as u16 + 1);
    }
    for &(lo, hi) in re.keys() {
        points.push(lo as u16);
        points.push(hi as u16 + 1);
    }
    points.sort_unstable();
    points.dedup();

    let mut result = BTreeMap::new();
    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        if a >= b {
            continue;
        }
        let lo = a as u8;
        let hi = (b - 1) as u8;
        let lcov = coverage(le, lo);
        let rcov = coverage(re, lo);
        let merged_child = match (lcov, rcov) {
            (Coverage::NotCovered, Coverage::NotCovered) => continue,
            (Coverage::NotCovered, Coverage::Terminus) => None,
            (Coverage::NotCovered, Coverage::Child(c)) => Some(c),
            (Coverage::Terminus, Coverage::NotCovered) => None,
            (Coverage::Child(c), Coverage::NotCovered) => Some(c),
            (Coverage::Terminus, _) | (_, Coverage::Terminus) => None,
            (Coverage::Child(lc), Coverage::Child(rc)) => {
                Some(alternate_internal(&lc, &rc, depth + 1, limits, memo))
            }
        };
        result.insert((lo, hi), merged_child);
    }
    result
}

/// Read-only, thread-shareable rendering of a planned [`IndexKey`], built
/// once after planning finishes. `IndexKey`'s `Rc<RefCell<_>>` internals
/// exist to support path-copy grafting during planning and are neither
/// `Send` nor `Sync`; the search driver shares one planned key across every
/// worker thread in its pool, so it descends this frozen form instead.
pub struct FrozenKey {
    pub edges: BTreeMap<(u8, u8), Option<Arc<FrozenKey>>>,
}

pub fn freeze(key: &IndexKey) -> Arc<FrozenKey> {
    freeze_inner(key, &mut HashMap::new())
}

fn freeze_inner(key: &IndexKey, memo: &mut HashMap<usize, Arc<FrozenKey>>) -> Arc<FrozenKey> {
    let ptr = Rc::as_ptr(key) as usize;
    if let Some(existing) = memo.get(&ptr) {
        return Arc::clone(existing);
    }
    let edges = key.edges.borrow();
    let mut frozen_edges = BTreeMap::new();
    for (&range, child) in edges.iter() {
        let frozen_child = child.as_ref().map(|c| freeze_inner(c, memo));
        frozen_edges.insert(range, frozen_child);
    }
    drop(edges);
    let result = Arc::new(FrozenKey { edges: frozen_edges });
    memo.insert(ptr, Arc::clone(&result));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> Limits {
        Limits { min_weight: 16.0, max_width: 32, max_recursion: 10, max_nodes: 1 << 24 }
    }

    #[test]
    fn empty_has_no_edges_and_full_selectivity() {
        let e = empty();
        assert!(e.edges.borrow().is_empty());
        assert_eq!(e.stats.borrow().selectivity, 1.0);
        assert!(e.anchor.borrow().left && e.anchor.borrow().right);
    }

    #[test]
    fn any_is_unanchored() {
        let a = any();
        assert!(is_any(&a));
        let e = empty();
        assert!(!is_any(&e));
    }

    #[test]
    fn literal_chain_is_anchored_both_and_selective() {
        let k = literal_bytes(b"foo");
        let a = *k.anchor.borrow();
        assert!(a.left && a.right);
        assert!(k.stats.borrow().selectivity < 1.0);
        assert_eq!(k.stats.borrow().depth, 3);
    }

    #[test]
    fn concat_with_empty_is_neutral() {
        let lim = limits();
        let lit = literal_bytes(b"foo");
        let e = empty();
        let r = concat(&lit, &e, &lim).unwrap();
        assert!(Rc::ptr_eq(&r, &lit));
        let r2 = concat(&e, &lit, &lim).unwrap();
        assert!(Rc::ptr_eq(&r2, &lit));
    }

    #[test]
    fn concat_joins_two_literals_and_lowers_selectivity() {
        let lim = limits();
        let foo = literal_bytes(b"foo");
        let bar = literal_bytes(b"bar");
        let joined = concat(&foo, &bar, &lim).unwrap();
        assert!(joined.stats.borrow().selectivity <= foo.stats.borrow().selectivity);
        assert_eq!(joined.stats.borrow().depth, 6);
        // lhs must be unaffected by the graft (path-copy, not mutation).
        assert_eq!(foo.stats.borrow().depth, 3);
    }

    #[test]
    fn concat_preserves_sharing_when_lhs_reused() {
        let lim = limits();
        let shared = literal_bytes(b"ab");
        let x = literal_bytes(b"x");
        let y = literal_bytes(b"y");
        let jx = concat(&shared, &x, &lim).unwrap();
        let jy = concat(&shared, &y, &lim).unwrap();
        // shared must still report its original stats (not mutated by either concat).
        assert_eq!(shared.stats.borrow().depth, 2);
        assert_eq!(jx.stats.borrow().depth, 3);
        assert_eq!(jy.stats.borrow().depth, 3);
    }

    #[test]
    fn alternate_unions_two_literal_sets() {
        let lim = limits();
        let a = literal_bytes(b"a");
        let b = literal_bytes(b"b");
        let u = alternate(&a, &b, &lim);
        assert_eq!(u.edges.borrow().len(), 2);
        assert!(u.stats.borrow().selectivity >= a.stats.borrow().selectivity);
    }

    #[test]
    fn alternate_with_any_yields_any() {
        let lim = limits();
        let a = literal_bytes(b"a");
        let u = alternate(&a, &any(), &lim);
        assert!(is_any(&u));
    }

    #[test]
    fn alternate_overlapping_ranges_recurse() {
        let lim = limits();
        // [a-c]x vs [b-d]y: overlap on [b-c] must recurse into alternate(x, y).
        let mut e1 = BTreeMap::new();
        e1.insert((b'a', b'c'), Some(literal_bytes(b"x")));
        let k1 = new_node(e1, Anchor::BOTH);
        let mut e2 = BTreeMap::new();
        e2.insert((b'b', b'd'), Some(literal_bytes(b"y")));
        let k2 = new_node(e2, Anchor::BOTH);
        let u = alternate(&k1, &k2, &lim);
        let edges = u.edges.borrow();
        // expect three sub-ranges: [a,a], [b,c], [d,d]
        assert_eq!(edges.len(), 3);
    }

    #[test]
    fn weight_is_inverse_selectivity() {
        let k = literal_bytes(b"foo");
        let w = k.stats.borrow().weight();
        assert!((w - 1.0 / k.stats.borrow().selectivity).abs() < 1e-9);
    }

    #[test]
    fn check_rep_accepts_well_formed_trie() {
        let k = literal_bytes(b"abc");
        check_rep(&k); // must not panic
    }

    #[test]
    fn freeze_preserves_shape_and_is_shareable() {
        let k = literal_bytes(b"ab");
        let frozen = freeze(&k);
        assert_eq!(frozen.edges.len(), 1);
        let (&(lo, hi), child) = frozen.edges.iter().next().unwrap();
        assert_eq!((lo, hi), (b'a', b'a'));
        let child = child.as_ref().unwrap();
        assert_eq!(child.edges.len(), 1);
        fn assert_send_sync<T: Send + Sync>(_: &T) {}
        assert_send_sync(&frozen);
    }

    #[test]
    fn freeze_shares_repeated_subtrie_once() {
        let lim = limits();
        let shared = literal_bytes(b"ab");
        let x = literal_bytes(b"x");
        let y = literal_bytes(b"y");
        let joined = alternate(&concat(&shared, &x, &lim).unwrap(), &concat(&shared, &y, &lim).unwrap(), &lim);
        // must not stack-overflow or blow up memoization on a DAG with shared structure.
        let frozen = freeze(&joined);
        assert_eq!(frozen.edges.len(), 1);
    }
}
