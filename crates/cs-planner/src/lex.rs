//! Multi-byte character-class expansion, ported from `query_planner.cc`'s
//! `LexRange`/`CClass` but built on `regex_syntax::utf8::Utf8Sequences`
//! instead of a hand-rolled UTF-8 splitter — the crate already computes the
//! byte-length-uniform sub-ranges a trie edge chain needs.

use crate::key::{self, Anchor, IndexKey, Limits};
use regex_syntax::utf8::Utf8Sequences;

fn chain_from_sequence(seq: regex_syntax::utf8::Utf8Sequence) -> IndexKey {
    let ranges: Vec<(u8, u8)> = seq.into_iter().map(|r| (r.start, r.end)).collect();
    let mut child: Option<IndexKey> = None;
    for (lo, hi) in ranges.into_iter().rev() {
        child = Some(key::range_node(lo, hi, child.take()));
    }
    child.expect("Utf8Sequence always has at least one range")
}

fn fold_alternate(parts: &[IndexKey], limits: &Limits) -> IndexKey {
    let mut iter = parts.iter();
    let Some(first) = iter.next() else {
        return key::any();
    };
    let mut acc = first.clone();
    for p in iter {
        acc = key::alternate(&acc, p, limits);
    }
    acc
}

/// Builds the index key for a Unicode character class: `[lo,hi]` ranges
/// entirely below U+0080 become a single byte-range edge; ranges that reach
/// above it are expanded into one or more fixed-length UTF-8 byte chains and
/// unioned together via `alternate`.
pub fn class_to_index_key(ranges: &[(char, char)], limits: &Limits) -> IndexKey {
    let mut parts: Vec<IndexKey> = Vec::new();
    for &(lo, hi) in ranges {
        if (hi as u32) < 0x80 {
            parts.push(key::range_node(lo as u8, hi as u8, None));
        } else {
            for seq in Utf8Sequences::new(lo, hi) {
                parts.push(chain_from_sequence(seq));
            }
        }
    }
    fold_alternate(&parts, limits)
}

/// Same, for a byte-level class (`Hir::Class::Bytes`) — already in `[u8;
/// u8]` form, no UTF-8 expansion needed.
pub fn byte_class_to_index_key(ranges: &[(u8, u8)]) -> IndexKey {
    let entries: Vec<((u8, u8), Option<IndexKey>)> =
        ranges.iter().map(|&(lo, hi)| ((lo, hi), None)).collect();
    key::class_node(&entries, Anchor::BOTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> Limits {
        Limits { min_weight: 16.0, max_width: 32, max_recursion: 10, max_nodes: 1 << 24 }
    }

    #[test]
    fn ascii_range_is_single_edge() {
        let k = class_to_index_key(&[('a', 'z')], &limits());
        assert_eq!(k.edges.borrow().len(), 1);
        let (&(lo, hi), _) = k.edges.borrow().iter().next().unwrap();
        assert_eq!((lo, hi), (b'a', b'z'));
    }

    #[test]
    fn multibyte_range_builds_a_trie() {
        // U+00E0..U+00FF is entirely 2-byte UTF-8, should yield exactly one
        // edge at the top byte (0xC3) with a child covering the second byte.
        let k = class_to_index_key(&[('\u{00E0}', '\u{00FF}')], &limits());
        assert!(!k.edges.borrow().is_empty());
        assert_eq!(k.stats.borrow().depth, 2);
    }

    #[test]
    fn byte_class_has_no_children() {
        let k = byte_class_to_index_key(&[(0x80, 0xFF)]);
        assert_eq!(k.edges.borrow().len(), 1);
        let (_, child) = k.edges.borrow().iter().next().map(|(k, v)| (*k, v.clone())).unwrap();
        assert!(child.is_none());
    }
}
