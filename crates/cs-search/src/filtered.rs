//! Suffix-array descent driven by an `IndexKey`, and the candidate-to-line-
//! range widening pass. Ported from `codesearch.cc::search_lines` /
//! `search_chunk`.

use cs_index::Chunk;
use cs_planner::FrozenKey;
use std::sync::Arc;

/// A half-open byte range `[start, end)` inside one chunk's data, covering
/// one or more whole lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

/// Maps a byte to the order the suffix array sorts by: `\n` is smallest,
/// everything else is `byte + 1`. Mirrors `cs_index::suffix`'s private
/// `order_byte` — duplicated here because the filtered searcher's binary
/// searches live on the other side of the crate boundary from where the
/// array was built, and the mapping is a two-line pure function, not worth a
/// cross-crate dependency for.
fn order_byte(b: u8) -> u16 {
    if b == b'\n' {
        0
    } else {
        b as u16 + 1
    }
}

/// The byte at `suffix + depth`, or `None` past the end of the chunk — a
/// suffix that runs out of bytes sorts before any real byte (and before
/// `\n` too), matching the suffix array's "shorter sorts first" tie-break.
fn depth_byte(data: &[u8], suffix: u32, depth: u32) -> Option<u8> {
    data.get(suffix as usize + depth as usize).copied()
}

fn depth_key(data: &[u8], suffix: u32, depth: u32) -> i32 {
    match depth_byte(data, suffix, depth) {
        None => -1,
        Some(b) => order_byte(b) as i32,
    }
}

/// Lower bound of the first suffix index in `suffixes[lo..hi]` (already
/// sorted by `depth_key`) whose key is `>= target`.
fn lower_bound(data: &[u8], suffixes: &[u32], lo: usize, hi: usize, depth: u32, target: i32) -> usize {
    let (mut lo, mut hi) = (lo, hi);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if depth_key(data, suffixes[mid], depth) < target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

struct Frame {
    lo: usize,
    hi: usize,
    key: Option<Arc<FrozenKey>>,
    depth: u32,
}

/// Descends the suffix array along `key`, collecting every candidate suffix
/// position whose starting bytes could satisfy it. Returns `None` if the
/// candidate set would exceed `chunk.size() / min_filter_ratio` — the
/// caller should fall back to a full scan of the whole chunk (spec.md §4.4
/// item 1's bail-out).
pub fn filtered_candidates(chunk: &Chunk, key: &Arc<FrozenKey>, min_filter_ratio: u32) -> Option<Vec<u32>> {
    let budget = (chunk.size() / min_filter_ratio.max(1) as usize).max(1);
    let mut candidates = Vec::new();
    let mut stack = vec![Frame { lo: 0, hi: chunk.suffixes.len(), key: Some(Arc::clone(key)), depth: 0 }];

    while let Some(frame) = stack.pop() {
        if frame.lo >= frame.hi {
            continue;
        }
        let small_or_leaf =
            frame.hi - frame.lo <= 100 || frame.key.as_ref().map_or(true, |k| k.edges.is_empty());
        if small_or_leaf {
            if candidates.len() + (frame.hi - frame.lo) > budget {
                return None;
            }
            candidates.extend_from_slice(&chunk.suffixes[frame.lo..frame.hi]);
            continue;
        }

        let k = frame.key.as_ref().unwrap();
        for (&(a, b), child) in k.edges.iter() {
            // A child with further edges is itself descended at `depth+1`,
            // whose binary searches assume the frame's suffixes are already
            // sorted by `byte[depth+1]` — true only when every suffix in the
            // frame shares the same `byte[depth]`. An edge spanning more
            // than one byte value (`a < b`) must therefore be split into one
            // child frame per byte value before descending (spec.md §4.4
            // item 1: "for each byte value in [a..b] subdivide further").
            // A terminus (`child` is `None`) or a child with no edges of its
            // own (an `Any`/`Empty` leaf) needs no further depth-sorted
            // lookup, so the whole `[a,b]` range can stay in one frame.
            let needs_per_byte_split = child.as_ref().map_or(false, |c| !c.edges.is_empty());
            if needs_per_byte_split {
                for v in a..=b {
                    let target = order_byte(v) as i32;
                    let sub_lo = lower_bound(&chunk.data, &chunk.suffixes, frame.lo, frame.hi, frame.depth, target);
                    let sub_hi =
                        lower_bound(&chunk.data, &chunk.suffixes, frame.lo, frame.hi, frame.depth, target + 1);
                    if sub_lo >= sub_hi {
                        continue;
                    }
                    stack.push(Frame { lo: sub_lo, hi: sub_hi, key: child.clone(), depth: frame.depth + 1 });
                    if v == u8::MAX {
                        break;
                    }
                }
            } else {
                let lo_target = order_byte(a) as i32;
                let hi_target = order_byte(b) as i32 + 1;
                let sub_lo = lower_bound(&chunk.data, &chunk.suffixes, frame.lo, frame.hi, frame.depth, lo_target);
                let sub_hi = lower_bound(&chunk.data, &chunk.suffixes, frame.lo, frame.hi, frame.depth, hi_target);
                if sub_lo >= sub_hi {
                    continue;
                }
                stack.push(Frame { lo: sub_lo, hi: sub_hi, key: child.clone(), depth: frame.depth + 1 });
            }
        }
    }

    if candidates.len() > budget {
        return None;
    }
    Some(candidates)
}

/// LSD radix sort over `u32` chunk offsets, four passes (one per byte),
/// `O(n)` — used instead of `sort_unstable` to preserve the bound the
/// original relies on right up to the `min_filter_ratio` bail-out threshold
/// (spec.md §4.4 recovered detail).
pub fn radix_sort(values: &mut [u32]) {
    if values.len() < 2 {
        return;
    }
    let mut buf = vec![0u32; values.len()];
    for shift in [0u32, 8, 16, 24] {
        let mut counts = [0usize; 257];
        for &v in values.iter() {
            let bucket = ((v >> shift) & 0xFF) as usize;
            counts[bucket + 1] += 1;
        }
        for i in 0..256 {
            counts[i + 1] += counts[i];
        }
        for &v in values.iter() {
            let bucket = ((v >> shift) & 0xFF) as usize;
            buf[counts[bucket]] = v;
            counts[bucket] += 1;
        }
        values.copy_from_slice(&buf);
    }
}

/// Widens a sorted, deduplicated-by-proximity set of candidate positions
/// into whole-line byte ranges: positions within `min_skip` bytes of the
/// current range's end extend it; anything else starts a fresh range
/// (spec.md §4.4 item 2).
pub fn widen_to_line_ranges(chunk: &Chunk, mut positions: Vec<u32>, min_skip: u32) -> Vec<LineRange> {
    if positions.is_empty() {
        return Vec::new();
    }
    radix_sort(&mut positions);

    let mut ranges = Vec::new();
    let mut start = chunk.line_start(positions[0] as usize) as u32;
    let mut end = chunk.line_end(positions[0] as usize) as u32;

    for &p in &positions[1..] {
        if p >= start && p < end {
            continue;
        }
        if p.saturating_sub(end) <= min_skip {
            end = chunk.line_end(p as usize) as u32;
        } else {
            ranges.push(LineRange { start, end });
            start = chunk.line_start(p as usize) as u32;
            end = chunk.line_end(p as usize) as u32;
        }
    }
    ranges.push(LineRange { start, end });
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_index::ChunkBuilder;
    use cs_planner::key;
    use cs_core::ChunkId;

    fn build_chunk(lines: &[&[u8]]) -> Chunk {
        let total: usize = lines.iter().map(|l| l.len()).sum();
        let mut b = ChunkBuilder::new(ChunkId(0), total.max(64));
        for line in lines {
            let r = b.alloc(line.len()).unwrap();
            b.write(r, line);
        }
        b.finalize()
    }

    #[test]
    fn filtered_candidates_finds_literal_positions() {
        let chunk = build_chunk(&[b"hello world\n", b"goodbye\n", b"hello again\n"]);
        let key = key::freeze(&key::literal_bytes(b"hello"));
        let cands = filtered_candidates(&chunk, &key, 50).expect("should not bail out");
        let mut starts: Vec<u32> = cands
            .iter()
            .filter(|&&p| chunk.data[p as usize..].starts_with(b"hello"))
            .copied()
            .collect();
        starts.sort_unstable();
        assert_eq!(starts, vec![0, 20]);
    }

    #[test]
    fn filtered_candidates_subdivides_multi_byte_edge_correctly() {
        // A class-then-literal key ("[a-z]oo") has a top edge spanning more
        // than one byte value whose child is itself a non-leaf trie (the
        // literal "oo"). Descending it must split `[a,z]` into one child
        // frame per byte value rather than one frame for the whole range —
        // otherwise the depth+1 binary search runs over a sub-array that
        // isn't sorted by byte[depth+1] and silently drops real matches.
        // Padded well past the 100-suffix small_or_leaf collect-all
        // threshold so the bug (now fixed) can't hide behind it.
        let mut lines: Vec<Vec<u8>> = vec![b"foo bar\n".to_vec()];
        for i in 0..40 {
            lines.push(format!("filler line number {i} with unrelated content\n").into_bytes());
        }
        lines.push(b"boo hoo\n".to_vec());
        for i in 0..40 {
            lines.push(format!("more filler padding out the chunk past one hundred {i}\n").into_bytes());
        }
        lines.push(b"zoo keeper\n".to_vec());
        lines.push(b"too much\n".to_vec());

        let refs: Vec<&[u8]> = lines.iter().map(|v| v.as_slice()).collect();
        let chunk = build_chunk(&refs);
        assert!(chunk.suffixes.len() > 100, "test chunk must exceed the small_or_leaf threshold");

        let child = key::literal_bytes(b"oo");
        let k = key::class_node(&[((b'a', b'z'), Some(child))], key::Anchor::BOTH);
        let frozen = key::freeze(&k);

        let cands = filtered_candidates(&chunk, &frozen, 1).expect("should not bail out");
        let mut found: Vec<Vec<u8>> = cands
            .iter()
            .filter_map(|&p| {
                let s = &chunk.data[p as usize..];
                if s.len() >= 3 && s[0].is_ascii_lowercase() && &s[1..3] == b"oo" {
                    Some(s[..3].to_vec())
                } else {
                    None
                }
            })
            .collect();
        found.sort();
        found.dedup();
        assert_eq!(
            found,
            vec![b"boo".to_vec(), b"foo".to_vec(), b"too".to_vec(), b"zoo".to_vec()]
        );
    }

    #[test]
    fn radix_sort_matches_std_sort() {
        let mut a = vec![500u32, 3, 999999, 0, 42, 7, 1_000_003, 17];
        let mut b = a.clone();
        radix_sort(&mut a);
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn widen_merges_close_positions_into_one_range() {
        let chunk = build_chunk(&[b"aaa\n", b"bbb\n", b"ccc\n"]);
        // positions inside "aaa" (offset 0) and "ccc" (offset 8): gap is
        // small, well under min_skip, so they should merge into one range.
        let ranges = widen_to_line_ranges(&chunk, vec![0, 8], 250);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0], LineRange { start: 0, end: 12 });
    }

    #[test]
    fn widen_splits_distant_positions_into_separate_ranges() {
        let mut lines: Vec<Vec<u8>> = Vec::new();
        lines.push(b"x\n".to_vec());
        for _ in 0..10 {
            lines.push(vec![b'a'; 100].into_iter().chain(std::iter::once(b'\n')).collect());
        }
        lines.push(b"y\n".to_vec());
        let refs: Vec<&[u8]> = lines.iter().map(|v| v.as_slice()).collect();
        let chunk = build_chunk(&refs);
        let ranges = widen_to_line_ranges(&chunk, vec![0, (chunk.size() - 2) as u32], 5);
        assert_eq!(ranges.len(), 2);
    }
}
