//! `full_search`: the regex engine run directly over a chunk's bytes,
//! either as a fallback for an unselective index key or to confirm matches
//! the filtered searcher's candidate ranges surfaced. Ported from
//! `codesearch.cc::full_search`.

use cs_index::Chunk;
use regex::bytes::Regex;

/// One match's byte range, chunk-absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkMatch {
    pub start: u32,
    pub end: u32,
}

/// Runs `regex` unanchored over `chunk.data[range.start..range.end)`,
/// yielding at most one match per line: after a match, the scan resumes
/// after that line's `\n` rather than immediately past the match, so two
/// overlapping patterns on one line are reported once (spec.md §4.4 item 3).
///
/// Each individual regex invocation is capped to a `max_scan`-byte window;
/// if nothing matches within the window the scan jumps to the window's end
/// rather than growing a single call without bound (the original's
/// `kMaxScan` per-call cap).
pub fn full_search(chunk: &Chunk, range: std::ops::Range<u32>, regex: &Regex, max_scan: usize) -> Vec<ChunkMatch> {
    let mut out = Vec::new();
    let mut pos = range.start;
    while pos < range.end {
        let window_end = (pos as usize + max_scan).min(range.end as usize) as u32;
        let hay = &chunk.data[pos as usize..window_end as usize];
        match regex.find(hay) {
            Some(m) => {
                let start = pos + m.start() as u32;
                let end = pos + m.end() as u32;
                out.push(ChunkMatch { start, end });
                pos = chunk.line_end(start as usize) as u32;
                if pos <= start {
                    // Defensive: a zero-width match at the very end of data
                    // must still make progress.
                    pos = end.max(start + 1);
                }
            }
            None => pos = window_end,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_core::ChunkId;
    use cs_index::ChunkBuilder;

    fn build_chunk(data: &[u8]) -> Chunk {
        let mut b = ChunkBuilder::new(ChunkId(0), data.len().max(64));
        let r = b.alloc(data.len()).unwrap();
        b.write(r, data);
        b.finalize()
    }

    #[test]
    fn finds_all_matching_lines() {
        let chunk = build_chunk(b"aaa\nbbb\naaa\n");
        let re = Regex::new("aaa").unwrap();
        let matches = full_search(&chunk, 0..chunk.size() as u32, &re, 1 << 20);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].start, 0);
        assert_eq!(matches[1].start, 8);
    }

    #[test]
    fn collapses_multiple_matches_on_one_line_to_one() {
        let chunk = build_chunk(b"foo foo foo\n");
        let re = Regex::new("foo").unwrap();
        let matches = full_search(&chunk, 0..chunk.size() as u32, &re, 1 << 20);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start, 0);
    }

    #[test]
    fn no_match_yields_empty() {
        let chunk = build_chunk(b"hello world\n");
        let re = Regex::new("xyz").unwrap();
        assert!(full_search(&chunk, 0..chunk.size() as u32, &re, 1 << 20).is_empty());
    }

    #[test]
    fn respects_range_bounds() {
        let chunk = build_chunk(b"aaa\nbbb\naaa\n");
        let re = Regex::new("aaa").unwrap();
        // Only search the second half; the first "aaa" must not be found.
        let matches = full_search(&chunk, 8..chunk.size() as u32, &re, 1 << 20);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start, 8);
    }
}
