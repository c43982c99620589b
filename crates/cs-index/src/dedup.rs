//! Line-content deduplication during indexing.
//!
//! Ported from `content.cc`'s dedup table: every distinct `\n`-terminated
//! line (hashed including its terminator) is stored exactly once, with
//! later occurrences reusing the existing byte range instead of being
//! copied again.

use crate::store::ChunkStore;
use cs_core::ChunkId;
use std::collections::HashMap;

/// A byte range `[offset, offset+len)` inside some chunk's data, naming
/// where a deduplicated line's bytes (including its trailing `\n`) live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub chunk: ChunkId,
    pub offset: u32,
    pub len: u32,
}

/// Hash-keyed set of previously-indexed line ranges, keyed by the xxh3-64
/// hash of the line's bytes (terminator included, per spec.md §4.2).
/// Collisions are resolved by comparing against the actual bytes in the
/// owning chunk, so two distinct lines that happen to share a hash are
/// never merged.
#[derive(Default)]
pub struct LineDeduper {
    table: HashMap<u64, Vec<LineRange>>,
}

impl LineDeduper {
    pub fn new() -> Self {
        LineDeduper::default()
    }

    /// Returns the existing range for `line` (including its `\n`) if one was
    /// already indexed, comparing against the live bytes in `store` to rule
    /// out hash collisions.
    pub fn lookup(&self, line: &[u8], store: &ChunkStore) -> Option<LineRange> {
        let hash = xxhash_rust::xxh3::xxh3_64(line);
        let candidates = self.table.get(&hash)?;
        candidates
            .iter()
            .copied()
            .find(|r| store.read(r.chunk, r.offset, r.len) == line)
    }

    /// Records a freshly-allocated line range under its content hash.
    pub fn insert(&mut self, line: &[u8], range: LineRange) {
        let hash = xxhash_rust::xxh3::xxh3_64(line);
        self.table.entry(hash).or_default().push(range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_on_empty_table() {
        let dedup = LineDeduper::new();
        let store = ChunkStore::new(1 << 16);
        assert!(dedup.lookup(b"hello\n", &store).is_none());
    }

    #[test]
    fn hit_after_insert_with_matching_bytes() {
        let mut store = ChunkStore::new(1 << 16);
        let (chunk, range) = store.alloc(6).unwrap();
        store.write(chunk, range.clone(), b"hello\n");
        let mut dedup = LineDeduper::new();
        let lr = LineRange { chunk, offset: range.start as u32, len: 6 };
        dedup.insert(b"hello\n", lr);
        let hit = dedup.lookup(b"hello\n", &store).unwrap();
        assert_eq!(hit, lr);
    }

    #[test]
    fn distinct_lines_do_not_collide() {
        let mut store = ChunkStore::new(1 << 16);
        let (chunk, range) = store.alloc(6).unwrap();
        store.write(chunk, range.clone(), b"hello\n");
        let mut dedup = LineDeduper::new();
        dedup.insert(b"hello\n", LineRange { chunk, offset: range.start as u32, len: 6 });
        assert!(dedup.lookup(b"world\n", &store).is_none());
    }
}
