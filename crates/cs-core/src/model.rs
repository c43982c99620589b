//! Repo / tree / file records that sit above the chunk store.

use crate::ids::{RepoId, TreeId};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Repo {
    pub name: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Tree {
    pub repo: RepoId,
    pub revision: String,
}

/// One piece of a file's content, referencing a byte range inside some
/// chunk's data. A file's full content is the concatenation of its pieces in
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub chunk: crate::ids::ChunkId,
    pub offset: u32,
    pub len: u32,
}

/// A file's content expressed as an ordered list of pieces into the chunk
/// store. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ContentMap {
    pub pieces: Vec<Piece>,
}

impl ContentMap {
    /// Appends `piece`, extending the previous piece in place if it is
    /// byte-contiguous with it (same chunk, immediately following offset).
    pub fn push_extending(&mut self, piece: Piece) {
        if let Some(prev) = self.pieces.last_mut() {
            if prev.chunk == piece.chunk && prev.offset + prev.len == piece.offset {
                prev.len += piece.len;
                return;
            }
        }
        self.pieces.push(piece);
    }
}

#[derive(Debug, Clone)]
pub struct IndexedFile {
    pub tree: TreeId,
    pub path: String,
    /// 20-byte SHA-1 digest used purely for file-level identity/dedup.
    pub hash: [u8; 20],
    pub content: ContentMap,
    pub score: i32,
    pub no: crate::ids::FileId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ChunkId;

    #[test]
    fn contiguous_pieces_merge() {
        let mut cm = ContentMap::default();
        cm.push_extending(Piece { chunk: ChunkId(0), offset: 0, len: 10 });
        cm.push_extending(Piece { chunk: ChunkId(0), offset: 10, len: 5 });
        assert_eq!(cm.pieces.len(), 1);
        assert_eq!(cm.pieces[0].len, 15);
    }

    #[test]
    fn non_contiguous_pieces_stay_separate() {
        let mut cm = ContentMap::default();
        cm.push_extending(Piece { chunk: ChunkId(0), offset: 0, len: 10 });
        cm.push_extending(Piece { chunk: ChunkId(0), offset: 20, len: 5 });
        assert_eq!(cm.pieces.len(), 2);
    }

    #[test]
    fn different_chunk_breaks_contiguity() {
        let mut cm = ContentMap::default();
        cm.push_extending(Piece { chunk: ChunkId(0), offset: 0, len: 10 });
        cm.push_extending(Piece { chunk: ChunkId(1), offset: 10, len: 5 });
        assert_eq!(cm.pieces.len(), 2);
    }
}
