//! A fixed-capacity byte buffer concatenating indexed lines, plus everything
//! built over it once filling is complete. Ported from `chunk.h`/`chunk.cc`.

use crate::chunkfile::{ChunkFileRecord, ChunkFileTree, PendingFile};
use crate::suffix;
use cs_core::{ChunkId, FileId, RepoId};
use std::collections::BTreeSet;
use std::ops::Range;

/// The growable, mutable form of a chunk during index construction.
pub struct ChunkBuilder {
    pub id: ChunkId,
    capacity: usize,
    data: Vec<u8>,
    files: Vec<ChunkFileRecord>,
    cur_file: Option<PendingFile>,
    tree_names: BTreeSet<RepoId>,
}

impl ChunkBuilder {
    pub fn new(id: ChunkId, capacity: usize) -> Self {
        ChunkBuilder {
            id,
            capacity,
            data: Vec::with_capacity(capacity.min(1 << 20)),
            files: Vec::new(),
            cur_file: None,
            tree_names: BTreeSet::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    /// Reserves `n` contiguous bytes at the end of the chunk, returning the
    /// byte range to write into. `None` if `n` exceeds the remaining space.
    pub fn alloc(&mut self, n: usize) -> Option<Range<usize>> {
        if n > self.remaining() {
            return None;
        }
        let start = self.data.len();
        self.data.extend(std::iter::repeat(0u8).take(n));
        Some(start..start + n)
    }

    pub fn write(&mut self, range: Range<usize>, bytes: &[u8]) {
        self.data[range].copy_from_slice(bytes);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn begin_file(&mut self) {
        self.cur_file = Some(PendingFile::new());
    }

    pub fn add_chunk_file(&mut self, left: u32, right: u32, file: FileId, max_gap: u32) {
        self.cur_file
            .as_mut()
            .expect("begin_file must be called before add_chunk_file")
            .add(left, right, file, max_gap);
    }

    pub fn finish_file(&mut self, repo: RepoId) {
        let pending = self.cur_file.take().expect("begin_file must be called before finish_file");
        self.files.extend(pending.finish());
        self.tree_names.insert(repo);
    }

    /// Builds the suffix array (via the `\n -> \0` swap trick) and the
    /// augmented chunk-file BST, producing an immutable [`Chunk`].
    pub fn finalize(mut self) -> Chunk {
        for b in self.data.iter_mut() {
            if *b == b'\n' {
                *b = 0;
            }
        }
        let suffixes = suffix::build(&self.data);
        for b in self.data.iter_mut() {
            if *b == 0 {
                *b = b'\n';
            }
        }
        let file_tree = ChunkFileTree::build(self.files);
        Chunk { id: self.id, data: self.data.into_boxed_slice(), suffixes, file_tree, tree_names: self.tree_names }
    }
}

/// An immutable, finalized chunk: concatenated line data, its suffix array,
/// and the chunk-file records attributing byte ranges to files.
pub struct Chunk {
    pub id: ChunkId,
    pub data: Box<[u8]>,
    pub suffixes: Vec<u32>,
    pub file_tree: ChunkFileTree,
    pub tree_names: BTreeSet<RepoId>,
}

impl Chunk {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// The byte offset immediately following the `\n` that ends the line
    /// containing `offset` (or `data.len()` if there is none).
    pub fn line_end(&self, offset: usize) -> usize {
        match self.data[offset..].iter().position(|&b| b == b'\n') {
            Some(rel) => offset + rel + 1,
            None => self.data.len(),
        }
    }

    /// The byte offset of the start of the line containing `offset` (the
    /// byte after the previous `\n`, or 0).
    pub fn line_start(&self, offset: usize) -> usize {
        match self.data[..offset].iter().rposition(|&b| b == b'\n') {
            Some(rel) => rel + 1,
            None => 0,
        }
    }
}
