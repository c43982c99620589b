//! Owns the growable set of chunks during index construction: allocation
//! with automatic roll-over to a fresh chunk, the content-map arena, and
//! parallel finalization. Ported from `chunk_manager`/`chunk_allocator` in
//! `chunk.cc`, minus the mmap-backed `mem`/`dump`/`load` subclass split
//! (§9 Design Notes: re-architected as a sum type, see `format.rs` for the
//! read-only mmap path).

use crate::chunk::{Chunk, ChunkBuilder};
use crate::chunkfile::MAX_GAP;
use crate::error::IndexError;
use cs_core::{ChunkId, FileId, RepoId};
use std::ops::Range;

/// A bump-allocated arena for the content-map arena (`alloc_content`,
/// spec.md §4.1), sized independently from the main data chunks. Holds the
/// serialized piece lists written by the dump path (see `format.rs`); the
/// in-memory `ContentMap` a caller reads at query time is a plain
/// `Vec<Piece>` and never needs to walk this arena's packed bytes.
pub struct ContentArena {
    capacity: usize,
    chunks: Vec<Vec<u8>>,
}

impl ContentArena {
    pub fn new(capacity: usize) -> Self {
        ContentArena { capacity, chunks: vec![Vec::new()] }
    }

    /// Reserves `n` contiguous bytes, opening a new arena chunk if the
    /// current one lacks room. Fails if `n` exceeds the arena's chunk
    /// capacity outright.
    pub fn alloc(&mut self, n: usize) -> Result<(usize, Range<usize>), IndexError> {
        if n > self.capacity {
            return Err(IndexError::ChunkCapacityExceeded { wanted: n, capacity: self.capacity });
        }
        let last = self.chunks.len() - 1;
        if self.chunks[last].len() + n > self.capacity {
            self.chunks.push(Vec::new());
        }
        let idx = self.chunks.len() - 1;
        let start = self.chunks[idx].len();
        self.chunks[idx].extend(std::iter::repeat(0u8).take(n));
        Ok((idx, start..start + n))
    }

    pub fn write(&mut self, chunk_idx: usize, range: Range<usize>, bytes: &[u8]) {
        self.chunks[chunk_idx][range].copy_from_slice(bytes);
    }

    pub fn finalize(self) -> Vec<Box<[u8]>> {
        self.chunks.into_iter().map(Vec::into_boxed_slice).collect()
    }
}

/// Owns the line-data chunks during construction: `alloc`/`write` on the
/// current chunk, rolling over to a fresh one when full, plus the
/// begin/add/finish-file bracket each chunk builder exposes for chunk-file
/// record attribution.
pub struct ChunkStore {
    capacity: usize,
    chunks: Vec<ChunkBuilder>,
}

impl ChunkStore {
    pub fn new(capacity: usize) -> Self {
        ChunkStore { capacity, chunks: vec![ChunkBuilder::new(ChunkId(0), capacity)] }
    }

    fn open_new_chunk(&mut self) -> ChunkId {
        let id = ChunkId(self.chunks.len() as u32);
        self.chunks.push(ChunkBuilder::new(id, self.capacity));
        id
    }

    /// Reserves `n` contiguous bytes, opening a new chunk if the current one
    /// lacks room. Fails if `n` exceeds chunk capacity outright (spec.md
    /// §4.1: "fails if n > capacity").
    pub fn alloc(&mut self, n: usize) -> Result<(ChunkId, Range<usize>), IndexError> {
        if n > self.capacity {
            return Err(IndexError::ChunkCapacityExceeded { wanted: n, capacity: self.capacity });
        }
        let last = self.chunks.len() - 1;
        if self.chunks[last].remaining() < n {
            self.open_new_chunk();
        }
        let cur = self.chunks.last_mut().unwrap();
        let range = cur.alloc(n).expect("just ensured room");
        Ok((cur.id, range))
    }

    pub fn write(&mut self, chunk: ChunkId, range: Range<usize>, bytes: &[u8]) {
        self.chunks[chunk.index()].write(range, bytes);
    }

    pub fn read(&self, chunk: ChunkId, offset: u32, len: u32) -> &[u8] {
        let data = self.chunks[chunk.index()].data();
        &data[offset as usize..offset as usize + len as usize]
    }

    pub fn begin_file(&mut self, chunk: ChunkId) {
        self.chunks[chunk.index()].begin_file();
    }

    pub fn add_chunk_file(&mut self, chunk: ChunkId, left: u32, right: u32, file: FileId) {
        self.chunks[chunk.index()].add_chunk_file(left, right, file, MAX_GAP);
    }

    pub fn finish_file(&mut self, chunk: ChunkId, repo: RepoId) {
        self.chunks[chunk.index()].finish_file(repo);
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Builds every chunk's suffix array and chunk-file BST. Suffix-array
    /// construction is independent per chunk and runs across a fixed-size
    /// worker pool (spec.md §4.1: "runs on a worker pool of size threads;
    /// chunks are pushed to a closed bounded channel as they fill"): every
    /// builder is queued on a bounded work channel, the channel is closed by
    /// dropping the sender, and each worker drains it until empty-and-closed.
    pub fn finalize(self, threads: usize) -> Vec<Chunk> {
        let n = self.chunks.len();
        let threads = threads.max(1);

        let (work_tx, work_rx) = crossbeam_channel::bounded::<(usize, ChunkBuilder)>(n.max(1));
        for (idx, builder) in self.chunks.into_iter().enumerate() {
            work_tx.send((idx, builder)).expect("work channel receiver dropped early");
        }
        drop(work_tx);

        let (res_tx, res_rx) = crossbeam_channel::bounded::<(usize, Chunk)>(n.max(1));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("failed to build finalize thread pool");
        pool.scope(|scope| {
            for _ in 0..threads {
                let work_rx = work_rx.clone();
                let res_tx = res_tx.clone();
                scope.spawn(move |_| {
                    while let Ok((idx, builder)) = work_rx.recv() {
                        let _ = res_tx.send((idx, builder.finalize()));
                    }
                });
            }
            drop(res_tx);
        });

        let mut slots: Vec<Option<Chunk>> = (0..n).map(|_| None).collect();
        for (idx, chunk) in res_rx.iter() {
            slots[idx] = Some(chunk);
        }
        slots.into_iter().map(|c| c.expect("every queued chunk is finalized exactly once")).collect()
    }
}
