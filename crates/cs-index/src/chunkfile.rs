//! Chunk-file records and the augmented interval-tree BST built over them.
//!
//! Ported from `chunk.h`/`chunk.cc`'s `chunk_file` / `chunk_file_node`.

use cs_core::FileId;

pub const MAX_GAP: u32 = 1 << 10;

/// "Bytes `[left, right]` of this chunk are present in each of these files."
#[derive(Debug, Clone)]
pub struct ChunkFileRecord {
    pub left: u32,
    pub right: u32,
    pub files: Vec<FileId>,
}

impl ChunkFileRecord {
    fn gap_to(&self, l: u32, r: u32) -> i64 {
        if r < self.left {
            self.left as i64 - r as i64
        } else if l > self.right {
            l as i64 - self.right as i64
        } else {
            // overlapping
            -1
        }
    }

    fn expand(&mut self, l: u32, r: u32) {
        self.left = self.left.min(l);
        self.right = self.right.max(r);
    }
}

/// Accumulates chunk-file records for the file currently being indexed.
/// Flushed into the chunk's `files` list by `finish_file`.
#[derive(Debug, Default)]
pub struct PendingFile {
    records: Vec<ChunkFileRecord>,
}

impl PendingFile {
    pub fn new() -> Self {
        PendingFile::default()
    }

    /// Attributes byte range `[l, r]` to `file`, expanding the
    /// minimum-gap-distance existing record if it is closer than
    /// `max_gap`, else opening a new one.
    pub fn add(&mut self, l: u32, r: u32, file: FileId, max_gap: u32) {
        let mut best: Option<(usize, i64)> = None;
        for (idx, rec) in self.records.iter().enumerate() {
            let gap = rec.gap_to(l, r);
            if best.is_none() || gap < best.unwrap().1 {
                best = Some((idx, gap));
            }
        }
        if let Some((idx, gap)) = best {
            if gap < 0 || (gap as u64) < max_gap as u64 {
                self.records[idx].expand(l, r);
                if !self.records[idx].files.contains(&file) {
                    self.records[idx].files.push(file);
                }
                return;
            }
        }
        self.records.push(ChunkFileRecord { left: l, right: r, files: vec![file] });
    }

    /// Sorts pending records by `left`, asserts non-overlap, and returns
    /// them for appending into the chunk's `files` list.
    pub fn finish(mut self) -> Vec<ChunkFileRecord> {
        self.records.sort_by_key(|r| r.left);
        for w in self.records.windows(2) {
            debug_assert!(w[0].right < w[1].left, "overlapping chunk_file records on finish_file");
        }
        self.records
    }
}

/// A balanced BST over `files`, keyed by array position (already sorted by
/// `left`), augmented with `right_limit` = max `right` across the subtree.
pub struct ChunkFileTree {
    pub files: Vec<ChunkFileRecord>,
    nodes: Vec<TreeNode>,
    root: Option<usize>,
}

struct TreeNode {
    record_idx: usize,
    right_limit: u32,
    left: Option<usize>,
    right: Option<usize>,
}

impl ChunkFileTree {
    /// Merges records with identical `(left, right)` (unioning their file
    /// sets) and builds the augmented BST.
    pub fn build(mut records: Vec<ChunkFileRecord>) -> ChunkFileTree {
        records.sort_by_key(|r| (r.left, r.right));
        let mut merged: Vec<ChunkFileRecord> = Vec::with_capacity(records.len());
        for rec in records {
            if let Some(last) = merged.last_mut() {
                if last.left == rec.left && last.right == rec.right {
                    for f in rec.files {
                        if !last.files.contains(&f) {
                            last.files.push(f);
                        }
                    }
                    continue;
                }
            }
            merged.push(rec);
        }

        let mut tree = ChunkFileTree { files: merged, nodes: Vec::new(), root: None };
        if !tree.files.is_empty() {
            let n = tree.files.len();
            tree.root = Some(tree.build_range(0, n));
        }
        tree
    }

    fn build_range(&mut self, left: usize, right: usize) -> usize {
        let mid = left + (right - left) / 2;
        let left_child = if mid > left { Some(self.build_range(left, mid)) } else { None };
        let right_child = if mid + 1 < right { Some(self.build_range(mid + 1, right)) } else { None };

        let mut right_limit = self.files[mid].right;
        if let Some(l) = left_child {
            right_limit = right_limit.max(self.nodes[l].right_limit);
        }
        if let Some(r) = right_child {
            right_limit = right_limit.max(self.nodes[r].right_limit);
        }

        self.nodes.push(TreeNode { record_idx: mid, right_limit, left: left_child, right: right_child });
        self.nodes.len() - 1
    }

    /// Visits every record whose `[left, right]` contains `offset`, in
    /// ascending `left` order, pruning subtrees via `right_limit`.
    pub fn visit_containing(&self, offset: u32, mut f: impl FnMut(&ChunkFileRecord)) {
        if let Some(root) = self.root {
            self.visit_node(root, offset, &mut f);
        }
    }

    fn visit_node(&self, idx: usize, offset: u32, f: &mut impl FnMut(&ChunkFileRecord)) {
        let node = &self.nodes[idx];
        if node.right_limit < offset {
            return;
        }
        if let Some(l) = node.left {
            self.visit_node(l, offset, f);
        }
        let rec = &self.files[node.record_idx];
        if rec.left <= offset && offset <= rec.right {
            f(rec);
        }
        if rec.left > offset {
            return;
        }
        if let Some(r) = node.right {
            self.visit_node(r, offset, f);
        }
    }
}
