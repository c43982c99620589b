//! Top-level index-construction driver: turns a stream of `(tree, path,
//! bytes)` triples (the out-of-scope source-acquisition layer's output,
//! spec.md §1) into a finalized [`crate::corpus::Corpus`].
//!
//! Ported from `codesearch.cc::code_searcher::index_file`.

use crate::corpus::Corpus;
use crate::dedup::{LineDeduper, LineRange};
use crate::error::IndexError;
use crate::store::{ChunkStore, ContentArena};
use cs_core::model::{ContentMap, IndexedFile, Piece, Repo, Tree};
use cs_core::{ChunkId, Config, FileId, RepoId, TreeId};
use std::collections::HashSet;

/// Outcome of attempting to index one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed(FileId),
    /// Contained a NUL byte; skipped entirely (spec.md §4.2 binary heuristic).
    SkippedBinary,
}

pub struct CorpusBuilder {
    config: Config,
    store: ChunkStore,
    content_arena: ContentArena,
    dedup: LineDeduper,
    repos: Vec<Repo>,
    trees: Vec<Tree>,
    files: Vec<IndexedFile>,
}

impl CorpusBuilder {
    pub fn new(config: Config) -> Self {
        let chunk_size = config.chunk_size();
        let content_chunk_size = config.content_chunk_size();
        CorpusBuilder {
            store: ChunkStore::new(chunk_size),
            content_arena: ContentArena::new(content_chunk_size),
            dedup: LineDeduper::new(),
            repos: Vec::new(),
            trees: Vec::new(),
            files: Vec::new(),
            config,
        }
    }

    pub fn add_repo(&mut self, repo: Repo) -> RepoId {
        let id = RepoId::from(self.repos.len());
        self.repos.push(repo);
        id
    }

    pub fn add_tree(&mut self, tree: Tree) -> TreeId {
        let id = TreeId::from(self.trees.len());
        self.trees.push(tree);
        id
    }

    /// Indexes one file's bytes under `(tree, path)`. Lines longer than
    /// `config.line_limit` are skipped individually (not indexed, not in
    /// the content map); a file containing a NUL byte is skipped in its
    /// entirety (binary heuristic, spec.md §4.2).
    #[tracing::instrument(skip(self, bytes), fields(path = %path))]
    pub fn index_file(
        &mut self,
        tree: TreeId,
        path: &str,
        bytes: &[u8],
        score: i32,
    ) -> Result<IndexOutcome, IndexError> {
        if bytes.contains(&0u8) {
            tracing::debug!("skipping binary file");
            return Ok(IndexOutcome::SkippedBinary);
        }

        let repo = self.trees[tree.index()].repo;
        let file_id = FileId::from(self.files.len());
        let hash = sha1_digest(bytes);

        let mut content = ContentMap::default();
        let mut opened_chunks: HashSet<ChunkId> = HashSet::new();
        let mut pos = 0usize;

        while pos < bytes.len() {
            let nl = bytes[pos..].iter().position(|&b| b == b'\n');
            let end = match nl {
                Some(rel) => pos + rel + 1,
                None => bytes.len(),
            };
            let line = &bytes[pos..end];
            pos = end;

            if line.len() > self.config.line_limit {
                tracing::warn!(len = line.len(), limit = self.config.line_limit, "line exceeds limit, skipping");
                continue;
            }

            let range = match self.dedup.lookup(line, &self.store) {
                Some(r) => r,
                None => {
                    let (chunk, byte_range) = self.store.alloc(line.len())?;
                    let offset = byte_range.start as u32;
                    self.store.write(chunk, byte_range, line);
                    let r = LineRange { chunk, offset, len: line.len() as u32 };
                    self.dedup.insert(line, r);
                    r
                }
            };

            if opened_chunks.insert(range.chunk) {
                self.store.begin_file(range.chunk);
            }
            self.store.add_chunk_file(range.chunk, range.offset, range.offset + range.len - 1, file_id);

            content.push_extending(Piece { chunk: range.chunk, offset: range.offset, len: range.len });
        }

        for chunk in opened_chunks {
            self.store.finish_file(chunk, repo);
        }

        self.files.push(IndexedFile {
            tree,
            path: path.to_string(),
            hash,
            content,
            score,
            no: file_id,
        });

        Ok(IndexOutcome::Indexed(file_id))
    }

    /// Finalizes every chunk (suffix arrays, chunk-file BSTs) and returns
    /// the immutable, queryable corpus.
    #[tracing::instrument(skip(self))]
    pub fn finalize(self) -> Corpus {
        let threads = self.config.threads;
        let chunks = self.store.finalize(threads);
        let content_arena = self.content_arena.finalize();
        Corpus { chunks, _content_arena: content_arena, repos: self.repos, trees: self.trees, files: self.files }
    }
}

fn sha1_digest(bytes: &[u8]) -> [u8; 20] {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    let mut digest = [0u8; 20];
    digest.copy_from_slice(&out);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> CorpusBuilder {
        CorpusBuilder::new(Config::default())
    }

    #[test]
    fn indexes_a_simple_file() {
        let mut b = builder();
        let repo = b.add_repo(Repo { name: "r".into(), metadata: Default::default() });
        let tree = b.add_tree(Tree { repo, revision: "HEAD".into() });
        let outcome = b.index_file(tree, "a.txt", b"hello\nworld\n", 0).unwrap();
        assert!(matches!(outcome, IndexOutcome::Indexed(_)));
        let corpus = b.finalize();
        assert_eq!(corpus.files.len(), 1);
        assert_eq!(corpus.files[0].content.pieces.len(), 1);
    }

    #[test]
    fn binary_file_is_skipped_entirely() {
        let mut b = builder();
        let repo = b.add_repo(Repo { name: "r".into(), metadata: Default::default() });
        let tree = b.add_tree(Tree { repo, revision: "HEAD".into() });
        let outcome = b.index_file(tree, "bin.dat", b"\x00\x01\x02", 0).unwrap();
        assert_eq!(outcome, IndexOutcome::SkippedBinary);
        let corpus = b.finalize();
        assert_eq!(corpus.files.len(), 0);
    }

    #[test]
    fn over_long_line_is_skipped_but_file_still_indexed() {
        let mut cfg = Config::default();
        cfg.line_limit = 5;
        let mut b = CorpusBuilder::new(cfg);
        let repo = b.add_repo(Repo { name: "r".into(), metadata: Default::default() });
        let tree = b.add_tree(Tree { repo, revision: "HEAD".into() });
        let bytes = b"short\nthis line is too long\nok\n".to_vec();
        let outcome = b.index_file(tree, "a.txt", &bytes, 0).unwrap();
        assert!(matches!(outcome, IndexOutcome::Indexed(_)));
        let corpus = b.finalize();
        // "short\n" (6 bytes, over the limit of 5) is ALSO dropped: limit is on line length.
        // Only "ok\n" (3 bytes) survives.
        assert_eq!(corpus.files[0].content.pieces.len(), 1);
    }

    #[test]
    fn duplicate_lines_across_files_share_storage() {
        let mut b = builder();
        let repo = b.add_repo(Repo { name: "r".into(), metadata: Default::default() });
        let tree = b.add_tree(Tree { repo, revision: "HEAD".into() });
        b.index_file(tree, "a.txt", b"hello world\n", 0).unwrap();
        b.index_file(tree, "b.txt", b"hello world\n", 0).unwrap();
        let corpus = b.finalize();
        assert_eq!(corpus.chunks[0].size(), "hello world\n".len());
        let mut hits = Vec::new();
        corpus.chunks[0].file_tree.visit_containing(0, |r| hits.extend(r.files.iter().copied()));
        assert_eq!(hits.len(), 2);
    }
}
