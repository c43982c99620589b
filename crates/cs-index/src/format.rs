//! Binary index file: dump a finalized [`Corpus`] to disk and load it back.
//!
//! Follows spec.md §6's shape (versioned magic header, page-aligned
//! sections, per-chunk `{data_off, files_off, size, n_files}` headers, raw
//! chunk data + suffix array laid out contiguously) without committing to
//! byte-for-byte parity with the original's field layout — the spec itself
//! scopes the on-disk format as "described only at the invariant level
//! needed by the core" (§1). Section bookkeeping (header, chunk-file
//! records, file/tree/repo tables) goes through `bincode`; the raw chunk
//! bytes and suffix arrays are written as flat slices at manually computed,
//! 4 KiB-aligned offsets so the load path's `memmap2::Mmap` lands them
//! correctly aligned.

use crate::chunk::Chunk;
use crate::chunkfile::{ChunkFileRecord, ChunkFileTree};
use crate::corpus::Corpus;
use crate::error::IndexError;
use cs_core::model::{IndexedFile, Piece, Repo, Tree};
use cs_core::{ChunkId, FileId, RepoId, TreeId};
use memmap2::{Advice, Mmap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

pub const MAGIC: u32 = 0xC0D3_5EAC;
pub const VERSION: u32 = 14;
const PAGE_SIZE: u64 = 4096;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: u32,
    version: u32,
    chunk_size: u32,
    n_repos: u32,
    n_trees: u32,
    n_files: u32,
    n_chunks: u32,
    timestamp: i64,
    repos_off: u64,
    trees_off: u64,
    files_off: u64,
    chunk_headers_off: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkHeader {
    data_off: u64,
    files_off: u64,
    size: u32,
    n_files: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct RepoRecord {
    name: String,
    metadata: Vec<(String, String)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TreeRecord {
    repo: u32,
    revision: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileRecord {
    tree: u32,
    path: String,
    hash: [u8; 20],
    score: i32,
    pieces: Vec<(u32, u32, u32)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkFileRecordOnDisk {
    left: u32,
    right: u32,
    file_ids: Vec<u32>,
}

fn page_align(off: u64) -> u64 {
    (off + PAGE_SIZE - 1) / PAGE_SIZE * PAGE_SIZE
}

/// Serializes `corpus` to `path` in the format above. `timestamp` is passed
/// in by the caller (the core never calls `SystemTime::now()` itself, to
/// keep index construction deterministic and testable).
#[tracing::instrument(skip(corpus))]
pub fn dump(path: &Path, corpus: &Corpus, timestamp: i64) -> Result<(), IndexError> {
    let mut file = std::fs::File::create(path)?;

    // Placeholder header; rewritten once offsets are known.
    let header_len = bincode::serialized_size(&Header {
        magic: 0, version: 0, chunk_size: 0, n_repos: 0, n_trees: 0, n_files: 0,
        n_chunks: 0, timestamp: 0, repos_off: 0, trees_off: 0, files_off: 0, chunk_headers_off: 0,
    })?;
    file.seek(SeekFrom::Start(header_len))?;
    let mut cursor = header_len;

    let repos_off = cursor;
    let repo_records: Vec<RepoRecord> = corpus
        .repos
        .iter()
        .map(|r| RepoRecord { name: r.name.clone(), metadata: r.metadata.clone().into_iter().collect() })
        .collect();
    bincode::serialize_into(&mut file, &repo_records)?;
    cursor = file.stream_position()?;

    let trees_off = cursor;
    let tree_records: Vec<TreeRecord> =
        corpus.trees.iter().map(|t| TreeRecord { repo: t.repo.0, revision: t.revision.clone() }).collect();
    bincode::serialize_into(&mut file, &tree_records)?;
    cursor = file.stream_position()?;

    let files_off = cursor;
    let file_records: Vec<FileRecord> = corpus
        .files
        .iter()
        .map(|f| FileRecord {
            tree: f.tree.0,
            path: f.path.clone(),
            hash: f.hash,
            score: f.score,
            pieces: f.content.pieces.iter().map(|p| (p.chunk.0, p.offset, p.len)).collect(),
        })
        .collect();
    bincode::serialize_into(&mut file, &file_records)?;
    cursor = file.stream_position()?;

    // Chunk headers are written after a placeholder; filled in once each
    // chunk's data/suffix-array/file-records offsets are known.
    let chunk_headers_off = cursor;
    let mut chunk_headers = Vec::with_capacity(corpus.chunks.len());
    let placeholder_headers: Vec<ChunkHeader> = (0..corpus.chunks.len())
        .map(|_| ChunkHeader { data_off: 0, files_off: 0, size: 0, n_files: 0 })
        .collect();
    cursor = page_align(cursor + bincode::serialized_size(&placeholder_headers)?);

    for chunk in &corpus.chunks {
        cursor = page_align(cursor);
        let data_off = cursor;
        file.seek(SeekFrom::Start(data_off))?;
        file.write_all(&chunk.data)?;
        for &s in &chunk.suffixes {
            file.write_all(&s.to_le_bytes())?;
        }
        cursor = file.stream_position()?;

        let files_off = cursor;
        let records: Vec<ChunkFileRecordOnDisk> = chunk
            .file_tree
            .files
            .iter()
            .map(|r| ChunkFileRecordOnDisk { left: r.left, right: r.right, file_ids: r.files.iter().map(|f| f.0).collect() })
            .collect();
        bincode::serialize_into(&mut file, &records)?;
        cursor = file.stream_position()?;

        chunk_headers.push(ChunkHeader { data_off, files_off, size: chunk.size() as u32, n_files: chunk.file_tree.files.len() as u32 });
    }

    file.seek(SeekFrom::Start(chunk_headers_off))?;
    bincode::serialize_into(&mut file, &chunk_headers)?;

    let header = Header {
        magic: MAGIC,
        version: VERSION,
        chunk_size: corpus.chunks.first().map(|c| c.data.len() as u32).unwrap_or(0),
        n_repos: corpus.repos.len() as u32,
        n_trees: corpus.trees.len() as u32,
        n_files: corpus.files.len() as u32,
        n_chunks: corpus.chunks.len() as u32,
        timestamp,
        repos_off,
        trees_off,
        files_off,
        chunk_headers_off,
    };
    file.seek(SeekFrom::Start(0))?;
    bincode::serialize_into(&mut file, &header)?;
    file.sync_all()?;
    Ok(())
}

/// Loads an index file written by [`dump`]. The file is `mmap`'d read-only
/// for the duration of the load; chunk data and suffix arrays are copied
/// out into owned buffers rather than kept as live borrows into the
/// mapping — a deliberate simplification (see DESIGN.md) that trades the
/// spec's zero-copy ideal for a `Corpus` with no lifetime tied to the
/// mapping, at the cost of one extra copy at load time.
#[tracing::instrument]
pub fn load(path: &Path) -> Result<Corpus, IndexError> {
    let file = std::fs::File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    let _ = mmap.advise(Advice::Random);

    let mut cursor = std::io::Cursor::new(&mmap[..]);
    let header: Header = bincode::deserialize_from(&mut cursor)
        .map_err(|e| IndexError::MalformedIndex { reason: format!("header: {e}") })?;
    if header.magic != MAGIC {
        return Err(IndexError::MalformedIndex { reason: format!("bad magic: {:#x}", header.magic) });
    }
    if header.version != VERSION {
        return Err(IndexError::MalformedIndex { reason: format!("unsupported version: {}", header.version) });
    }

    let repos = read_section::<RepoRecord>(&mmap, header.repos_off)?
        .into_iter()
        .map(|r| Repo { name: r.name, metadata: r.metadata.into_iter().collect() })
        .collect();

    let trees = read_section::<TreeRecord>(&mmap, header.trees_off)?
        .into_iter()
        .map(|t| Tree { repo: RepoId(t.repo), revision: t.revision })
        .collect();

    let file_records = read_section::<FileRecord>(&mmap, header.files_off)?;
    let files: Vec<IndexedFile> = file_records
        .into_iter()
        .enumerate()
        .map(|(idx, f)| IndexedFile {
            tree: TreeId(f.tree),
            path: f.path,
            hash: f.hash,
            content: cs_core::model::ContentMap {
                pieces: f.pieces.into_iter().map(|(c, o, l)| Piece { chunk: ChunkId(c), offset: o, len: l }).collect(),
            },
            score: f.score,
            no: FileId::from(idx),
        })
        .collect();

    let chunk_headers = read_section::<ChunkHeader>(&mmap, header.chunk_headers_off)?;
    let mut chunks = Vec::with_capacity(chunk_headers.len());
    for (idx, ch) in chunk_headers.into_iter().enumerate() {
        let data_start = ch.data_off as usize;
        let data_end = data_start + ch.size as usize;
        let data: Box<[u8]> = mmap[data_start..data_end].to_vec().into_boxed_slice();

        let sa_start = data_end;
        let sa_end = sa_start + ch.size as usize * 4;
        let suffixes: Vec<u32> = mmap[sa_start..sa_end]
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let records = read_section::<ChunkFileRecordOnDisk>(&mmap, ch.files_off)?;
        let chunk_file_records: Vec<ChunkFileRecord> = records
            .into_iter()
            .map(|r| ChunkFileRecord { left: r.left, right: r.right, files: r.file_ids.into_iter().map(FileId).collect() })
            .collect();
        let file_tree = ChunkFileTree::build(chunk_file_records);

        let mut tree_names: BTreeSet<RepoId> = BTreeSet::new();
        for rec in &file_tree.files {
            for &fid in &rec.files {
                if let Some(f) = files.get(fid.index()) {
                    tree_names.insert(trees[f.tree.index()].repo);
                }
            }
        }

        chunks.push(Chunk { id: ChunkId(idx as u32), data, suffixes, file_tree, tree_names });
    }

    Ok(Corpus { chunks, _content_arena: Vec::new(), repos, trees, files })
}

fn read_section<T: for<'de> Deserialize<'de>>(mmap: &Mmap, offset: u64) -> Result<Vec<T>, IndexError> {
    let mut cursor = std::io::Cursor::new(&mmap[offset as usize..]);
    Ok(bincode::deserialize_from(&mut cursor)?)
}

/// Advises the OS the mapping will be accessed randomly (called once after
/// load, per spec.md §5). Best-effort: failures are logged, not fatal.
pub fn advise_random(mmap: &Mmap) {
    if let Err(e) = mmap.advise(Advice::Random) {
        tracing::warn!(error = %e, "madvise(RANDOM) failed");
    }
}

/// Advises the OS to drop cached pages for the mapping (called on teardown).
pub fn drop_caches(mmap: &Mmap) {
    if let Err(e) = mmap.advise(Advice::DontNeed) {
        tracing::warn!(error = %e, "madvise(DONTNEED) failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CorpusBuilder;
    use cs_core::Config;

    #[test]
    fn dump_and_load_round_trips_a_small_corpus() {
        let mut b = CorpusBuilder::new(Config::default());
        let repo = b.add_repo(Repo { name: "r".into(), metadata: Default::default() });
        let tree = b.add_tree(Tree { repo, revision: "HEAD".into() });
        b.index_file(tree, "a.txt", b"hello world\nfoo bar\n", 5).unwrap();
        b.index_file(tree, "b.txt", b"hello world\nbaz\n", 0).unwrap();
        let corpus = b.finalize();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.cs");
        dump(&path, &corpus, 1_700_000_000).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.files.len(), 2);
        assert_eq!(loaded.repos.len(), 1);
        assert_eq!(loaded.chunks.len(), corpus.chunks.len());
        assert_eq!(&*loaded.chunks[0].data, &*corpus.chunks[0].data);
        assert_eq!(loaded.chunks[0].suffixes, corpus.chunks[0].suffixes);
        assert_eq!(loaded.file_path(FileId(0)), "r/a.txt");
    }

    #[test]
    fn bad_magic_is_a_malformed_index_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.cs");
        std::fs::write(&path, b"not an index file at all, just junk bytes here").unwrap();
        let err = load(&path).unwrap_err();
        match err {
            IndexError::MalformedIndex { .. } => {}
            other => panic!("expected MalformedIndex, got {other:?}"),
        }
    }
}
