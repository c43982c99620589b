//! Filesystem source-acquisition: walks a directory tree into the `(tree,
//! path, bytes)` triples `CorpusBuilder::index_file` consumes. Out of scope
//! per spec.md §1 ("the source-acquisition layer... interfaces only"); kept
//! here because `csbuild` needs a concrete one to be runnable end to end.
//! Ported from the teacher's `oc-indexer::scanner`.

use ignore::WalkBuilder;
use std::path::Path;

/// Directories never worth indexing regardless of `.gitignore` contents.
const VENDOR_DIRS: &[&str] = &["vendor", "node_modules", "third_party", ".git", ".venv", "venv"];

/// One file discovered under a scan root, with its path relative to that
/// root (forward-slash normalized) and its raw bytes.
pub struct ScannedFile {
    pub rel_path: String,
    pub bytes: Vec<u8>,
}

/// Walks `root`, respecting `.gitignore`/`.git/info/exclude`/global
/// gitignore, skipping hidden entries, symlinks, and [`VENDOR_DIRS`].
/// Files that fail to read (permission denied, removed mid-walk) are
/// skipped with a `tracing::warn!`, not surfaced as an error — a single
/// unreadable file should not abort indexing the rest of the corpus.
pub fn scan_tree(root: &Path) -> Vec<ScannedFile> {
    let mut files = Vec::new();

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .follow_links(false)
        .filter_entry(|entry| {
            if entry.file_type().map_or(false, |ft| ft.is_dir()) {
                if let Some(name) = entry.file_name().to_str() {
                    return !VENDOR_DIRS.contains(&name);
                }
            }
            true
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let Some(ft) = entry.file_type() else { continue };
        if !ft.is_file() {
            continue;
        }
        let path = entry.path();
        let rel = match path.strip_prefix(root) {
            Ok(r) => normalize(r),
            Err(_) => continue,
        };
        match std::fs::read(path) {
            Ok(bytes) => files.push(ScannedFile { rel_path: rel, bytes }),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file"),
        }
    }

    files
}

fn normalize(p: &Path) -> String {
    p.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
