//! Match resolver: maps a matching byte range inside a chunk to the set of
//! files that contain it, recovers the line number, and gathers context
//! lines. Ported from `codesearch.cc::try_match`/`finish_group`.

use cs_core::model::IndexedFile;
use cs_core::query::{LineRef, MatchContext, PatternFilter};
use cs_core::FileId;
use cs_index::{Chunk, Corpus};

/// A compiled file/tree predicate: pattern plus its negation flag.
pub struct CompiledFilter {
    pub re: regex::Regex,
    pub negate: bool,
}

impl CompiledFilter {
    pub fn compile(f: &PatternFilter) -> Result<CompiledFilter, regex::Error> {
        Ok(CompiledFilter { re: regex::Regex::new(&f.pattern)?, negate: f.negate })
    }

    pub fn accepts(&self, haystack: &str) -> bool {
        self.re.is_match(haystack) != self.negate
    }
}

/// Builds the flat, in-file-order list of every indexed line's `LineRef`,
/// by re-splitting each content-map piece on its internal `\n` boundaries.
/// This is the "index-and-rescan pass" Design Notes sanction as an
/// alternative to a doubly-linked piece representation.
fn file_lines(corpus: &Corpus, file: &IndexedFile) -> Vec<LineRef> {
    let mut lines = Vec::new();
    for piece in &file.content.pieces {
        let data = &corpus.chunk(piece.chunk).data;
        let end = piece.offset + piece.len;
        let mut start = piece.offset;
        while start < end {
            let rel_end = match data[start as usize..end as usize].iter().position(|&b| b == b'\n') {
                Some(rel) => start + rel as u32 + 1,
                None => end,
            };
            lines.push(LineRef { chunk: piece.chunk, offset: start, len: rel_end - start });
            start = rel_end;
        }
    }
    lines
}

/// Resolves one matching line (`chunk`, `[line_start, line_end)`) into zero
/// or more `MatchContext`s, one per distinct context shape, coalescing files
/// whose 3-line-each-side context is byte-identical (spec.md §4.5 item 5) —
/// since identical lines are deduplicated into the same stored byte ranges
/// at index time, two files share a context iff their `LineRef` sequences
/// are equal, so no separate content hash is needed.
pub fn resolve_line(
    corpus: &Corpus,
    chunk: &Chunk,
    line_start: u32,
    line_end: u32,
    file_filter: &Option<CompiledFilter>,
    tree_filter: &Option<CompiledFilter>,
) -> Vec<MatchContext> {
    if std::str::from_utf8(&chunk.data[line_start as usize..line_end as usize]).is_err() {
        return Vec::new();
    }

    let mut candidates: Vec<FileId> = Vec::new();
    chunk.file_tree.visit_containing(line_start, |rec| {
        if rec.left <= line_start && line_end.saturating_sub(1) <= rec.right {
            candidates.extend(rec.files.iter().copied());
        }
    });

    let mut groups: Vec<MatchContext> = Vec::new();
    for file_id in candidates {
        let file = corpus.file(file_id);

        if let Some(f) = file_filter {
            if !f.accepts(&corpus.file_path(file_id)) {
                continue;
            }
        }
        if let Some(t) = tree_filter {
            if !t.accepts(corpus.repo_name(file_id)) {
                continue;
            }
        }

        // A file can contain the matched byte range more than once — e.g.
        // two occurrences of an otherwise-deduplicated line in the same
        // file (spec.md §8 scenario 2: "aaa\nbbb\naaa\n" must resolve to
        // lno=1 *and* lno=3, both sharing the one stored copy of "aaa\n").
        // `position()` would only ever report the first, so every matching
        // index in the file's line list is walked instead.
        let lines = file_lines(corpus, file);
        let occurrences: Vec<usize> =
            lines.iter().enumerate().filter(|(_, l)| l.chunk == chunk.id && l.offset == line_start).map(|(idx, _)| idx).collect();
        if occurrences.is_empty() {
            // The chunk-file record says this file shares the byte range,
            // but the file's own content map disagrees — skip rather than
            // report a phantom match (spec.md §4.5 item 3).
            continue;
        }

        for idx in occurrences {
            let before_start = idx.saturating_sub(3);
            let context_before = lines[before_start..idx].to_vec();
            let after_end = (idx + 1 + 3).min(lines.len());
            let context_after = lines[idx + 1..after_end].to_vec();
            let lno = (idx + 1) as u32;

            if let Some(existing) =
                groups.iter_mut().find(|g| g.lno == lno && g.context_before == context_before && g.context_after == context_after)
            {
                existing.paths.push(file_id);
            } else {
                groups.push(MatchContext { file: file_id, paths: vec![file_id], lno, context_before, context_after });
            }
        }
    }

    groups
}
