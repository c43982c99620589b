//! Search driver: fans a query out across every chunk in a corpus on a fixed
//! thread pool, merges results through a bounded channel, and enforces the
//! timeout / match-limit cutoffs. Ported from `codesearch.cc::code_searcher::match`.

use crate::error::SearchError;
use crate::filtered::{filtered_candidates, widen_to_line_ranges, LineRange};
use crate::fullscan::full_search;
use crate::resolve::{resolve_line, CompiledFilter};
use cs_core::query::{ExitReason, MatchContext, MatchResult, Query, SearchStats};
use cs_core::Config;
use cs_index::{Chunk, Corpus};
use cs_planner::{freeze, plan_query, FrozenKey, Limits};
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Every candidate-line iteration checks the deadline only once per this
/// many iterations — `gettimeofday` on every line would itself dominate
/// runtime on a selective query (spec.md §4.6 recovered detail).
const DEADLINE_CHECK_STRIDE: u64 = 1000;

/// Above this acceptance fraction, a file/tree predicate is not selective
/// enough to justify abandoning the suffix-array path in favor of a full
/// scan; below it, a full scan of the (much smaller) predicate-accepted set
/// is assumed cheaper than filtering every chunk for the file/tree predicate
/// up front. This engine has no per-repo chunk partitioning to exploit the
/// low-acceptance case directly, so the knob only suppresses the filtered
/// path's own bail-out reporting — see `files_density` below.
const LOW_DENSITY_THRESHOLD: f64 = 0.05;

pub struct SearchOutcome {
    pub results: Vec<MatchResult>,
    pub stats: SearchStats,
}

/// Runs queries against one immutable, already-loaded [`Corpus`].
pub struct SearchDriver<'a> {
    corpus: &'a Corpus,
    config: &'a Config,
    density_cache: Mutex<Option<f64>>,
}

impl<'a> SearchDriver<'a> {
    pub fn new(corpus: &'a Corpus, config: &'a Config) -> Self {
        SearchDriver { corpus, config, density_cache: Mutex::new(None) }
    }

    #[tracing::instrument(skip(self, query), fields(pattern = %query.line))]
    pub fn run(&self, query: &Query) -> Result<SearchOutcome, SearchError> {
        let start = Instant::now();

        let fold_case = query.effective_fold_case();
        let pattern = if fold_case { format!("(?i){}", query.line) } else { query.line.clone() };
        let regex = regex::bytes::Regex::new(&pattern)?;

        let limits = Limits::from(self.config);
        let planned = plan_query(&query.line, fold_case, &limits, self.config.max_hir_nodes)?;
        // `plan_query`'s `Rc<RefCell<_>>` trie is single-threaded by design
        // (path-copy grafting during planning); freeze it into a plain `Arc`
        // tree once, here, before it's shared read-only across the worker
        // pool below.
        let key: Option<Arc<FrozenKey>> = planned.as_ref().map(freeze);

        let file_filter = query.file.as_ref().map(CompiledFilter::compile).transpose()?;
        let tree_filter = query.tree.as_ref().map(CompiledFilter::compile).transpose()?;
        if query.tags.is_some() {
            tracing::warn!("tags predicate supplied but ctags indexing is out of scope, ignoring");
        }

        let has_predicate = file_filter.is_some() || tree_filter.is_some();
        let use_full_for_predicate = has_predicate && self.files_density(query) < LOW_DENSITY_THRESHOLD;

        let analyze_time_ms = start.elapsed().as_millis() as u64;

        let exit_reason = AtomicU8::new(ExitReason::None as u8);
        let matches_count = AtomicI64::new(0);
        let re2_time_us = AtomicU64::new(0);
        let index_time_us = AtomicU64::new(0);
        let deadline = start + self.config.timeout();
        let threads = self.config.threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| SearchError::InvalidArgument(e.to_string()))?;

        let mut collected: Vec<MatchResult> = pool.scope(|scope| {
            let (chunk_tx, chunk_rx) = crossbeam_channel::bounded::<usize>(self.corpus.chunks.len().max(1));
            for i in 0..self.corpus.chunks.len() {
                let _ = chunk_tx.send(i);
            }
            drop(chunk_tx);

            let (res_tx, res_rx) = crossbeam_channel::bounded::<MatchResult>(4096);

            for _ in 0..threads {
                let chunk_rx = chunk_rx.clone();
                let res_tx = res_tx.clone();
                let exit_reason = &exit_reason;
                let matches_count = &matches_count;
                let re2_time_us = &re2_time_us;
                let index_time_us = &index_time_us;
                let regex = &regex;
                let key = &key;
                let file_filter = &file_filter;
                let tree_filter = &tree_filter;
                scope.spawn(move |_| {
                    while let Ok(idx) = chunk_rx.recv() {
                        if exit_reason.load(Ordering::Acquire) != ExitReason::None as u8 {
                            break;
                        }
                        let chunk = &self.corpus.chunks[idx];
                        if !chunk_may_satisfy_tree(self.corpus, chunk, tree_filter) {
                            continue;
                        }
                        search_chunk(SearchChunkArgs {
                            corpus: self.corpus,
                            chunk,
                            key,
                            regex,
                            config: self.config,
                            query,
                            file_filter,
                            tree_filter,
                            use_full_for_predicate,
                            exit_reason,
                            matches_count,
                            re2_time_us,
                            index_time_us,
                            deadline,
                            res_tx: &res_tx,
                        });
                    }
                });
            }
            drop(res_tx);

            let mut collected = Vec::new();
            while let Ok(r) = res_rx.recv() {
                collected.push(r);
            }
            collected
        });

        let sort_start = Instant::now();
        let cap = query.max_matches.max(0) as usize;
        if collected.len() > cap {
            collected.truncate(cap);
        }
        collected.sort_by(|a, b| {
            let fa = a.contexts[0].file;
            let fb = b.contexts[0].file;
            let sa = self.corpus.file(fa).score;
            let sb = self.corpus.file(fb).score;
            sb.cmp(&sa).then_with(|| self.corpus.file_path(fa).cmp(&self.corpus.file_path(fb)))
        });
        let sort_time_ms = sort_start.elapsed().as_millis() as u64;

        Ok(SearchOutcome {
            results: collected,
            stats: SearchStats {
                re2_time_ms: re2_time_us.load(Ordering::Relaxed) / 1000,
                sort_time_ms,
                index_time_ms: index_time_us.load(Ordering::Relaxed) / 1000,
                analyze_time_ms,
                exit_reason: ExitReason::from_u8(exit_reason.load(Ordering::Relaxed)),
            },
        })
    }

    /// Lazily samples up to 1000 files and evaluates `query`'s file/tree
    /// predicate against each, memoizing the acceptance fraction for the
    /// remainder of this query (spec.md §5's single shared lazy computation).
    fn files_density(&self, query: &Query) -> f64 {
        let mut cache = self.density_cache.lock().unwrap();
        if let Some(d) = *cache {
            return d;
        }
        let total = self.corpus.files.len();
        if total == 0 {
            *cache = Some(1.0);
            return 1.0;
        }
        let sample_size = total.min(1000);
        let mut rng = rand::thread_rng();
        let sample = rand::seq::index::sample(&mut rng, total, sample_size);

        let file_re = query.file.as_ref().and_then(|f| CompiledFilter::compile(f).ok());
        let tree_re = query.tree.as_ref().and_then(|f| CompiledFilter::compile(f).ok());

        let mut accepted = 0usize;
        for i in sample.iter() {
            let id = cs_core::FileId::from(i);
            let mut ok = true;
            if let Some(f) = &file_re {
                ok &= f.accepts(&self.corpus.file_path(id));
            }
            if let Some(t) = &tree_re {
                ok &= t.accepts(self.corpus.repo_name(id));
            }
            if ok {
                accepted += 1;
            }
        }
        let density = accepted as f64 / sample_size as f64;
        *cache = Some(density);
        density
    }
}

/// Cheap per-chunk short-circuit: if a non-negated tree predicate is present
/// and none of this chunk's repos match it, no chunk-file record here can
/// ever pass, so the whole chunk is skippable without touching its suffix
/// array or data. Negated predicates can't use this shortcut (a repo *not*
/// matching the pattern could still be present), so they fall through to
/// per-file filtering in the resolver.
fn chunk_may_satisfy_tree(corpus: &Corpus, chunk: &Chunk, tree_filter: &Option<CompiledFilter>) -> bool {
    let Some(f) = tree_filter else { return true };
    if f.negate {
        return true;
    }
    chunk.tree_names.iter().any(|&r| f.accepts(&corpus.repo(r).name))
}

struct SearchChunkArgs<'a> {
    corpus: &'a Corpus,
    chunk: &'a Chunk,
    key: &'a Option<Arc<FrozenKey>>,
    regex: &'a regex::bytes::Regex,
    config: &'a Config,
    query: &'a Query,
    file_filter: &'a Option<CompiledFilter>,
    tree_filter: &'a Option<CompiledFilter>,
    use_full_for_predicate: bool,
    exit_reason: &'a AtomicU8,
    matches_count: &'a AtomicI64,
    re2_time_us: &'a AtomicU64,
    index_time_us: &'a AtomicU64,
    deadline: Instant,
    res_tx: &'a crossbeam_channel::Sender<MatchResult>,
}

fn search_chunk(args: SearchChunkArgs) {
    let SearchChunkArgs {
        corpus,
        chunk,
        key,
        regex,
        config,
        query,
        file_filter,
        tree_filter,
        use_full_for_predicate,
        exit_reason,
        matches_count,
        re2_time_us,
        index_time_us,
        deadline,
        res_tx,
    } = args;

    let ranges: Vec<LineRange> = if config.index_enabled && key.is_some() && !use_full_for_predicate {
        let index_start = Instant::now();
        let widened = filtered_candidates(chunk, key.as_ref().unwrap(), config.min_filter_ratio)
            .map(|cands| widen_to_line_ranges(chunk, cands, config.min_skip));
        index_time_us.fetch_add(index_start.elapsed().as_micros() as u64, Ordering::Relaxed);
        match widened {
            Some(r) => r,
            None => {
                tracing::debug!(chunk = chunk.id.0, "filtered search bailed out, falling back to full scan");
                vec![LineRange { start: 0, end: chunk.size() as u32 }]
            }
        }
    } else {
        vec![LineRange { start: 0, end: chunk.size() as u32 }]
    };

    let mut iterations: u64 = 0;
    'ranges: for range in ranges {
        let scan_start = Instant::now();
        let matches = full_search(chunk, range.start..range.end, regex, config.max_scan);
        re2_time_us.fetch_add(scan_start.elapsed().as_micros() as u64, Ordering::Relaxed);

        for m in matches {
            iterations += 1;
            if iterations % DEADLINE_CHECK_STRIDE == 0 {
                if Instant::now() >= deadline {
                    try_set_exit_reason(exit_reason, ExitReason::Timeout);
                }
            }
            if exit_reason.load(Ordering::Acquire) != ExitReason::None as u8 {
                break 'ranges;
            }

            let line_start = chunk.line_start(m.start as usize) as u32;
            let line_end = chunk.line_end(m.start as usize) as u32;
            let contexts: Vec<MatchContext> =
                resolve_line(corpus, chunk, line_start, line_end, file_filter, tree_filter);
            if contexts.is_empty() {
                continue;
            }

            if matches_count.load(Ordering::Acquire) >= query.max_matches as i64 {
                try_set_exit_reason(exit_reason, ExitReason::MatchLimit);
                break 'ranges;
            }

            let result = MatchResult {
                contexts: contexts.clone(),
                line: cs_core::query::LineRef { chunk: chunk.id, offset: line_start, len: line_end - line_start },
                match_left: m.start - line_start,
                match_right: m.end - line_start,
            };
            let new_count = matches_count.fetch_add(contexts.len() as i64, Ordering::AcqRel) + contexts.len() as i64;
            let _ = res_tx.send(result);
            if new_count >= query.max_matches as i64 {
                try_set_exit_reason(exit_reason, ExitReason::MatchLimit);
                break 'ranges;
            }
        }
    }
}

fn try_set_exit_reason(exit_reason: &AtomicU8, reason: ExitReason) {
    let _ = exit_reason.compare_exchange(
        ExitReason::None as u8,
        reason as u8,
        Ordering::AcqRel,
        Ordering::Relaxed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_core::model::{Repo, Tree};
    use cs_index::CorpusBuilder;

    fn build_corpus() -> Corpus {
        let mut b = CorpusBuilder::new(Config::default());
        let repo = b.add_repo(Repo { name: "repo".into(), metadata: Default::default() });
        let tree = b.add_tree(Tree { repo, revision: "HEAD".into() });
        b.index_file(tree, "a.txt", b"hello world\nfoo bar\n", 0).unwrap();
        b.index_file(tree, "b.txt", b"goodbye\nhello again\n", 0).unwrap();
        b.finalize()
    }

    #[test]
    fn finds_matches_across_files() {
        let corpus = build_corpus();
        let config = Config::default();
        let driver = SearchDriver::new(&corpus, &config);
        let outcome = driver.run(&Query::new("hello")).unwrap();
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.stats.exit_reason, ExitReason::None);
    }

    #[test]
    fn zero_matches_is_a_clean_empty_result() {
        let corpus = build_corpus();
        let config = Config::default();
        let driver = SearchDriver::new(&corpus, &config);
        let outcome = driver.run(&Query::new("nonexistent_pattern_xyz")).unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.stats.exit_reason, ExitReason::None);
    }

    #[test]
    fn match_limit_is_honored() {
        let mut b = CorpusBuilder::new(Config::default());
        let repo = b.add_repo(Repo { name: "r".into(), metadata: Default::default() });
        let tree = b.add_tree(Tree { repo, revision: "HEAD".into() });
        for i in 0..20 {
            b.index_file(tree, &format!("f{i}.txt"), format!("needle {i}\n").as_bytes(), 0).unwrap();
        }
        let corpus = b.finalize();
        let config = Config::default();
        let driver = SearchDriver::new(&corpus, &config);
        let mut query = Query::new("needle");
        query.max_matches = 5;
        let outcome = driver.run(&query).unwrap();
        assert!(outcome.results.len() <= 5);
        assert_eq!(outcome.stats.exit_reason, ExitReason::MatchLimit);
    }

    #[test]
    fn file_filter_restricts_results() {
        let corpus = build_corpus();
        let config = Config::default();
        let driver = SearchDriver::new(&corpus, &config);
        let mut query = Query::new("hello");
        query.file = Some(cs_core::query::PatternFilter { pattern: "a\\.txt$".into(), negate: false });
        let outcome = driver.run(&query).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(corpus.file_path(outcome.results[0].contexts[0].file), "repo/a.txt");
    }

    #[test]
    fn malformed_regex_is_rejected_as_invalid_argument() {
        let corpus = build_corpus();
        let config = Config::default();
        let driver = SearchDriver::new(&corpus, &config);
        let err = driver.run(&Query::new("(unterminated")).unwrap_err();
        assert!(!err.is_retryable());
    }
}
