//! `cssearch` — loads an index built by `csbuild` and runs one query
//! against it, printing matches and terminal `SearchStats`. Corresponds to
//! spec.md §6's query interface (`line/file/repo/tags/not_*/fold_case/
//! max_matches/filename_only`).

use clap::Parser;
use cs_core::query::{PatternFilter, Query};
use cs_index::format;
use cs_search::SearchDriver;
use std::path::PathBuf;
use std::process::ExitCode;

/// Run a regex query against a prebuilt code search index.
#[derive(Parser)]
#[command(name = "cssearch", version, about)]
struct Args {
    /// Path to an index file written by `csbuild`.
    #[arg(long)]
    index: PathBuf,

    /// Required line-matching regex.
    line: String,

    /// Restrict to files whose `repo/path` matches this regex.
    #[arg(long)]
    file: Option<String>,
    /// Exclude files whose `repo/path` matches this regex.
    #[arg(long)]
    not_file: Option<String>,

    /// Restrict to repos whose name matches this regex.
    #[arg(long)]
    repo: Option<String>,
    /// Exclude repos whose name matches this regex.
    #[arg(long)]
    not_repo: Option<String>,

    /// Tags filter (accepted for interface parity; tag/ctags search is out
    /// of scope for this core, so this is ignored with a warning).
    #[arg(long)]
    tags: Option<String>,
    #[arg(long)]
    not_tags: Option<String>,

    /// Force case-(in)sensitivity; omit to use the spec's default rule.
    #[arg(long)]
    fold_case: Option<bool>,

    #[arg(long, default_value_t = 50)]
    max_matches: i32,

    #[arg(long, default_value_t = false)]
    filename_only: bool,

    /// Optional JSON config file overriding `Config::default()` fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print results as JSON instead of livegrep's `path:lno: text` format.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn filter_of(pat: Option<String>, not_pat: Option<String>) -> Option<PatternFilter> {
    match (pat, not_pat) {
        (Some(p), _) => Some(PatternFilter { pattern: p, negate: false }),
        (None, Some(p)) => Some(PatternFilter { pattern: p, negate: true }),
        (None, None) => None,
    }
}

fn line_text(corpus: &cs_index::Corpus, line: &cs_core::query::LineRef) -> String {
    let data = &corpus.chunk(line.chunk).data;
    let bytes = &data[line.offset as usize..(line.offset + line.len) as usize];
    String::from_utf8_lossy(bytes).trim_end_matches('\n').to_string()
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = cs_cli::load_config(args.config.as_deref())?;

    tracing::info!(index = %args.index.display(), "loading index");
    let corpus = format::load(&args.index)?;

    let mut query = Query::new(args.line.clone());
    query.file = filter_of(args.file, args.not_file);
    query.tree = filter_of(args.repo, args.not_repo);
    query.tags = filter_of(args.tags, args.not_tags);
    query.fold_case = args.fold_case;
    query.max_matches = args.max_matches;
    query.filename_only = args.filename_only;

    let driver = SearchDriver::new(&corpus, &config);
    let outcome = driver.run(&query)?;

    if args.json {
        print_json(&corpus, &outcome);
    } else {
        print_text(&corpus, &outcome, args.filename_only);
    }

    tracing::info!(
        matches = outcome.results.len(),
        exit_reason = ?outcome.stats.exit_reason,
        re2_ms = outcome.stats.re2_time_ms,
        index_ms = outcome.stats.index_time_ms,
        "query complete"
    );

    Ok(())
}

fn print_text(corpus: &cs_index::Corpus, outcome: &cs_search::SearchOutcome, filename_only: bool) {
    for result in &outcome.results {
        for ctx in &result.contexts {
            for &f in &ctx.paths {
                let path = corpus.file_path(f);
                if filename_only {
                    println!("{path}");
                } else {
                    println!("{}:{}: {}", path, ctx.lno, line_text(corpus, &result.line));
                }
            }
        }
    }
    eprintln!(
        "{} matches, exit_reason={:?}, re2={}ms index={}ms analyze={}ms sort={}ms",
        outcome.results.len(),
        outcome.stats.exit_reason,
        outcome.stats.re2_time_ms,
        outcome.stats.index_time_ms,
        outcome.stats.analyze_time_ms,
        outcome.stats.sort_time_ms,
    );
}

fn print_json(corpus: &cs_index::Corpus, outcome: &cs_search::SearchOutcome) {
    let results: Vec<serde_json::Value> = outcome
        .results
        .iter()
        .map(|r| {
            let contexts: Vec<serde_json::Value> = r
                .contexts
                .iter()
                .map(|ctx| {
                    serde_json::json!({
                        "paths": ctx.paths.iter().map(|f| corpus.file_path(*f)).collect::<Vec<_>>(),
                        "lno": ctx.lno,
                    })
                })
                .collect();
            serde_json::json!({
                "line": line_text(corpus, &r.line),
                "match_left": r.match_left,
                "match_right": r.match_right,
                "contexts": contexts,
            })
        })
        .collect();
    let out = serde_json::json!({
        "results": results,
        "stats": {
            "re2_time_ms": outcome.stats.re2_time_ms,
            "sort_time_ms": outcome.stats.sort_time_ms,
            "index_time_ms": outcome.stats.index_time_ms,
            "analyze_time_ms": outcome.stats.analyze_time_ms,
            "exit_reason": format!("{:?}", outcome.stats.exit_reason),
        },
    });
    println!("{}", serde_json::to_string_pretty(&out).unwrap());
}

fn main() -> ExitCode {
    cs_cli::init_logging();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "cssearch failed");
            eprintln!("cssearch: {e:#}");
            ExitCode::FAILURE
        }
    }
}
