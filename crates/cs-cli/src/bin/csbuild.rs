//! `csbuild` — walks one or more source trees and dumps a finalized index
//! file. Corresponds to spec.md §6's `codesearch --dump_index FILE
//! config.json` surface.

use clap::Parser;
use cs_core::model::{Repo, Tree};
use cs_index::scan::scan_tree;
use cs_index::{format, CorpusBuilder};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

/// Build a livegrep-style code search index from one or more source trees.
#[derive(Parser)]
#[command(name = "csbuild", version, about)]
struct Args {
    /// Repository name (becomes the `repo/path` prefix in search results).
    #[arg(long)]
    repo: String,

    /// Revision label recorded against this tree (informational only; the
    /// core has no VCS integration).
    #[arg(long, default_value = "HEAD")]
    revision: String,

    /// Directory to walk and index.
    #[arg(long)]
    root: PathBuf,

    /// Output index file path.
    #[arg(short, long)]
    out: PathBuf,

    /// Optional JSON config file overriding `Config::default()` fields.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = cs_cli::load_config(args.config.as_deref())?;

    tracing::info!(root = %args.root.display(), repo = %args.repo, "scanning source tree");
    let files = scan_tree(&args.root);
    tracing::info!(count = files.len(), "scan complete");

    let mut builder = CorpusBuilder::new(config);
    let repo_id = builder.add_repo(Repo { name: args.repo.clone(), metadata: HashMap::new() });
    let tree_id = builder.add_tree(Tree { repo: repo_id, revision: args.revision.clone() });

    let mut indexed = 0usize;
    let mut skipped_binary = 0usize;
    for f in &files {
        match builder.index_file(tree_id, &f.rel_path, &f.bytes, 0)? {
            cs_index::IndexOutcome::Indexed(_) => indexed += 1,
            cs_index::IndexOutcome::SkippedBinary => skipped_binary += 1,
        }
    }
    tracing::info!(indexed, skipped_binary, "indexing complete, finalizing");

    let corpus = builder.finalize();
    let timestamp = std::env::var("CSBUILD_TIMESTAMP")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    format::dump(&args.out, &corpus, timestamp)?;

    tracing::info!(out = %args.out.display(), chunks = corpus.chunks.len(), "index written");
    Ok(())
}

fn main() -> ExitCode {
    cs_cli::init_logging();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "csbuild failed");
            eprintln!("csbuild: {e:#}");
            ExitCode::FAILURE
        }
    }
}
