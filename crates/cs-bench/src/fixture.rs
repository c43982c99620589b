//! Synthetic corpora for benchmarks and end-to-end tests: a mix of shared
//! boilerplate lines (to exercise the line deduper and chunk-file merging)
//! and unique per-file content (to exercise the suffix array and planner
//! on realistic selectivity).

use cs_core::model::{Repo, Tree};
use cs_core::Config;
use cs_index::{CorpusBuilder, IndexOutcome};

const SHARED_LINES: &[&str] = &[
    "// Copyright 2024 Example Corp. All rights reserved.\n",
    "use std::collections::HashMap;\n",
    "import (\n",
    "\tlicense \"apache-2.0\"\n",
    ")\n",
];

fn synthetic_file_body(index: usize) -> String {
    let mut body = String::new();
    for line in SHARED_LINES {
        body.push_str(line);
    }
    body.push_str(&format!("fn handler_{index}(req: Request) -> Response {{\n"));
    for j in 0..20 {
        body.push_str(&format!("    let step_{j} = process_{j}(req.field_{j});\n"));
    }
    body.push_str(&format!("    Response::new(step_{})\n}}\n", 19));
    body.push_str(&format!("const MAGIC_{index}: u32 = {index};\n"));
    body
}

/// Builds and finalizes a corpus of `num_files` synthetic source files
/// under one repo/tree, using `config`.
pub fn build_synthetic_corpus(config: Config, num_files: usize) -> cs_index::Corpus {
    let mut builder = CorpusBuilder::new(config);
    let repo = builder.add_repo(Repo { name: "bench-repo".into(), metadata: Default::default() });
    let tree = builder.add_tree(Tree { repo, revision: "HEAD".into() });

    for i in 0..num_files {
        let path = format!("src/module_{:04}/handler.rs", i);
        let body = synthetic_file_body(i);
        let outcome = builder.index_file(tree, &path, body.as_bytes(), (num_files - i) as i32).unwrap();
        debug_assert!(matches!(outcome, IndexOutcome::Indexed(_)));
    }

    builder.finalize()
}
