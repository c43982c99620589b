use criterion::{criterion_group, criterion_main, Criterion};
use cs_bench::fixture::build_synthetic_corpus;
use cs_core::Config;

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    group.sample_size(10);
    group.bench_function("build_2000_files", |b| {
        b.iter(|| {
            let corpus = build_synthetic_corpus(Config::default(), 2000);
            assert_eq!(corpus.files.len(), 2000);
            corpus
        });
    });
    group.finish();
}

criterion_group!(benches, bench_index_build);
criterion_main!(benches);
