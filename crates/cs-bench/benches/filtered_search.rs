use criterion::{criterion_group, criterion_main, Criterion};
use cs_bench::fixture::build_synthetic_corpus;
use cs_core::query::Query;
use cs_core::Config;
use cs_search::SearchDriver;

fn bench_filtered_search(c: &mut Criterion) {
    let config = Config::default();
    let corpus = build_synthetic_corpus(config.clone(), 5000);
    let driver = SearchDriver::new(&corpus, &config);

    let mut group = c.benchmark_group("filtered_search");
    group.bench_function("selective_literal", |b| {
        b.iter(|| driver.run(&Query::new("MAGIC_4321")).unwrap());
    });
    group.bench_function("unselective_common_word", |b| {
        b.iter(|| driver.run(&Query::new("Response")).unwrap());
    });
    group.bench_function("file_filtered", |b| {
        b.iter(|| {
            let mut q = Query::new("handler_[0-9]+");
            q.file = Some(cs_core::query::PatternFilter { pattern: "module_00[0-4][0-9]/".into(), negate: false });
            driver.run(&q).unwrap()
        });
    });
    group.finish();
}

criterion_group!(benches, bench_filtered_search);
criterion_main!(benches);
