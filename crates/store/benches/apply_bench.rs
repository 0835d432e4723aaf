//! Benchmarks for batch application and sampling.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use driftkv_common::{Patch, Write};
use driftkv_store::LwwStore;

fn make_batch(size: usize, ts_base: u64) -> Vec<Write> {
    (0..size)
        .map(|i| Write::from(Patch::new(format!("key_{:04}", i % 1000), "value", ts_base + i as u64)))
        .collect()
}

fn bench_apply_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_batch");

    for size in [1, 16, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let store = LwwStore::new("bench");
            let mut round = 0u64;
            b.iter(|| {
                store.apply(make_batch(size, round * size as u64));
                round += 1;
            });
        });
    }
    group.finish();
}

fn bench_apply_stale(c: &mut Criterion) {
    let store = LwwStore::new("bench");
    store.apply(make_batch(1000, 1_000_000));

    c.bench_function("apply_stale", |b| {
        b.iter(|| black_box(store.apply(make_batch(16, 0))));
    });
}

fn bench_sample(c: &mut Criterion) {
    let store = LwwStore::new("bench");
    store.apply(make_batch(1000, 0));

    c.bench_function("sample_5_of_1000", |b| {
        b.iter(|| black_box(store.sample(5, |_, k| (0..k).map(|i| i * 97).collect())));
    });
}

criterion_group!(benches, bench_apply_batch, bench_apply_stale, bench_sample);
criterion_main!(benches);
