//! Benchmarks for dependency closure computation.
//!
//! Run with: cargo bench -p trellis-core -- closure

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use trellis_core::graph::NotificationCache;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Property names live for the whole process, as declared names do.
fn names(count: usize) -> Vec<&'static str> {
    (0..count)
        .map(|i| &*Box::leak(format!("Prop{i}").into_boxed_str()))
        .collect()
}

/// A chain `P0 -> P1 -> ... -> Pn` closed back onto `P0`, plus a fan of
/// shortcuts every fourth node so the traversal sees revisits.
fn cyclic_chain(names: &[&'static str]) -> NotificationCache {
    let cache = NotificationCache::new();
    for pair in names.windows(2) {
        cache.add_edge(pair[0], pair[1]).unwrap();
    }
    if let (Some(&first), Some(&last)) = (names.first(), names.last()) {
        cache.add_edge(last, first).unwrap();
    }
    for i in (0..names.len()).step_by(4) {
        let target = names[(i + 2) % names.len()];
        if target != names[i] {
            cache.add_edge(names[i], target).unwrap();
        }
    }
    cache
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_cold_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("closure/cold");

    for count in [8, 64, 512] {
        let names = names(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &names, |b, names| {
            b.iter_batched(
                || cyclic_chain(names),
                |cache| black_box(cache.transitive_targets(names[0])),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_memoized_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("closure/memoized");

    for count in [8, 64, 512] {
        let names = names(count);
        let cache = cyclic_chain(&names);
        cache.transitive_targets(names[0]);

        group.bench_with_input(BenchmarkId::from_parameter(count), &names, |b, names| {
            b.iter(|| black_box(cache.transitive_targets(black_box(names[0]))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cold_closure, bench_memoized_closure);
criterion_main!(benches);
