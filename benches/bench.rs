use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use elastichash::ElasticMap;
use std::collections::HashMap as StdHashMap;

static SIZE: usize = 100_000;
/// Twice the key count, so the fixed-capacity map runs near half load.
static CAPACITY: usize = 200_000;
/// Small enough that every key can reach a couple of groups before the
/// probe bound cuts the search off.
const DELTA: f64 = 0.01;

// A random key iterator.
// Copied from rust-lang/hashbrown
#[derive(Clone, Copy)]
struct RandomKeys {
    state: usize,
}

impl RandomKeys {
    fn new() -> Self {
        RandomKeys { state: 0 }
    }
}

impl Iterator for RandomKeys {
    type Item = usize;
    fn next(&mut self) -> Option<usize> {
        // Add 1 then multiply by some 32 bit prime.
        self.state = self.state.wrapping_add(1).wrapping_mul(3_787_392_781);
        Some(self.state)
    }
}

fn new_elastic() -> ElasticMap<usize, usize> {
    ElasticMap::with_capacity_and_delta(CAPACITY, DELTA).unwrap()
}

pub fn new(c: &mut Criterion) {
    let mut group = c.benchmark_group("new");
    for size in [64, SIZE] {
        group.bench_function(BenchmarkId::new("std", size), |b| {
            b.iter(|| {
                let _ = black_box(StdHashMap::<usize, usize>::with_capacity(size));
            })
        });
        group.bench_function(BenchmarkId::new("elastic", size), |b| {
            b.iter(|| {
                let _ = black_box(ElasticMap::<usize, usize>::with_capacity(size).unwrap());
            })
        });
    }
    group.finish();
}

pub fn insert_reserved(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_reserved_random");
    let seq = RandomKeys::new();

    group.bench_function(BenchmarkId::new("std", SIZE), |b| {
        b.iter_batched_ref(
            || StdHashMap::with_capacity(CAPACITY),
            |map| {
                for i in seq.take(SIZE) {
                    black_box(map.insert(i, i));
                }
            },
            BatchSize::PerIteration,
        )
    });
    group.bench_function(BenchmarkId::new("elastic", SIZE), |b| {
        b.iter_batched_ref(
            new_elastic,
            |map| {
                for i in seq.take(SIZE) {
                    black_box(map.insert(i, i));
                }
            },
            BatchSize::PerIteration,
        )
    });
    group.finish();
}

pub fn lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    let seq = RandomKeys::new();

    let mut std_map = StdHashMap::with_capacity(CAPACITY);
    let mut elastic_map = new_elastic();
    for i in seq.take(SIZE) {
        std_map.insert(i, i);
        elastic_map.insert(i, i);
    }

    group.bench_function(BenchmarkId::new("std", SIZE), |b| {
        b.iter(|| {
            for i in seq.take(SIZE) {
                black_box(std_map.get(&i));
            }
        })
    });
    group.bench_function(BenchmarkId::new("elastic", SIZE), |b| {
        b.iter(|| {
            for i in seq.take(SIZE) {
                black_box(elastic_map.get(&i));
            }
        })
    });
    group.finish();
}

pub fn lookup_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_miss");
    let mut seq = RandomKeys::new();

    let mut std_map = StdHashMap::with_capacity(CAPACITY);
    let mut elastic_map = new_elastic();
    for i in (&mut seq).take(SIZE) {
        std_map.insert(i, i);
        elastic_map.insert(i, i);
    }

    let misses: Vec<_> = (&mut seq).take(SIZE).collect();

    group.bench_function(BenchmarkId::new("std", SIZE), |b| {
        b.iter(|| {
            for i in &misses {
                black_box(std_map.get(i));
            }
        })
    });
    group.bench_function(BenchmarkId::new("elastic", SIZE), |b| {
        b.iter(|| {
            for i in &misses {
                black_box(elastic_map.get(i));
            }
        })
    });
    group.finish();
}

pub fn lookup_string(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_string");
    let seq = RandomKeys::new();
    let keys = seq.take(SIZE).map(|i| i.to_string()).collect::<Vec<_>>();

    let mut std_map = StdHashMap::with_capacity(CAPACITY);
    let mut elastic_map: ElasticMap<String, usize> =
        ElasticMap::with_capacity_and_delta(CAPACITY, DELTA).unwrap();
    for k in &keys {
        std_map.insert(k.clone(), k.len());
        elastic_map.insert(k.clone(), k.len());
    }

    group.bench_function(BenchmarkId::new("std", SIZE), |b| {
        b.iter(|| {
            for k in &keys {
                black_box(std_map.get(k));
            }
        })
    });
    group.bench_function(BenchmarkId::new("elastic", SIZE), |b| {
        b.iter(|| {
            for k in &keys {
                black_box(elastic_map.get(k));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, new, insert_reserved, lookup, lookup_miss, lookup_string);
criterion_main!(benches);
