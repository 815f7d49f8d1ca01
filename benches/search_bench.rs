//! Benchmarks for index build and per-query search across all variants

use annsearch::{create_algorithm, AlgorithmConfig, AlgorithmKind, Metric, QueryParams, Vector};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn create_random_vectors(n: usize, dim: usize) -> Vec<Vector> {
    (0..n)
        .map(|_| {
            let data: Vec<f32> = (0..dim).map(|_| rand::random::<f32>()).collect();
            Vector::new(data)
        })
        .collect()
}

fn bench_config() -> AlgorithmConfig {
    AlgorithmConfig {
        w: 0.5,
        kproj: 10,
        max_candidates: 500,
        max_probes: 8,
        kclusters: 32,
        nprobe: 4,
        pq_m: 8,
        nbits: 6,
        ..AlgorithmConfig::default()
    }
}

fn benchmark_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    let vectors = create_random_vectors(5000, 32);
    let query = Vector::new(vec![0.5; 32]);
    let params = QueryParams::top_n(10);

    for kind in AlgorithmKind::ALL {
        let mut index = create_algorithm(kind, &bench_config());
        index.build_index(&vectors, Metric::L2).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, _| {
            b.iter(|| index.search(black_box(&query), black_box(&params), 0));
        });
    }

    group.finish();
}

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(10);
    let vectors = create_random_vectors(2000, 32);

    for kind in AlgorithmKind::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
            b.iter(|| {
                let mut index = create_algorithm(kind, &bench_config());
                index.build_index(black_box(&vectors), Metric::L2).unwrap();
                index
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_search, benchmark_build);
criterion_main!(benches);
