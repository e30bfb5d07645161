//! Performance benchmarks for geometry-index
//!
//! Run with: cargo bench --package geometry-index

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use geometry_index::{DocumentId, GeometryIndex, IndexConfig};

/// Generate small square polygons spread over a grid
fn generate_squares(count: usize) -> Vec<(DocumentId, String)> {
    let side = (count as f64).sqrt().ceil() as usize;
    (0..count)
        .map(|i| {
            let x = (i % side) as f64 * 10.0 + (i as f64 * 0.37).sin();
            let y = (i / side) as f64 * 10.0 + (i as f64 * 0.53).cos();
            let wkt = format!(
                "POLYGON(({x} {y}, {} {y}, {} {}, {x} {}, {x} {y}))",
                x + 4.0,
                x + 4.0,
                y + 4.0,
                y + 4.0
            );
            (i as DocumentId, wkt)
        })
        .collect()
}

fn build_index(documents: &[(DocumentId, String)]) -> GeometryIndex {
    let mut index = GeometryIndex::new(IndexConfig::default());
    index.index_parallel(documents);
    index
}

// ============================================================================
// Core Benchmarks
// ============================================================================

fn bench_query_performance(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    let documents = generate_squares(50_000);
    let index = build_index(&documents);

    // Small box (a handful of candidates)
    group.bench_function("small_box_50k", |b| {
        b.iter(|| index.query("500,500,530,530", Some("intersects")).unwrap());
    });

    // Large box (thousands of candidates, all refined)
    group.bench_function("large_box_50k", |b| {
        b.iter(|| index.query("0,0,600,600", Some("within")).unwrap());
    });

    group.finish();
}

fn bench_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction");
    group.sample_size(20);

    for count in [1_000usize, 10_000] {
        let documents = generate_squares(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("sequential", count), &documents, |b, docs| {
            b.iter(|| {
                let mut index = GeometryIndex::default();
                for (id, wkt) in docs {
                    index.index(*id, wkt.as_str());
                }
                index
            });
        });

        group.bench_with_input(BenchmarkId::new("parallel", count), &documents, |b, docs| {
            b.iter(|| build_index(docs));
        });
    }

    group.finish();
}

fn bench_reindex(c: &mut Criterion) {
    let mut group = c.benchmark_group("reindex");
    group.sample_size(20);

    let documents = generate_squares(10_000);
    let moved: Vec<(DocumentId, String)> = documents
        .iter()
        .map(|(id, _)| (*id, format!("POINT({} {})", id % 97, id % 89)))
        .collect();

    group.throughput(Throughput::Elements(documents.len() as u64));
    group.bench_function("move_all_10k", |b| {
        b.iter(|| {
            let mut index = build_index(&documents);
            index.index_parallel(&moved);
            index
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_query_performance, bench_construction, bench_reindex);

criterion_main!(benches);
