//! Benchmarks for cost-aware path search
//!
//! Measures:
//! - corner-to-corner search on square grids of growing size
//! - the same search weighted by a knowledge base

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vanet_consensus::{CostKnowledgeBase, KnowledgeConfig};
use vanet_routing::CostAwarePathSearch;
use vanet_topology::{NodeId, SegmentId, StaticRoadGraph};

const STEP: f64 = 0.001;

/// `n x n` grid of two-node segments.
fn grid(n: i64) -> StaticRoadGraph {
    let id = |row: i64, col: i64| row * n + col;
    let mut builder = StaticRoadGraph::builder();
    for row in 0..n {
        for col in 0..n {
            builder = builder.node(id(row, col), row as f64 * STEP, col as f64 * STEP);
        }
    }
    let mut seg = 0;
    for row in 0..n {
        for col in 0..n {
            if col + 1 < n {
                builder = builder.segment(seg, &[id(row, col), id(row, col + 1)], 14.0);
                seg += 1;
            }
            if row + 1 < n {
                builder = builder.segment(seg, &[id(row, col), id(row + 1, col)], 14.0);
                seg += 1;
            }
        }
    }
    builder.build().expect("grid is well formed")
}

/// Benchmark corner-to-corner search with fixed costs
fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");

    for &n in &[5i64, 10, 20, 40] {
        let graph = grid(n);
        let mut costs: HashMap<SegmentId, f64> = (0..graph.segment_count() as i64)
            .map(|s| (SegmentId(s), 1.0 + (s % 7) as f64))
            .collect();
        let target = NodeId(n * n - 1);

        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            let search = CostAwarePathSearch::new(&graph);
            b.iter(|| search.find_path_between(&mut costs, black_box(NodeId(0)), black_box(target)))
        });
    }
    group.finish();
}

/// Benchmark search weighted by a knowledge base
fn bench_knowledge_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("knowledge_search");

    for &n in &[10i64, 40] {
        let graph = grid(n).into_handle();
        let mut kb = CostKnowledgeBase::new(0, graph.clone(), KnowledgeConfig::default());
        let target = NodeId(n * n - 1);

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            let search = CostAwarePathSearch::new(graph.as_ref());
            b.iter(|| search.find_path_between(&mut kb, black_box(NodeId(0)), black_box(target)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_grid_search, bench_knowledge_search);
criterion_main!(benches);
