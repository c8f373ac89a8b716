//! Benchmarks for pipe execution.

use batchflow::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn pipe_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("drain_1k_items", |b| {
        b.iter(|| {
            rt.block_on(async {
                let items: Vec<u64> = (0..1_000).collect();
                let source = ItemsSource::new(items, 64).unwrap();
                let collector = Arc::new(CollectorSink::new());
                let mut pipe = Pipe::new(source);
                pipe.register_sink(collector.clone());
                let report = pipe.run(&CancellationToken::new()).await.unwrap();
                black_box(report.items_delivered)
            })
        })
    });

    c.bench_function("map_and_aggregate_1k_items", |b| {
        b.iter(|| {
            rt.block_on(async {
                let items: Vec<u64> = (0..1_000).collect();
                let source = ItemsSource::new(items, 64)
                    .unwrap()
                    .map_item(|i| Ok(i % 16));
                let counts = Arc::new(AggregatorSink::new(
                    |bucket: &u64| *bucket,
                    |_| 1_u64,
                    |a, b| a + b,
                ));
                let mut pipe = Pipe::new(source);
                pipe.register_sink(counts.clone());
                pipe.run(&CancellationToken::new()).await.unwrap();
                black_box(counts.len())
            })
        })
    });
}

criterion_group!(benches, pipe_benchmark);
criterion_main!(benches);
