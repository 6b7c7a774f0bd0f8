//! Benchmarks for full evaluation rounds across pool sizes

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parwave::prelude::*;

struct ShardSumKernel {
    shard: Vec<f64>,
}

impl Kernel for ShardSumKernel {
    type Input = Parameters;

    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    fn process(&mut self, input: &Parameters) -> Result<f64> {
        let scale = input.iter().sum::<f64>();
        Ok(self.shard.iter().map(|v| v * scale).sum())
    }
}

fn bench_evaluate_rounds(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_rounds");

    for num_workers in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(1));

        group.bench_with_input(
            BenchmarkId::from_parameter(num_workers),
            num_workers,
            |b, &num_workers| {
                let events: Vec<f64> = (0..10_000).map(|i| i as f64 * 1e-4).collect();
                let chunk = events.len() / num_workers;

                let config = PoolConfig::new().with_workers(num_workers);
                let pool = DuplexPool::start(config, |i| ShardSumKernel {
                    shard: events[i * chunk..(i + 1) * chunk].to_vec(),
                })
                .unwrap();

                b.iter(|| black_box(pool.evaluate(black_box(vec![0.5, 0.5])).unwrap()));

                pool.stop().unwrap();
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate_rounds);
criterion_main!(benches);
