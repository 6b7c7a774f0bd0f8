//! Benchmarks for duplex channel throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parwave::channel::{duplex, Backend, ChannelConfig};
use parwave::message::{Envelope, Request};
use std::thread;

fn bench_duplex_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("duplex_round_trip");

    for backend in [Backend::Flume, Backend::Crossbeam] {
        let rounds = 1000;
        group.throughput(Throughput::Elements(rounds as u64));

        group.bench_with_input(
            BenchmarkId::new("backend", format!("{:?}", backend)),
            &backend,
            |b, &backend| {
                b.iter(|| {
                    let config = ChannelConfig::new().with_backend(backend);
                    let (controller, worker) = duplex::<Vec<f64>, f64>(&config);

                    thread::scope(|s| {
                        s.spawn(|| {
                            while let Ok(Request::Payload(p)) = worker.recv() {
                                let sum = p.iter().sum::<f64>();
                                if worker.send(Envelope::new(sum)).is_err() {
                                    break;
                                }
                            }
                        });

                        for _ in 0..rounds {
                            controller.send(black_box(vec![1.0, 2.0, 3.0])).unwrap();
                            black_box(controller.recv().unwrap().payload);
                        }
                        controller.send_die().unwrap();
                    });
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_duplex_round_trip);
criterion_main!(benches);
