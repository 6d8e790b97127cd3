// benches/bench_phase_channel.rs
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::thread;
use traffic_admission::{Phase, PhaseChannel};

fn bench_send_receive(c: &mut Criterion) {
    let mut group = c.benchmark_group("phase_channel");

    group.bench_function("send_then_receive", |b| {
        let channel = PhaseChannel::new();
        b.iter(|| {
            channel.send(Phase::Green);
            black_box(channel.receive().unwrap());
        });
    });

    for &batch in [100usize, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("cross_thread", batch), &batch, |b, &batch| {
            b.iter(|| {
                let channel = Arc::new(PhaseChannel::new());
                let consumer = {
                    let channel = Arc::clone(&channel);
                    thread::spawn(move || {
                        for _ in 0..batch {
                            black_box(channel.receive().unwrap());
                        }
                    })
                };
                let mut phase = Phase::Red;
                for _ in 0..batch {
                    phase = phase.toggled();
                    channel.send(phase);
                }
                consumer.join().unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_send_receive);
criterion_main!(benches);
