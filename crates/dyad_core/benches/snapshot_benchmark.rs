//! # Snapshot & Gate Benchmark
//!
//! Measures the two hot-ish handshake paths:
//! 1. Property snapshot publish + pull (whole-block copy under the spin lock)
//! 2. `block_until_ready` on an already open gate (must be a single load)

#![allow(dead_code)]
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dyad_core::{property_snapshot, BoundedCounter, InitGate};

#[derive(Clone, Default)]
struct WindowBlock {
    size: [u32; 2],
    position: [i32; 2],
    scale: f32,
    flags: u32,
}

fn bench_snapshot(c: &mut Criterion) {
    let (publisher, mut view) = property_snapshot(WindowBlock::default());
    let block = WindowBlock {
        size: [1920, 1080],
        position: [10, 20],
        scale: 1.5,
        flags: 3,
    };

    c.bench_function("snapshot_publish_pull", |b| {
        b.iter(|| {
            publisher.publish(black_box(&block));
            black_box(view.pull());
        });
    });
}

fn bench_open_gate(c: &mut Criterion) {
    let gate = InitGate::ready();
    c.bench_function("gate_block_until_ready_open", |b| {
        b.iter(|| black_box(&gate).block_until_ready());
    });
}

fn bench_bounded_ids(c: &mut Criterion) {
    c.bench_function("bounded_counter_allocate", |b| {
        b.iter_batched(
            || BoundedCounter::new("bench", 32),
            |counter| {
                for _ in 0..1024 {
                    black_box(counter.allocate().ok());
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_snapshot, bench_open_gate, bench_bounded_ids);
criterion_main!(benches);
