//! Tick throughput benchmarks for warden_core.
//!
//! Run with: `cargo bench -p warden_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use warden_core::prelude::*;
use warden_test_utils::fixtures::{fixture_content_with_wave, simulation_with, tile};

/// Simulation with `players` joined and walking, plus a spawned wave.
fn busy_simulation(players: u64) -> Simulation {
    let mut sim = simulation_with(fixture_content_with_wave());
    for conn in 1..=players {
        sim.submit(
            conn,
            0,
            Action::Join {
                name: format!("bench{conn}"),
            },
        );
    }
    sim.tick();
    for conn in 1..=players {
        let offset = i32::try_from(conn).unwrap_or(0);
        sim.submit(
            conn,
            1,
            Action::Move {
                destination: tile(30 - offset, 30),
            },
        );
    }
    for _ in 0..40 {
        sim.tick();
    }
    sim
}

pub fn tick_benchmark(c: &mut Criterion) {
    c.bench_function("idle_tick", |b| {
        b.iter_batched(
            || busy_simulation(0),
            |mut sim| black_box(sim.tick()),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("tick_32_players_with_wave", |b| {
        b.iter_batched(
            || busy_simulation(32),
            |mut sim| black_box(sim.tick()),
            BatchSize::SmallInput,
        );
    });
}

pub fn snapshot_benchmark(c: &mut Criterion) {
    let sim = busy_simulation(32);
    c.bench_function("encode_snapshot", |b| {
        b.iter(|| black_box(sim.encode_snapshot()));
    });
}

criterion_group!(benches, tick_benchmark, snapshot_benchmark);
criterion_main!(benches);
