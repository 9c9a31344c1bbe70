//! Simulation benchmarks for dune_core.
//!
//! Run with: `cargo bench -p dune_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dune_core::config::GameOptions;
use dune_core::scenario::{ScenarioDescription, ScenarioLoader};
use dune_core::simulation::Simulation;

const BENCH_SCENARIO: &str = r#"(
    name: "Bench Flats",
    seed: 1,
    map: [
        "----------------------------------------------------------------",
        "-%%%%%%%%%%------------------------------------------%%%%%%%%%%-",
        "-%%%%%%%%%%------------~~~~~~~~----------------------%%%%%%%%%%-",
        "-%%%%%%%%%%------------~~++++~~----------------------%%%%%%%%%%-",
        "-%%%%%%%%%%------------~~~~~~~~----------------------%%%%%%%%%%-",
        "----------------------------------------------------------------",
        "------------^^^^^^-----------------------^^^^^^-----------------",
        "----------------------------------------------------------------",
    ],
    spice_fields: [(x: 32, y: 6, radius: 5, thick: true)],
    houses: [
        (house: Atreides, credits: 2000, team: Some(1)),
        (house: Ordos, credits: 2000, team: Some(2)),
    ],
    units: [
        (house: Atreides, item: Tank, x: 12, y: 2),
        (house: Atreides, item: Infantry, x: 13, y: 3),
        (house: Atreides, item: Trike, x: 14, y: 4),
        (house: Ordos, item: Quad, x: 50, y: 2),
        (house: Ordos, item: Troopers, x: 49, y: 3),
        (house: Ordos, item: Special, x: 48, y: 4),
    ],
    structures: [
        (house: Atreides, item: ConstructionYard, x: 1, y: 1),
        (house: Atreides, item: WindTrap, x: 3, y: 1),
        (house: Ordos, item: ConstructionYard, x: 54, y: 1),
        (house: Ordos, item: WindTrap, x: 56, y: 1),
    ],
    reinforcements: [(house: Ordos, item: Quad, drop: Homebase, minutes: 1, repeat: true)],
    choam: [(Trike, 5)],
)"#;

fn load() -> Simulation {
    let desc = ScenarioDescription::from_ron_str(BENCH_SCENARIO).expect("bench scenario parses");
    ScenarioLoader::build(&desc, GameOptions::default()).expect("bench scenario loads")
}

/// Runs simulation benchmarks for the dune_core crate.
pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("tick_100", |b| {
        b.iter_batched(
            load,
            |mut sim| {
                for _ in 0..100 {
                    black_box(sim.tick());
                }
                sim
            },
            criterion::BatchSize::SmallInput,
        )
    });

    let mut sim = load();
    for _ in 0..200 {
        sim.tick();
    }
    c.bench_function("save", |b| b.iter(|| black_box(sim.save())));
    let bytes = sim.save();
    c.bench_function("load", |b| b.iter(|| black_box(Simulation::load(&bytes))));
    c.bench_function("state_hash", |b| b.iter(|| black_box(sim.state_hash())));
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
