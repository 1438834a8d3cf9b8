//! Throughput benchmark for `SimWorld::step` at a representative population.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use frontier_core::ids::{Owner, UnitClass};
use frontier_core::{world, Position, SimConfig, SimWorld};

fn build_populated_world(agents_per_team: i32) -> SimWorld {
    let mut config = SimConfig::default();
    config.map_width = 80;
    config.map_height = 80;
    config.max_steps = u64::MAX;
    config.seed = 42;
    let mut sim = SimWorld::with_config(config);

    for team in 0..2u8 {
        for i in 0..agents_per_team {
            let x = 4 + (i % 40) + team as i32 * 30;
            let y = 4 + (i / 40);
            let _ = world::create_agent(sim.world_mut(), Position::new(x, y), Owner::team(team), UnitClass::Villager, 25, None);
        }
    }
    sim
}

fn step_benchmark(c: &mut Criterion) {
    let mut sim = build_populated_world(200);
    let action_buffer = vec![0u8; 1024];

    c.bench_function("step_400_agents", |b| {
        b.iter(|| {
            sim.step(black_box(&action_buffer)).unwrap();
        })
    });
}

criterion_group!(benches, step_benchmark);
criterion_main!(benches);
