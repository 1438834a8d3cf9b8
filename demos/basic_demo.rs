//! Minimal two-team skirmish demo.
//!
//! Run with: cargo run --example basic_demo

use frontier_core::{action, ids::Owner, ids::UnitClass, SimConfig, SimWorld};

fn main() {
    tracing_subscriber::fmt::init();

    let mut config = SimConfig::default();
    config.map_width = 40;
    config.map_height = 40;
    config.max_steps = 50;
    config.seed = 7;
    let mut sim = SimWorld::with_config(config);

    let mut agents = Vec::new();
    for i in 0..4 {
        let team0 = frontier_core::world::create_agent(
            sim.world_mut(),
            frontier_core::Position::new(5 + i, 5),
            Owner::team(0),
            UnitClass::Villager,
            25,
            None,
        )
        .unwrap();
        let team1 = frontier_core::world::create_agent(
            sim.world_mut(),
            frontier_core::Position::new(30 - i, 30),
            Owner::team(1),
            UnitClass::Villager,
            25,
            None,
        )
        .unwrap();
        agents.push(team0);
        agents.push(team1);
    }

    println!("=== frontier_core basic skirmish demo ===\n");
    println!("spawned {} agents across 2 teams", agents.len());

    for step in 0..20 {
        let actions: Vec<u8> = vec![action::encode(1, 0); sim.world().entities().len() as usize];
        sim.step(&actions).expect("step failed");

        if (step + 1) % 5 == 0 {
            println!("tick {}: territory scores = {:?}", sim.tick(), sim.territory_scores());
        }
    }

    if let Some(winner) = sim.winner() {
        println!("\nepisode ended early: {winner:?}");
    } else {
        println!("\nran {} ticks without a winner", sim.tick());
    }
}
