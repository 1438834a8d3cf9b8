//! Integration coverage for the testable properties spec §8 names: bit-exact
//! determinism across independent runs, spatial-index/component consistency,
//! the population cap invariant, and the tint-field strength clamp.

use frontier_core::ids::{Owner, UnitClass};
use frontier_core::{config::constants, world, Position, SimConfig, SimWorld};

fn two_team_world(seed: u64) -> SimWorld {
    let mut config = SimConfig::default();
    config.map_width = 30;
    config.map_height = 30;
    config.max_steps = 200;
    config.seed = seed;
    let mut sim = SimWorld::with_config(config);

    for i in 0..6 {
        world::create_agent(sim.world_mut(), Position::new(3 + i, 3), Owner::team(0), UnitClass::Villager, 25, None).unwrap();
        world::create_agent(sim.world_mut(), Position::new(20 - i, 20), Owner::team(1), UnitClass::Archer, 30, None).unwrap();
    }
    sim
}

/// Same config, seed, and action stream must produce identical tick,
/// winner, and per-agent reward/observation state across two independent
/// `SimWorld` instances (spec §8 determinism property).
#[test]
fn identical_seed_and_actions_produce_identical_outcomes() {
    let action_stream: Vec<Vec<u8>> = (0..40)
        .map(|step| vec![frontier_core::action::encode((step % 3) as u8, 1); 12])
        .collect();

    let mut a = two_team_world(123);
    let mut b = two_team_world(123);

    for actions in &action_stream {
        a.step(actions).unwrap();
        b.step(actions).unwrap();
    }

    assert_eq!(a.tick(), b.tick());
    assert_eq!(a.winner(), b.winner());
    assert_eq!(a.territory_scores(), b.territory_scores());

    let entities_a: Vec<_> = a.world().iter_entities().map(|e| e.id()).collect();
    let entities_b: Vec<_> = b.world().iter_entities().map(|e| e.id()).collect();
    assert_eq!(entities_a.len(), entities_b.len());

    for (ea, eb) in entities_a.iter().zip(entities_b.iter()) {
        let pos_a = a.world().get::<frontier_core::Position>(*ea);
        let pos_b = b.world().get::<frontier_core::Position>(*eb);
        assert_eq!(pos_a, pos_b, "identical seed/action runs diverged in position");
        let hp_a = a.world().get::<frontier_core::Health>(*ea).map(|h| h.current);
        let hp_b = b.world().get::<frontier_core::Health>(*eb).map(|h| h.current);
        assert_eq!(hp_a, hp_b, "identical seed/action runs diverged in health");
    }
}

/// A different seed with the same action stream is not required to diverge,
/// but spawning from two different seeds and confirming the engine runs to
/// completion without panicking guards against seed-independent panics.
#[test]
fn different_seeds_both_run_to_completion_without_panicking() {
    let mut a = two_team_world(1);
    let mut b = two_team_world(2);
    for _ in 0..25 {
        a.step(&[]).unwrap();
        b.step(&[]).unwrap();
    }
    assert_eq!(a.tick(), 25);
    assert_eq!(b.tick(), 25);
}

/// Every live, positioned entity's spatial-index cell entry must agree with
/// its actual `Position` component after a run with movement (spec §8
/// spatial-index consistency property).
#[test]
fn spatial_index_stays_consistent_with_positions_after_moves() {
    let mut sim = two_team_world(7);
    for step in 0..15 {
        let actions = vec![frontier_core::action::encode(1, (step % 8) as u8); 12];
        sim.step(&actions).unwrap();
    }

    let world = sim.world();
    let index = world.resource::<frontier_core::SpatialIndex>();
    let mut query = world.query::<(bevy_ecs::prelude::Entity, &frontier_core::Position, &frontier_core::Dead)>();
    for (entity, pos, dead) in query.iter(world) {
        if dead.0 {
            continue;
        }
        let nearest = index.nearest(*pos, frontier_core::EntityKind::Agent, 0);
        if let Some(entry) = nearest {
            if entry.entity == entity {
                assert_eq!(entry.pos, *pos);
            }
        }
    }
}

/// `pop_count` must never exceed `pop_cap` for any team (spec §8 population
/// cap invariant). Respawn and production gate on the cap; direct
/// `create_agent` calls used to seed a scenario do not, so the cap is set
/// to cover the seeded population before stepping.
#[test]
fn population_never_exceeds_its_cap() {
    let mut sim = two_team_world(9);
    {
        let mut teams = sim.world_mut().resource_mut::<frontier_core::team::Teams>();
        teams.get_mut(0).pop_cap = 6;
        teams.get_mut(1).pop_cap = 6;
    }
    for _ in 0..30 {
        sim.step(&[]).unwrap();
    }
    let teams = sim.world().resource::<frontier_core::team::Teams>();
    for team in teams.0.iter() {
        assert!(team.pop_count <= team.pop_cap, "pop_count {} exceeded pop_cap {}", team.pop_count, team.pop_cap);
    }
}

/// Trail and tumor tint strengths are clamped to `[0, StrengthCap]`
/// (spec §8 tint clamp property), checked after enough agent movement to
/// drive the field well past its saturation point.
#[test]
fn tint_strengths_stay_within_clamp_bounds() {
    let mut sim = two_team_world(11);
    for step in 0..50 {
        let actions = vec![frontier_core::action::encode(1, (step % 8) as u8); 12];
        sim.step(&actions).unwrap();
    }
    let field = sim.world().resource::<frontier_core::tint::TintField>();
    for y in 0..30 {
        for x in 0..30 {
            let pos = Position::new(x, y);
            let trail = field.trail_strength_at(pos);
            let tumor = field.tumor_strength_at(pos);
            assert!((0.0..=constants::STRENGTH_CAP).contains(&trail), "trail strength {trail} out of bounds at {pos:?}");
            assert!((0.0..=constants::STRENGTH_CAP).contains(&tumor), "tumor strength {tumor} out of bounds at {pos:?}");
        }
    }
}
