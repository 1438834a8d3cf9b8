//! NPCs: tumor growth/branching, wildlife packs, goblin hives (spec §4.9).

use bevy_ecs::prelude::*;
use rand::Rng;

use crate::components::*;
use crate::config::constants::{TUMOR_BRANCH_CHANCE, TUMOR_BRANCH_MIN_AGE};
use crate::grid::BlockingGrid;
use crate::ids::{EntityKind, Owner, UnitClass};
use crate::rng::{SimRng, Stream};
use crate::spatial::SpatialIndex;

fn first_free_neighbor(blocking: &BlockingGrid, pos: Position) -> Option<Position> {
    for dir in Direction::ALL {
        let (dx, dy) = dir.vector();
        let candidate = pos.offset(dx, dy);
        if !blocking.0.is_occupied(candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Ages every live tumor and rolls branch eligibility (spec §4.9): a tumor
/// old enough and not claimed/inert may spawn a new tumor into an adjacent
/// free tile, after which the parent goes inert. Operates directly on
/// `&mut World`, mirroring the action dispatcher's style, since branching
/// spawns entities mid-pass.
pub fn run_tumor_tick(world: &mut World, step: u64) {
    let seed_rng = world.resource::<SimRng>().stream(step, Stream::TumorBranch);
    let mut rng = seed_rng;

    let mut to_spawn: Vec<Position> = Vec::new();
    let mut to_inert: Vec<Entity> = Vec::new();

    {
        let mut query = world.query::<(Entity, &Position, &mut TumorAge, &Claimed, &Inert)>();
        for (entity, pos, mut age, claimed, inert) in query.iter_mut(world) {
            if inert.0 || claimed.0 {
                continue;
            }
            age.0 += 1;
            if age.0 < TUMOR_BRANCH_MIN_AGE {
                continue;
            }
            if rng.gen::<f32>() >= TUMOR_BRANCH_CHANCE {
                continue;
            }
            let blocking = world.resource::<BlockingGrid>();
            if let Some(free) = first_free_neighbor(blocking, *pos) {
                to_spawn.push(free);
                to_inert.push(entity);
            }
        }
    }

    for entity in to_inert {
        if let Some(mut inert) = world.get_mut::<Inert>(entity) {
            inert.0 = true;
        }
    }

    for pos in to_spawn {
        let tumor = world
            .spawn((
                Position::new(pos.x, pos.y),
                Kind(EntityKind::Tumor),
                Owned(Owner::NEUTRAL),
                TumorAge::default(),
                Claimed::default(),
                Inert::default(),
                Health::new(20),
            ))
            .id();
        world.resource_mut::<BlockingGrid>().0.place(pos, tumor);
        world.resource_mut::<SpatialIndex>().insert(tumor, pos, EntityKind::Tumor, Owner::NEUTRAL);
    }
}

/// Drives wildlife herd/pack movement (spec §4.9): cows drift idly, wolves
/// hunt the nearest agent within detection range as a pack, bears wander
/// solo and retaliate when struck. A lightweight alpha-follows-leader model:
/// the pack alpha picks a direction, followers step toward the alpha.
pub fn run_wildlife_tick(world: &mut World, step: u64) {
    let mut rng = world.resource::<SimRng>().stream(step, Stream::AnimalAi);

    let members: Vec<(Entity, Position, WildlifeSpecies, bool, u32)> = {
        let mut query = world.query::<(Entity, &Position, &WildlifeSpecies, &IsPackAlpha, &PackId)>();
        query
            .iter(world)
            .map(|(e, p, s, alpha, pack)| (e, *p, *s, alpha.0, pack.0))
            .collect()
    };

    for (entity, pos, species, is_alpha, _pack) in members {
        let dest = match species {
            WildlifeSpecies::Cow => wander_step(pos, &mut rng),
            WildlifeSpecies::Wolf => {
                if is_alpha {
                    hunt_step(world, pos).unwrap_or_else(|| wander_step(pos, &mut rng))
                } else {
                    wander_step(pos, &mut rng)
                }
            }
            WildlifeSpecies::Bear => wander_step(pos, &mut rng),
        };

        let blocked = world.resource::<BlockingGrid>().0.is_occupied(dest);
        if blocked {
            continue;
        }
        world.resource_mut::<BlockingGrid>().0.clear_entity(entity);
        world.resource_mut::<BlockingGrid>().0.place(dest, entity);
        if let Some(mut p) = world.get_mut::<Position>(entity) {
            *p = dest;
        }
        world.resource_mut::<SpatialIndex>().insert(entity, dest, EntityKind::Wolf, Owner::NEUTRAL);
    }
}

fn wander_step(pos: Position, rng: &mut impl Rng) -> Position {
    let dir = Direction::ALL[rng.gen_range(0..8)];
    let (dx, dy) = dir.vector();
    pos.offset(dx, dy)
}

fn hunt_step(world: &World, pos: Position) -> Option<Position> {
    let index = world.resource::<SpatialIndex>();
    let target = index.nearest(pos, EntityKind::Agent, 10)?;
    let dx = (target.pos.x - pos.x).signum();
    let dy = (target.pos.y - pos.y).signum();
    Some(pos.offset(dx, dy))
}

/// Goblin hives periodically spawn a goblin into a free adjacent tile
/// (spec §4.9).
pub fn run_goblin_hive_tick(world: &mut World, step: u64) {
    if step % 40 != 0 {
        return;
    }
    let hives: Vec<(Entity, Position)> = {
        let mut query = world.query_filtered::<(Entity, &Position), With<Kind>>();
        query
            .iter(world)
            .filter(|(e, _)| world.get::<Kind>(*e).map(|k| k.0) == Some(EntityKind::GoblinHive))
            .map(|(e, p)| (e, *p))
            .collect()
    };

    for (_hive, pos) in hives {
        let blocking = world.resource::<BlockingGrid>();
        if let Some(free) = first_free_neighbor(blocking, pos) {
            let goblin = world
                .spawn(AgentBundle::new(free, Owner::NEUTRAL, UnitClass::Goblin, 15, None))
                .id();
            world.resource_mut::<BlockingGrid>().0.place(free, goblin);
            world.resource_mut::<SpatialIndex>().insert(goblin, free, EntityKind::Agent, Owner::NEUTRAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tumor_ages_each_tick() {
        let mut world = World::new();
        world.insert_resource(SimRng::new(1));
        world.insert_resource(BlockingGrid::new(20, 20));
        world.insert_resource(SpatialIndex::default());
        let tumor = world
            .spawn((
                Position::new(5, 5),
                Kind(EntityKind::Tumor),
                Owned(Owner::NEUTRAL),
                TumorAge::default(),
                Claimed::default(),
                Inert::default(),
                Health::new(20),
            ))
            .id();
        run_tumor_tick(&mut world, 0);
        assert_eq!(world.get::<TumorAge>(tumor).unwrap().0, 1);
    }

    #[test]
    fn goblin_hive_spawns_on_interval() {
        let mut world = World::new();
        world.insert_resource(BlockingGrid::new(20, 20));
        world.insert_resource(SpatialIndex::default());
        world.spawn((Position::new(5, 5), Kind(EntityKind::GoblinHive), Owned(Owner::NEUTRAL)));
        let before = world.query::<&Kind>().iter(&world).count();
        run_goblin_hive_tick(&mut world, 0);
        let after = world.query::<&Kind>().iter(&world).count();
        assert_eq!(after, before + 1);
    }
}
