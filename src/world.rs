//! World-state container contract (spec §4.2): entity creation, the sole
//! move-entity path, destruction, and the position/kind lookups every other
//! module is built on.
//!
//! Grounded in the teacher's `world.rs` `Snapshot` extraction pattern, but
//! the teacher's `Snapshot` is a read-only render export; this module adds
//! the mutating contract the spec requires (`create_entity`/`move_entity`/
//! `destroy_entity`), which the teacher left to ad hoc `world.spawn` call
//! sites.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combat::begin_corpse_timeline;
use crate::components::*;
use crate::error::SimError;
use crate::grid::{BackgroundGrid, BlockingGrid};
use crate::ids::{EntityKind, Owner, StableIdRegistry, UnitClass};
use crate::spatial::SpatialIndex;

/// Reward accrued this step, read and zeroed by the external interface
/// after each `step()` (spec §4.1 step 12, §6).
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Reward(pub f32);

/// Creates a new agent at `pos` owned by `owner`, registering it with the
/// blocking grid, spatial index, and stable-id registry in one call (spec
/// §4.2). Fails with `PositionOccupied` (as `SimError::PreconditionFail`)
/// if the tile is already blocked.
pub fn create_agent(world: &mut World, pos: Position, owner: Owner, class: UnitClass, max_hp: i32, home_altar: Option<Entity>) -> Result<Entity, SimError> {
    if world.resource::<BlockingGrid>().0.is_occupied(pos) {
        return Err(SimError::PreconditionFail("destination tile is occupied".into()));
    }
    let entity = world.spawn(AgentBundle::new(pos, owner, class, max_hp, home_altar)).id();
    let stable = world.resource_mut::<StableIdRegistry>().allocate(entity);
    world.entity_mut(entity).insert((StableIdComp(stable), Reward::default()));
    world.resource_mut::<BlockingGrid>().0.place(pos, entity);
    world.resource_mut::<SpatialIndex>().insert(entity, pos, EntityKind::Agent, owner);
    Ok(entity)
}

/// The sole position-mutation path (spec §4.2: "all position changes MUST
/// go through move-entity; direct field mutation violates the spatial-index
/// invariant"). Updates the blocking grid, spatial index, and per-team fog.
pub fn move_entity(world: &mut World, entity: Entity, to: Position) -> Result<(), SimError> {
    let from = match world.get::<Position>(entity) {
        Some(p) => *p,
        None => return Err(SimError::NotFound("entity has no Position".into())),
    };
    let kind = world.get::<Kind>(entity).map(|k| k.0).unwrap_or(EntityKind::Agent);
    if kind.is_blocking() {
        let mut blocking = world.resource_mut::<BlockingGrid>();
        if blocking.0.is_occupied(to) && blocking.0.get(to) != Some(entity) {
            return Err(SimError::PreconditionFail("PositionOccupied".into()));
        }
        blocking.0.clear(from);
        blocking.0.place(to, entity);
    }

    if let Some(mut pos) = world.get_mut::<Position>(entity) {
        *pos = to;
    }
    let owner = world.get::<Owned>(entity).map(|o| o.0).unwrap_or(Owner::NEUTRAL);
    world.resource_mut::<SpatialIndex>().insert(entity, to, kind, owner);

    if let Some(team_id) = owner.team_id() {
        let terrain = world.resource::<crate::grid::TerrainGrid>();
        if terrain.in_bounds(to.x, to.y) {
            let idx = (to.y * terrain.width + to.x) as usize;
            let mut teams = world.resource_mut::<crate::team::Teams>();
            let fog = &mut teams.get_mut(team_id).fog;
            if idx < fog.len() {
                fog[idx] = true;
            }
        }
    }
    Ok(())
}

/// Unlinks `entity` from every index, drops any relics it was garrisoning,
/// and — for agents — begins the corpse/skeleton decay timeline instead of
/// an immediate despawn (spec §4.2, §4.13).
pub fn destroy_entity(world: &mut World, entity: Entity) {
    world.resource_mut::<BlockingGrid>().0.clear_entity(entity);
    world.resource_mut::<BackgroundGrid>().0.clear_entity(entity);
    world.resource_mut::<SpatialIndex>().remove(entity);

    if let Some(garrison) = world.get::<Garrison>(entity).cloned() {
        for occupant in garrison.occupants {
            world.despawn(occupant);
        }
    }

    if let Some(stable) = world.get::<StableIdComp>(entity).map(|s| s.0) {
        world.resource_mut::<StableIdRegistry>().release(stable);
    }

    let is_agent = world.get::<Kind>(entity).map(|k| k.0) == Some(EntityKind::Agent);
    if is_agent {
        world.entity_mut(entity).insert((Dead(true), begin_corpse_timeline(60), Kind(EntityKind::Corpse)));
    } else {
        world.despawn(entity);
    }
}

/// Resolves the blocking-then-background entity standing at `pos`, if any
/// (spec §4.2 `query-at-position`).
pub fn query_at_position(world: &World, pos: Position) -> Option<Entity> {
    world
        .resource::<BlockingGrid>()
        .0
        .get(pos)
        .or_else(|| world.resource::<BackgroundGrid>().0.get(pos))
}

/// Full scan by kind (spec §4.2 `iterate-by-kind`: "pre-maintained vector
/// per kind for renderer and rare full scans" — implemented here as a scan
/// rather than a maintained cache, since `bevy_ecs` query iteration over a
/// `Kind` component is already close to O(matching) and avoids a second
/// bookkeeping structure to keep in sync).
pub fn iterate_by_kind(world: &mut World, kind: EntityKind) -> Vec<Entity> {
    let mut query = world.query::<(Entity, &Kind)>();
    query.iter(world).filter(|(_, k)| k.0 == kind).map(|(e, _)| e).collect()
}

/// Step 1: decays every short-lived effect entity by one tick, despawning
/// those that reach zero (spec §4.1 step 1).
pub fn decay_short_lived_effects(world: &mut World) {
    let expired: Vec<Entity> = {
        let mut query = world.query::<(Entity, &mut EffectLifetime)>();
        let mut expired = Vec::new();
        for (entity, mut lifetime) in query.iter_mut(world) {
            lifetime.0 = lifetime.0.saturating_sub(1);
            if lifetime.0 == 0 {
                expired.push(entity);
            }
        }
        expired
    };
    for entity in expired {
        world.resource_mut::<BackgroundGrid>().0.clear_entity(entity);
        world.despawn(entity);
    }
}

/// Step 2 / step 9: removes agents at zero hp from the grid and begins
/// their corpse timeline, without despawning them outright (spec §4.1
/// steps 2 and 9, §4.13).
pub fn death_sweep(world: &mut World) {
    let newly_dead: Vec<Entity> = {
        let mut query = world.query::<(Entity, &Health, &Dead)>();
        query
            .iter(world)
            .filter(|(_, health, dead)| !health.is_alive() && !dead.0)
            .map(|(e, _, _)| e)
            .collect()
    };
    for entity in newly_dead {
        if let Some(mut dead) = world.get_mut::<Dead>(entity) {
            dead.0 = true;
        }
        world.resource_mut::<BlockingGrid>().0.clear_entity(entity);
        world.resource_mut::<SpatialIndex>().remove(entity);
        world.entity_mut(entity).insert((begin_corpse_timeline(60), Kind(EntityKind::Corpse)));
    }
}

/// Advances every corpse/skeleton timeline by one step, transitioning
/// corpse → skeleton → fully removed (spec §4.13).
pub fn advance_death_timelines(world: &mut World) {
    let mut to_skeleton: Vec<Entity> = Vec::new();
    let mut to_remove: Vec<Entity> = Vec::new();
    {
        let mut query = world.query::<(Entity, &mut DeathTimeline)>();
        for (entity, mut timeline) in query.iter_mut(world) {
            match &mut *timeline {
                DeathTimeline::Corpse { steps_left } => {
                    *steps_left = steps_left.saturating_sub(1);
                    if *steps_left == 0 {
                        to_skeleton.push(entity);
                    }
                }
                DeathTimeline::Skeleton { steps_left } => {
                    *steps_left = steps_left.saturating_sub(1);
                    if *steps_left == 0 {
                        to_remove.push(entity);
                    }
                }
            }
        }
    }
    for entity in to_skeleton {
        world.entity_mut(entity).insert((DeathTimeline::Skeleton { steps_left: 60 }, Kind(EntityKind::Skeleton)));
    }
    for entity in to_remove {
        if let Some(stable) = world.get::<StableIdComp>(entity).map(|s| s.0) {
            world.resource_mut::<StableIdRegistry>().release(stable);
        }
        world.despawn(entity);
    }
}

/// Step 12: applies the per-alive survival reward/penalty (spec §4.1,
/// `SimConfig::rewards`).
pub fn apply_survival_reward(world: &mut World) {
    let penalty = world.resource::<crate::config::SimConfig>().rewards.survival_penalty;
    let mut query = world.query::<(&Dead, &mut Reward)>();
    for (dead, mut reward) in query.iter_mut(world) {
        if !dead.0 {
            reward.0 += penalty;
        }
    }
}

/// Snapshot of a single renderable entity, exported for external clients
/// (grounded in the teacher's `Snapshot`/`EntitySnapshot` render-export
/// pattern, generalized from float world-space to integer tile space).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: u32,
    pub kind: EntityKind,
    pub owner: i8,
    pub x: i32,
    pub y: i32,
    pub hp_fraction: f32,
}

/// Step index, exposed as a resource so systems that need deterministic
/// per-step RNG substreams (tumor branching, wildlife AI) don't need it
/// threaded through every call site.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct StepIndex(pub u64);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::ids::StableIdRegistry;
    use crate::team::Teams;

    fn test_world() -> World {
        let mut world = World::new();
        world.insert_resource(BlockingGrid::new(20, 20));
        world.insert_resource(BackgroundGrid::new(20, 20));
        world.insert_resource(SpatialIndex::default());
        world.insert_resource(crate::grid::TerrainGrid::new(20, 20));
        world.insert_resource(Teams::new(400));
        world.insert_resource(StableIdRegistry::default());
        world.insert_resource(SimConfig::default());
        world
    }

    #[test]
    fn create_agent_rejects_occupied_tile() {
        let mut world = test_world();
        create_agent(&mut world, Position::new(2, 2), Owner::team(0), UnitClass::Villager, 25, None).unwrap();
        let result = create_agent(&mut world, Position::new(2, 2), Owner::team(1), UnitClass::Villager, 25, None);
        assert!(result.is_err());
    }

    #[test]
    fn move_entity_updates_blocking_grid() {
        let mut world = test_world();
        let e = create_agent(&mut world, Position::new(2, 2), Owner::team(0), UnitClass::Villager, 25, None).unwrap();
        move_entity(&mut world, e, Position::new(3, 3)).unwrap();
        assert!(world.resource::<BlockingGrid>().0.is_occupied(Position::new(3, 3)));
        assert!(!world.resource::<BlockingGrid>().0.is_occupied(Position::new(2, 2)));
    }

    #[test]
    fn death_sweep_marks_dead_without_despawning() {
        let mut world = test_world();
        let e = create_agent(&mut world, Position::new(2, 2), Owner::team(0), UnitClass::Villager, 25, None).unwrap();
        world.get_mut::<Health>(e).unwrap().current = 0;
        death_sweep(&mut world);
        assert!(world.get::<Dead>(e).unwrap().0);
        assert!(world.get_entity(e).is_some());
    }
}
