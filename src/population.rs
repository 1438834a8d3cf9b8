//! Respawn and population bookkeeping (spec §4.10).
//!
//! An eliminated team's altar respawns a fresh villager after a fixed
//! cooldown, provided the team is under its population cap and has not been
//! fully eliminated (no altar left standing).

use bevy_ecs::prelude::*;

use crate::components::*;
use crate::grid::BlockingGrid;
use crate::ids::{EntityKind, Owner, UnitClass};
use crate::spatial::SpatialIndex;
use crate::team::Teams;

const RESPAWN_COOLDOWN: u32 = 100;

/// Per-altar respawn timer; zero means "ready to respawn this step".
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct RespawnTimer(pub u32);

/// Recomputes each team's live population count from scratch (spec §4.10),
/// run once per step before respawn decisions so population is always
/// current relative to this step's deaths.
pub fn recompute_population(world: &mut World) {
    let mut counts = [0u32; crate::ids::MAX_TEAMS];
    {
        let mut query = world.query::<(&Owned, &Dead)>();
        for (owned, dead) in query.iter(world) {
            if dead.0 {
                continue;
            }
            if let Some(team) = owned.0.team_id() {
                counts[team as usize] += 1;
            }
        }
    }
    let mut teams = world.resource_mut::<Teams>();
    for (id, count) in counts.into_iter().enumerate() {
        teams.get_mut(id as crate::ids::TeamId).pop_count = count;
    }
}

/// Ticks respawn timers and spawns a villager at each ready, unclaimed
/// altar whose team is under its population cap (spec §4.10).
pub fn run_respawn_tick(world: &mut World) {
    let altars: Vec<(Entity, Position, Owner)> = {
        let mut query = world.query::<(Entity, &Position, &Owned, &Kind)>();
        query
            .iter(world)
            .filter(|(_, _, _, kind)| kind.0 == EntityKind::Altar)
            .map(|(e, p, o, _)| (e, *p, o.0))
            .collect()
    };

    for (altar, pos, owner) in altars {
        let team_id = match owner.team_id() {
            Some(t) => t,
            None => continue,
        };

        let ready = {
            let mut timer = world.entity_mut(altar).get_mut::<RespawnTimer>();
            match timer.as_deref_mut() {
                Some(t) => {
                    if t.0 > 0 {
                        t.0 -= 1;
                        false
                    } else {
                        true
                    }
                }
                None => {
                    world.entity_mut(altar).insert(RespawnTimer(0));
                    true
                }
            }
        };
        if !ready {
            continue;
        }

        let (pop_count, pop_cap, eliminated) = {
            let teams = world.resource::<Teams>();
            let team = teams.get(team_id);
            (team.pop_count, team.pop_cap, team.victory.eliminated)
        };
        if eliminated || pop_count >= pop_cap {
            continue;
        }

        let spawn_pos = match first_free_adjacent(world, pos) {
            Some(p) => p,
            None => continue,
        };

        let villager = world
            .spawn(AgentBundle::new(spawn_pos, owner, UnitClass::Villager, 25, Some(altar)))
            .id();
        world.resource_mut::<BlockingGrid>().0.place(spawn_pos, villager);
        world.resource_mut::<SpatialIndex>().insert(villager, spawn_pos, EntityKind::Agent, owner);
        world.resource_mut::<Teams>().get_mut(team_id).pop_count += 1;

        if let Some(mut timer) = world.entity_mut(altar).get_mut::<RespawnTimer>() {
            timer.0 = RESPAWN_COOLDOWN;
        }
    }
}

fn first_free_adjacent(world: &World, pos: Position) -> Option<Position> {
    let blocking = world.resource::<BlockingGrid>();
    for dir in Direction::ALL {
        let (dx, dy) = dir.vector();
        let candidate = pos.offset(dx, dy);
        if !blocking.0.is_occupied(candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Marks a team eliminated once it has no living agents and no standing
/// altar (spec §4.10, §4.11 — elimination feeds the conquest victory
/// predicate).
pub fn update_elimination_state(world: &mut World) {
    let mut has_altar = [false; crate::ids::MAX_TEAMS];
    {
        let mut query = world.query::<(&Owned, &Kind)>();
        for (owned, kind) in query.iter(world) {
            if kind.0 == EntityKind::Altar {
                if let Some(team) = owned.0.team_id() {
                    has_altar[team as usize] = true;
                }
            }
        }
    }
    let mut teams = world.resource_mut::<Teams>();
    for (id, team) in teams.0.iter_mut().enumerate() {
        if team.pop_count == 0 && !has_altar[id] {
            team.victory.eliminated = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_recount_matches_live_agents() {
        let mut world = World::new();
        world.insert_resource(Teams::new(10));
        world.spawn(AgentBundle::new(Position::new(1, 1), Owner::team(0), UnitClass::Villager, 25, None));
        let mut dead_bundle = AgentBundle::new(Position::new(2, 2), Owner::team(0), UnitClass::Villager, 25, None);
        dead_bundle.dead = Dead(true);
        world.spawn(dead_bundle);
        recompute_population(&mut world);
        assert_eq!(world.resource::<Teams>().get(0).pop_count, 1);
    }

    #[test]
    fn elimination_requires_zero_population_and_no_altar() {
        let mut world = World::new();
        world.insert_resource(Teams::new(10));
        world.resource_mut::<Teams>().get_mut(0).pop_count = 0;
        update_elimination_state(&mut world);
        assert!(world.resource::<Teams>().get(0).victory.eliminated);
    }
}
