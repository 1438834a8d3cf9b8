//! Building lifecycle: placement cost, construction, production queues,
//! research, garrisons, and the monastery relic/heal interaction (spec §4.7).

use bevy_ecs::prelude::*;

use crate::components::*;
use crate::ids::{EntityKind, Owner, StableId, TeamId};
use crate::spatial::SpatialIndex;
use crate::team::Teams;

/// `(food, wood, stone, gold)` cost per build-catalog entry. A curated table
/// rather than a formula, matching the closed-catalog design note (spec §9).
fn building_cost(kind: EntityKind) -> (u32, u32, u32, u32) {
    use EntityKind::*;
    match kind {
        House => (0, 30, 0, 0),
        TownCenter => (0, 275, 100, 0),
        Mill => (0, 100, 0, 0),
        LumberCamp => (0, 100, 0, 0),
        Quarry => (0, 100, 0, 0),
        Granary => (0, 120, 0, 0),
        Dock => (0, 150, 0, 0),
        Market => (0, 175, 0, 0),
        Barracks => (0, 175, 0, 0),
        ArcheryRange => (0, 175, 0, 0),
        Stable => (0, 175, 0, 0),
        SiegeWorkshop => (0, 200, 0, 0),
        Castle => (0, 650, 400, 0),
        Outpost => (0, 25, 5, 0),
        Wall => (0, 0, 15, 0),
        Road => (0, 0, 5, 0),
        Blacksmith => (0, 150, 0, 0),
        Monastery => (0, 175, 0, 0),
        University => (0, 200, 0, 0),
        Door => (0, 15, 0, 0),
        ClayOven => (0, 80, 0, 0),
        WeavingLoom => (0, 80, 0, 0),
        Barrel => (0, 20, 0, 0),
        GuardTower => (0, 25, 50, 0),
        MangonelWorkshop => (0, 200, 0, 0),
        _ => (0, 0, 0, 0),
    }
}

fn building_max_hp(kind: EntityKind) -> i32 {
    use EntityKind::*;
    match kind {
        TownCenter => 2400,
        Castle => 4800,
        Wall | GuardTower | Outpost => 1000,
        Door => 400,
        _ => 600,
    }
}

/// Minimum Chebyshev distance required from any same-kind building before a
/// new one may be placed, preventing overlapping footprints from stacking
/// production or defense (spec §4.7 placement rule; radius chosen
/// conservatively at 1 — the footprint itself is enforced by the blocking
/// grid check the caller already performs).
const MIN_BUILDING_SPACING: i32 = 1;

pub fn can_afford_and_spend(world: &mut World, team: TeamId, _agent: Entity, kind: EntityKind) -> bool {
    let (food, wood, stone, gold) = building_cost(kind);
    let mut teams = world.resource_mut::<Teams>();
    let stock = &mut teams.get_mut(team).stockpile;
    if stock.food < food || stock.wood < wood || stock.stone < stone || stock.gold < gold {
        return false;
    }
    stock.food -= food;
    stock.wood -= wood;
    stock.stone -= stone;
    stock.gold -= gold;
    true
}

pub fn refund(world: &mut World, team: TeamId, _agent: Entity, kind: EntityKind) {
    let (food, wood, stone, gold) = building_cost(kind);
    let mut teams = world.resource_mut::<Teams>();
    let stock = &mut teams.get_mut(team).stockpile;
    stock.food += food;
    stock.wood += wood;
    stock.stone += stone;
    stock.gold += gold;
}

pub fn spacing_ok(world: &World, kind: EntityKind, pos: Position) -> bool {
    let index = world.resource::<SpatialIndex>();
    let mut clear = true;
    index.for_each_in_radius(pos, kind, MIN_BUILDING_SPACING, |_| clear = false);
    clear
}

pub fn spawn_building(world: &mut World, kind: EntityKind, owner: Owner, pos: Position, _tick: u64) -> Entity {
    let max_hp = building_max_hp(kind);
    let entity = world.spawn(BuildingBundle::new(pos, kind, owner, max_hp)).id();

    {
        let mut registry = world.resource_mut::<crate::ids::StableIdRegistry>();
        let stable_id = registry.allocate(entity);
        world.entity_mut(entity).insert(StableIdComp(stable_id));
    }

    world.resource_mut::<crate::grid::BlockingGrid>().0.place(pos, entity);
    world.resource_mut::<SpatialIndex>().insert(entity, pos, kind, owner);

    if kind.is_garrisonable() {
        let capacity = match kind {
            EntityKind::TownCenter => 15,
            EntityKind::Castle => 20,
            EntityKind::GuardTower => 5,
            _ => 5,
        };
        world.entity_mut(entity).insert(Garrison::new(capacity));
    }
    if matches!(kind, EntityKind::Barracks | EntityKind::ArcheryRange | EntityKind::Stable | EntityKind::SiegeWorkshop | EntityKind::TownCenter | EntityKind::Dock) {
        world.entity_mut(entity).insert(ProductionQueue::default());
    }

    entity
}

pub fn destroy_building(world: &mut World, building: Entity) {
    let pos = world.get::<Position>(building).map(|p| *p);
    if let Some(mut state) = world.get_mut::<BuildingState>(building) {
        *state = BuildingState::Destroyed;
    }
    if let Some(garrison) = world.get::<Garrison>(building).cloned() {
        for occupant in garrison.occupants {
            if let Some(mut garrisoned) = world.get_mut::<Garrisoned>(occupant) {
                garrisoned.0 = false;
            }
            if let Some(p) = pos {
                if let Some(mut op) = world.get_mut::<Position>(occupant) {
                    *op = p;
                }
            }
        }
    }
    world.resource_mut::<crate::grid::BlockingGrid>().0.clear_entity(building);
    world.resource_mut::<SpatialIndex>().remove(building);
    if let Some(stable) = world.get::<StableIdComp>(building).map(|s| s.0) {
        world.resource_mut::<crate::ids::StableIdRegistry>().release(stable);
    }
    let _ = StableId(0);
    world.despawn(building);
}

/// Monastery interaction via the `use` verb: garrison/ungarrison a relic for
/// periodic gold income, or heal an adjacent allied agent's faith
/// (spec §4.7, §4.9).
pub fn monastery_interact(world: &mut World, agent: Entity, monastery: Entity) -> bool {
    let agent_inv_has_relic = world
        .get::<Inventory>(agent)
        .map(|inv| inv.count(ItemKind::Relic) > 0)
        .unwrap_or(false);

    if agent_inv_has_relic {
        let mut garrison = match world.get_mut::<Garrison>(monastery) {
            Some(g) => g,
            None => return false,
        };
        if garrison.is_full() {
            return false;
        }
        garrison.occupants.push(agent);
        drop(garrison);
        let mut inv = world.get_mut::<Inventory>(agent).unwrap();
        inv.take(ItemKind::Relic, 1);
        true
    } else {
        let mut faith = match world.get_mut::<Faith>(agent) {
            Some(f) => f,
            None => return false,
        };
        if faith.current >= faith.max {
            return false;
        }
        faith.current = (faith.current + 10.0).min(faith.max);
        true
    }
}

/// Base hitpoints for a freshly trained unit, grouped by the closed
/// `UnitClass` categories rather than enumerated per variant (spec §9
/// design note: dispatch on class stays a match over the closed enum).
fn unit_base_hp(class: crate::ids::UnitClass) -> i32 {
    use crate::ids::UnitClass::*;
    match class {
        Villager | Trader => 25,
        King => 50,
        _ if class.is_siege() => 150,
        _ if class.is_boat() => 50,
        _ if class.is_cavalry() => 60,
        _ if class.is_archer() || class.is_monk() => 30,
        _ => 45,
    }
}

/// Training duration in steps, same category grouping as `unit_base_hp`.
fn unit_train_duration(class: crate::ids::UnitClass) -> u32 {
    use crate::ids::UnitClass::*;
    match class {
        Villager | Trader => 15,
        King => 0,
        _ if class.is_siege() => 40,
        _ if class.is_boat() => 30,
        _ if class.is_cavalry() => 25,
        _ => 20,
    }
}

/// Queues `class` for training at `building` if its production queue has
/// room (spec §6 `queue-train`).
pub fn queue_train(world: &mut World, building: Entity, class: crate::ids::UnitClass) -> bool {
    let mut queue = match world.get_mut::<ProductionQueue>(building) {
        Some(q) => q,
        None => return false,
    };
    if queue.is_full() {
        return false;
    }
    queue.entries.push_back(QueueEntry {
        unit_class: class,
        progress: 0,
        duration: unit_train_duration(class).max(1),
    });
    true
}

/// Cancels the most recently queued entry at `building` (spec §6
/// `cancel-last`).
pub fn cancel_last_queued(world: &mut World, building: Entity) -> bool {
    match world.get_mut::<ProductionQueue>(building) {
        Some(mut queue) => queue.entries.pop_back().is_some(),
        None => false,
    }
}

/// Ticks construction timers and production queues for all buildings,
/// spawning units whose training completes this step (spec §4.1 step 10,
/// §4.7).
pub fn run_building_tick(world: &mut World) {
    let mut completed: Vec<(Position, Owner, crate::ids::UnitClass)> = Vec::new();
    {
        let mut query = world.query::<(&Position, &Owned, &mut BuildingState, &mut ConstructionTimer, Option<&mut ProductionQueue>)>();
        for (pos, owned, mut state, mut timer, queue) in query.iter_mut(world) {
            if *state == BuildingState::Placed {
                timer.0 = timer.0.saturating_sub(1);
                if timer.0 == 0 {
                    *state = BuildingState::Functional;
                }
            }
            if let Some(mut queue) = queue {
                let done = match queue.entries.front_mut() {
                    Some(front) => {
                        front.progress += 1;
                        front.progress >= front.duration
                    }
                    None => false,
                };
                if done {
                    let entry = queue.entries.pop_front().unwrap();
                    completed.push((*pos, owned.0, entry.unit_class));
                }
            }
        }
    }

    for (pos, owner, class) in completed {
        let team_id = match owner.team_id() {
            Some(t) => t,
            None => continue,
        };
        let (pop_count, pop_cap) = {
            let teams = world.resource::<Teams>();
            let team = teams.get(team_id);
            (team.pop_count, team.pop_cap)
        };
        if pop_count >= pop_cap {
            continue;
        }
        let spawn_pos = match adjacent_free_tile(world, pos) {
            Some(p) => p,
            None => continue,
        };
        if let Ok(unit) = crate::world::create_agent(world, spawn_pos, owner, class, unit_base_hp(class), None) {
            world.resource_mut::<Teams>().get_mut(team_id).pop_count += 1;
            let _ = unit;
        }
    }
}

fn adjacent_free_tile(world: &World, pos: Position) -> Option<Position> {
    let blocking = world.resource::<crate::grid::BlockingGrid>();
    for dir in Direction::ALL {
        let (dx, dy) = dir.vector();
        let candidate = pos.offset(dx, dy);
        if !blocking.0.is_occupied(candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affordable_spend_deducts_stockpile() {
        let mut world = World::new();
        world.insert_resource(Teams::new(10));
        world.resource_mut::<Teams>().get_mut(0).stockpile.wood = 100;
        let agent = world.spawn(()).id();
        assert!(can_afford_and_spend(&mut world, 0, agent, EntityKind::House));
        assert_eq!(world.resource::<Teams>().get(0).stockpile.wood, 70);
    }

    #[test]
    fn insufficient_funds_rejected_without_mutation() {
        let mut world = World::new();
        world.insert_resource(Teams::new(10));
        let agent = world.spawn(()).id();
        assert!(!can_afford_and_spend(&mut world, 0, agent, EntityKind::TownCenter));
        assert_eq!(world.resource::<Teams>().get(0).stockpile.wood, 0);
    }

    fn tick_world() -> World {
        let mut world = World::new();
        world.insert_resource(Teams::new(100));
        world.insert_resource(crate::grid::BlockingGrid::new(20, 20));
        world.insert_resource(SpatialIndex::default());
        world
    }

    #[test]
    fn queue_train_then_tick_spawns_unit_and_credits_population() {
        let mut world = tick_world();
        let tc = spawn_building(&mut world, EntityKind::TownCenter, Owner::team(0), Position::new(5, 5), 0);
        *world.get_mut::<BuildingState>(tc).unwrap() = BuildingState::Functional;
        world.resource_mut::<Teams>().get_mut(0).pop_cap = 10;
        assert!(queue_train(&mut world, tc, crate::ids::UnitClass::Villager));

        for _ in 0..20 {
            run_building_tick(&mut world);
        }

        assert_eq!(world.resource::<Teams>().get(0).pop_count, 1);
        assert!(world.get::<ProductionQueue>(tc).unwrap().entries.is_empty());
    }

    #[test]
    fn cancel_last_queued_removes_pending_entry() {
        let mut world = tick_world();
        let tc = spawn_building(&mut world, EntityKind::TownCenter, Owner::team(0), Position::new(5, 5), 0);
        queue_train(&mut world, tc, crate::ids::UnitClass::Villager);
        assert!(cancel_last_queued(&mut world, tc));
        assert!(world.get::<ProductionQueue>(tc).unwrap().entries.is_empty());
    }
}
