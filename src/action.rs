//! Action encoding and the per-agent action dispatcher (spec §4.3).
//!
//! Decodes a `uint8` as `verb = a / 25, arg = a % 25` and executes one of
//! eleven verbs against a directly-addressed `&mut World`. Every verb
//! follows the same shape: check alive/frozen/cooldown, check verb-specific
//! preconditions, mutate on success or bump `ActionInvalidCount` on failure.
//! No verb ever propagates a `Result` outward — precondition failure is a
//! local no-op (spec §7).

use bevy_ecs::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::buildings::{self};
use crate::combat::{self, DeathGuard};
use crate::components::*;
use crate::config::SimConfig;
use crate::grid::{BackgroundGrid, TerrainGrid, TerrainType};
use crate::ids::{EntityKind, Owner, BUILD_CATALOG};
use crate::market;
use crate::spatial::SpatialIndex;
use crate::team::Teams;
use crate::tint::TintField;

pub const NUM_VERBS: u8 = 11;
pub const NUM_ARGS: u8 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Noop,
    Move,
    Attack,
    Use,
    Swap,
    Put,
    PlantLantern,
    PlantResource,
    Build,
    Orient,
    SetRallyPoint,
}

impl Verb {
    pub fn from_index(idx: u8) -> Option<Verb> {
        Some(match idx {
            0 => Verb::Noop,
            1 => Verb::Move,
            2 => Verb::Attack,
            3 => Verb::Use,
            4 => Verb::Swap,
            5 => Verb::Put,
            6 => Verb::PlantLantern,
            7 => Verb::PlantResource,
            8 => Verb::Build,
            9 => Verb::Orient,
            10 => Verb::SetRallyPoint,
            _ => return None,
        })
    }
}

/// `encode(verb, arg) = verb*25 + arg` (spec §8 action-byte invariant).
pub fn encode(verb: u8, arg: u8) -> u8 {
    debug_assert!(verb < NUM_VERBS && arg < NUM_ARGS);
    verb * NUM_ARGS + arg
}

/// Inverse of `encode`.
pub fn decode(byte: u8) -> (u8, u8) {
    (byte / NUM_ARGS, byte % NUM_ARGS)
}

fn mark_invalid(world: &mut World, agent: Entity) {
    if let Some(mut count) = world.get_mut::<ActionInvalidCount>(agent) {
        count.0 += 1;
    }
}

fn is_frozen(world: &World, entity: Entity, pos: Position) -> bool {
    let counter = world.get::<FrozenCounter>(entity).map(|c| c.0 > 0).unwrap_or(false);
    let tile_frozen = world.resource::<TintField>().is_tile_frozen(pos);
    counter || tile_frozen
}

fn agent_ready(world: &World, agent: Entity) -> bool {
    let dead = world.get::<Dead>(agent).map(|d| d.0).unwrap_or(true);
    if dead {
        return false;
    }
    let pos = match world.get::<Position>(agent) {
        Some(p) => *p,
        None => return false,
    };
    if is_frozen(world, agent, pos) {
        return false;
    }
    world.get::<Cooldown>(agent).map(|c| c.ready()).unwrap_or(false)
}

/// Top-level entry point called once per living agent, in shuffled order
/// (spec §4.1 step 4).
pub fn dispatch(world: &mut World, agent: Entity, byte: u8, tick: u64, rng: &mut ChaCha8Rng) {
    let (verb_idx, arg) = decode(byte);
    let verb = match Verb::from_index(verb_idx) {
        Some(v) => v,
        None => {
            mark_invalid(world, agent);
            return;
        }
    };

    if !agent_ready(world, agent) {
        if verb != Verb::Noop {
            mark_invalid(world, agent);
        }
        return;
    }

    let ok = match verb {
        Verb::Noop => true,
        Verb::Move => do_move(world, agent, arg, tick),
        Verb::Attack => do_attack(world, agent, arg, tick),
        Verb::Use => do_use(world, agent, arg, tick),
        Verb::Swap => do_swap(world, agent, arg),
        Verb::Put => do_put(world, agent, arg),
        Verb::PlantLantern => do_plant_lantern(world, agent, arg, tick),
        Verb::PlantResource => do_plant_resource(world, agent, arg),
        Verb::Build => do_build(world, agent, arg, tick),
        Verb::Orient => do_orient(world, agent, arg),
        Verb::SetRallyPoint => do_set_rally_point(world, agent, arg),
    };

    if !ok {
        mark_invalid(world, agent);
    }

    let _ = rng; // reserved: shuffle order already applied by the caller
}

// ============================================================================
// VERB 1: MOVE
// ============================================================================

fn do_move(world: &mut World, agent: Entity, arg: u8, tick: u64) -> bool {
    let dir = match Direction::from_arg(arg) {
        Some(d) => d,
        None => return false,
    };
    let pos = *world.get::<Position>(agent).unwrap();
    let class = world.get::<Class>(agent).unwrap().0;
    let owner = world.get::<Owned>(agent).unwrap().0;

    let (dx, dy) = dir.vector();
    let step_count = if class.is_cavalry() { 2 } else { 1 };

    let mut final_pos = pos;
    for step in 1..=step_count {
        let candidate = pos.offset(dx * step, dy * step);
        if !can_step_onto(world, agent, owner, class, pos, candidate, dir) {
            if step == 1 {
                return false;
            }
            break;
        }
        final_pos = candidate;
    }

    if final_pos == pos {
        return false;
    }

    move_entity(world, agent, pos, final_pos);
    leave_trail_and_reveal(world, agent, owner, final_pos);

    let terrain = world.resource::<TerrainGrid>();
    let entered_water = terrain.terrain_at(final_pos) == TerrainType::Water;
    if entered_water && !class.is_boat() {
        spawn_ripple(world, final_pos, tick);
    }
    true
}

fn can_step_onto(world: &World, agent: Entity, owner: Owner, class: crate::ids::UnitClass, from: Position, to: Position, dir: Direction) -> bool {
    let terrain = world.resource::<TerrainGrid>();
    if !terrain.in_bounds(to.x, to.y) || terrain.is_border(to.x, to.y) {
        return false;
    }
    if !terrain.elevation_allows_move(from, to, dir.is_diagonal()) {
        return false;
    }
    if terrain.terrain_at(to) == TerrainType::Water && !class.is_boat() {
        return false;
    }
    let blocking = &world.resource::<crate::grid::BlockingGrid>().0;
    if let Some(occupant) = blocking.get(to) {
        if occupant == agent {
            return true;
        }
        let occ_kind = world.get::<Kind>(occupant).map(|k| k.0);
        if occ_kind == Some(EntityKind::Door) {
            let occ_owner = world.get::<Owned>(occupant).map(|o| o.0);
            if occ_owner.map(|o| owner.is_hostile_to(o)).unwrap_or(false) {
                return false;
            }
            return true;
        }
        if occ_kind.map(|k| k.is_resource_node()).unwrap_or(false) {
            return true;
        }
        return false;
    }
    true
}

fn move_entity(world: &mut World, entity: Entity, from: Position, to: Position) {
    {
        let mut blocking = world.resource_mut::<crate::grid::BlockingGrid>();
        blocking.0.clear(from);
        blocking.0.place(to, entity);
    }
    if let Some(mut pos) = world.get_mut::<Position>(entity) {
        *pos = to;
    }
    let kind = world.get::<Kind>(entity).map(|k| k.0).unwrap_or(EntityKind::Agent);
    let owner = world.get::<Owned>(entity).map(|o| o.0).unwrap_or(Owner::NEUTRAL);
    world.resource_mut::<SpatialIndex>().insert(entity, to, kind, owner);
}

fn leave_trail_and_reveal(world: &mut World, _agent: Entity, owner: Owner, pos: Position) {
    if let Some(team_id) = owner.team_id() {
        let mut teams = world.resource_mut::<Teams>();
        let team = teams.get_mut(team_id);
        if let Some(idx) = tile_index(world, pos) {
            if idx < team.fog.len() {
                team.fog[idx] = true;
            }
        }
    }
}

fn tile_index(world: &World, pos: Position) -> Option<usize> {
    let terrain = world.resource::<TerrainGrid>();
    if terrain.in_bounds(pos.x, pos.y) {
        Some((pos.y * terrain.width + pos.x) as usize)
    } else {
        None
    }
}

fn spawn_ripple(world: &mut World, pos: Position, _tick: u64) {
    world.spawn((Position::new(pos.x, pos.y), Kind(EntityKind::WaterRipple), EffectLifetime(10)));
}

// ============================================================================
// VERB 2: ATTACK
// ============================================================================

fn do_attack(world: &mut World, agent: Entity, arg: u8, tick: u64) -> bool {
    let dir = match Direction::from_arg(arg) {
        Some(d) if (arg as usize) < 8 => d,
        _ => return false,
    };
    let class = world.get::<Class>(agent).unwrap().0;
    let pos = *world.get::<Position>(agent).unwrap();
    let owner = world.get::<Owned>(agent).unwrap().0;
    let (dx, dy) = dir.vector();

    if class.is_monk() {
        return do_monk_action(world, agent, owner, pos, dx, dy);
    }

    let range = attack_range(class);
    let target = find_attack_target(world, pos, owner, dx, dy, range);
    let target = match target {
        Some(t) => t,
        None => return false,
    };

    let target_kind = world.get::<Kind>(target).map(|k| k.0).unwrap_or(EntityKind::Agent);
    let is_structure = target_kind.is_building();
    let upgrade_bonus = 0;
    let in_aura = entity_in_tank_aura(world, target, owner);

    if is_structure {
        let armor = *world.get::<Armor>(target).unwrap_or(&Armor(0));
        let target_class = crate::ids::UnitClass::Villager;
        let dmg = combat::compute_damage(class, target_class, true, upgrade_bonus, in_aura);
        // `resource_scope` is the only safe way to hold `&mut DeathGuard` and
        // `&mut World` at once — a bare `resource_mut` borrow can't coexist
        // with a later `get_mut` on the same `World`.
        let killed = world.resource_scope(|world, mut guard: Mut<DeathGuard>| {
            if let Some(mut health) = world.get_mut::<Health>(target) {
                combat::apply_structure_damage(target, &mut health, &armor, &mut guard, dmg)
            } else {
                false
            }
        });
        write_action_tint(world, pos, class);
        if killed {
            buildings::destroy_building(world, target);
        }
        true
    } else {
        let target_class = world.get::<Class>(target).map(|c| c.0).unwrap_or(crate::ids::UnitClass::Villager);
        let armor = *world.get::<Armor>(target).unwrap_or(&Armor(0));
        let dmg = combat::compute_damage(class, target_class, false, upgrade_bonus, in_aura);
        let killed = world.resource_scope(|world, mut guard: Mut<DeathGuard>| {
            let mut query = world.query::<(&mut Health, &mut Dead)>();
            if let Ok((mut health, mut dead)) = query.get_mut(world, target) {
                combat::apply_agent_damage(target, &mut health, &armor, &mut dead, &mut guard, dmg)
            } else {
                false
            }
        });
        write_action_tint(world, world.get::<Position>(target).map(|p| *p).unwrap_or(pos), class);
        if killed {
            begin_corpse(world, target, tick);
        }
        true
    }
}

fn attack_range(class: crate::ids::UnitClass) -> i32 {
    use crate::ids::UnitClass::*;
    if class.is_archer() {
        crate::config::constants::ARCHER_BASE_RANGE
    } else {
        match class {
            Scout | Ram => 2,
            Mangonel => 5,
            WarGalley | FireShip | TransportBoat => 3,
            _ => 1,
        }
    }
}

fn find_attack_target(world: &World, origin: Position, owner: Owner, dx: i32, dy: i32, range: i32) -> Option<Entity> {
    let blocking = &world.resource::<crate::grid::BlockingGrid>().0;
    for step in 1..=range {
        let pos = origin.offset(dx * step, dy * step);
        if let Some(candidate) = blocking.get(pos) {
            let cand_owner = world.get::<Owned>(candidate).map(|o| o.0);
            if cand_owner.map(|o| owner.is_hostile_to(o)).unwrap_or(false) {
                return Some(candidate);
            }
            return None;
        }
    }
    None
}

fn entity_in_tank_aura(world: &World, target: Entity, target_owner_of_attacker: Owner) -> bool {
    let target_pos = match world.get::<Position>(target) {
        Some(p) => *p,
        None => return false,
    };
    let index = world.resource::<SpatialIndex>();
    let mut found = false;
    index.for_each_in_radius(target_pos, EntityKind::Agent, 2, |e| {
        if found {
            return;
        }
        if e.owner.is_hostile_to(target_owner_of_attacker) {
            return;
        }
        if let Some(class) = world.get::<Class>(e.entity).map(|c| c.0) {
            if let Some(radius) = class.is_tank_aura_source() {
                if target_pos.chebyshev_to(&e.pos) <= radius {
                    found = true;
                }
            }
        }
    });
    found
}

fn do_monk_action(world: &mut World, agent: Entity, owner: Owner, pos: Position, dx: i32, dy: i32) -> bool {
    let target_pos = pos.offset(dx, dy);
    let blocking = &world.resource::<crate::grid::BlockingGrid>().0;
    let target = match blocking.get(target_pos) {
        Some(t) => t,
        None => return false,
    };
    let target_kind = world.get::<Kind>(target).map(|k| k.0);
    if target_kind != Some(EntityKind::Agent) {
        return false;
    }
    let target_owner = world.get::<Owned>(target).map(|o| o.0).unwrap_or(Owner::NEUTRAL);

    if owner.is_hostile_to(target_owner) {
        // convert: fails if target's team already at pop-cap
        let target_team = match target_owner.team_id() {
            Some(t) => t,
            None => return false,
        };
        let teams = world.resource::<Teams>();
        let team = teams.get(target_team);
        if team.pop_count >= team.pop_cap {
            return false;
        }
        if let Some(mut owned) = world.get_mut::<Owned>(target) {
            owned.0 = owner;
        }
        true
    } else {
        let mut health = world.get_mut::<Health>(target).unwrap();
        if health.current >= health.max {
            return false;
        }
        health.heal(1);
        let _ = agent;
        true
    }
}

fn write_action_tint(world: &mut World, pos: Position, class: crate::ids::UnitClass) {
    let code = class as u8 as u32 % 255;
    world.spawn((Position::new(pos.x, pos.y), Kind(EntityKind::ActionTint), ActionTintCode(code as u8), EffectLifetime(6)));
}

fn begin_corpse(world: &mut World, agent: Entity, _tick: u64) {
    world.resource_mut::<crate::grid::BlockingGrid>().0.clear_entity(agent);
    world.resource_mut::<SpatialIndex>().remove(agent);
    world.entity_mut(agent).insert((combat::begin_corpse_timeline(60), Kind(EntityKind::Corpse)));
}

// ============================================================================
// VERB 3: USE
// ============================================================================

fn do_use(world: &mut World, agent: Entity, arg: u8, tick: u64) -> bool {
    let dir = match Direction::from_arg(arg) {
        Some(d) if arg < 8 => d,
        _ => return false,
    };
    let pos = *world.get::<Position>(agent).unwrap();
    let (dx, dy) = dir.vector();
    let target_pos = pos.offset(dx, dy);

    if world.resource::<TintField>().is_tile_frozen(target_pos) {
        return false;
    }

    let target = world.resource::<crate::grid::BlockingGrid>().0.get(target_pos);
    let target = match target {
        Some(t) => t,
        None => return false,
    };
    let target_kind = world.get::<Kind>(target).map(|k| k.0);

    match target_kind {
        Some(k) if k.is_resource_node() => harvest_resource(world, agent, target, k),
        Some(EntityKind::Monastery) => buildings::monastery_interact(world, agent, target),
        Some(k) if is_production_building(k) => market::try_station_craft(world, agent, target, k),
        Some(EntityKind::Market) => market::trade(world, agent, target),
        _ => false,
    }
}

fn is_production_building(k: EntityKind) -> bool {
    matches!(k, EntityKind::Mill | EntityKind::ClayOven | EntityKind::WeavingLoom | EntityKind::Blacksmith)
}

fn harvest_resource(world: &mut World, agent: Entity, node: Entity, kind: EntityKind) -> bool {
    let item = match kind {
        EntityKind::TreeNode => ItemKind::Wood,
        EntityKind::WheatPlant => ItemKind::Wheat,
        EntityKind::GoldMine => ItemKind::Gold,
        EntityKind::StoneDeposit => ItemKind::Stone,
        EntityKind::BerryBush => ItemKind::Food,
        _ => return false,
    };
    let mut amount = match world.get_mut::<ResourceAmount>(node) {
        Some(a) => a,
        None => return false,
    };
    if amount.0 == 0 {
        return false;
    }
    amount.0 -= 1;
    let depleted = amount.0 == 0;
    drop(amount);

    let mut inv = world.get_mut::<Inventory>(agent).unwrap();
    let added = inv.add(item, 1);
    drop(inv);

    if depleted {
        world.resource_mut::<crate::grid::BlockingGrid>().0.clear_entity(node);
        world.resource_mut::<SpatialIndex>().remove(node);
        world.despawn(node);
    }
    added > 0
}

// ============================================================================
// VERB 4: SWAP
// ============================================================================

fn do_swap(world: &mut World, agent: Entity, arg: u8) -> bool {
    let dir = match Direction::from_arg(arg) {
        Some(d) if arg < 8 => d,
        _ => return false,
    };
    let pos = *world.get::<Position>(agent).unwrap();
    let owner = world.get::<Owned>(agent).unwrap().0;
    let (dx, dy) = dir.vector();
    let target_pos = pos.offset(dx, dy);

    if world.resource::<TintField>().is_tile_frozen(target_pos) || world.resource::<TintField>().is_tile_frozen(pos) {
        return false;
    }

    let target = match world.resource::<crate::grid::BlockingGrid>().0.get(target_pos) {
        Some(t) => t,
        None => return false,
    };
    if world.get::<Kind>(target).map(|k| k.0) != Some(EntityKind::Agent) {
        return false;
    }
    let target_owner = world.get::<Owned>(target).map(|o| o.0).unwrap_or(Owner::NEUTRAL);
    if owner.is_hostile_to(target_owner) {
        return false;
    }

    swap_entities(world, agent, pos, target, target_pos);
    true
}

/// Exchanges the positions of two entities on adjacent tiles. Must clear
/// both blocking-grid cells before placing either: placing one at a time
/// (as plain sequential `move_entity` calls would) finds the destination
/// still held by the other entity and silently refuses to place, dropping
/// the mover from the blocking grid while its `Position` component still
/// moves.
fn swap_entities(world: &mut World, a: Entity, a_pos: Position, b: Entity, b_pos: Position) {
    {
        let mut blocking = world.resource_mut::<crate::grid::BlockingGrid>();
        blocking.0.clear(a_pos);
        blocking.0.clear(b_pos);
        blocking.0.place(b_pos, a);
        blocking.0.place(a_pos, b);
    }
    if let Some(mut pos) = world.get_mut::<Position>(a) {
        *pos = b_pos;
    }
    if let Some(mut pos) = world.get_mut::<Position>(b) {
        *pos = a_pos;
    }
    let a_kind = world.get::<Kind>(a).map(|k| k.0).unwrap_or(EntityKind::Agent);
    let a_owner = world.get::<Owned>(a).map(|o| o.0).unwrap_or(Owner::NEUTRAL);
    world.resource_mut::<SpatialIndex>().insert(a, b_pos, a_kind, a_owner);
    let b_kind = world.get::<Kind>(b).map(|k| k.0).unwrap_or(EntityKind::Agent);
    let b_owner = world.get::<Owned>(b).map(|o| o.0).unwrap_or(Owner::NEUTRAL);
    world.resource_mut::<SpatialIndex>().insert(b, a_pos, b_kind, b_owner);
}

// ============================================================================
// VERB 5: PUT
// ============================================================================

fn do_put(world: &mut World, agent: Entity, arg: u8) -> bool {
    let dir = match Direction::from_arg(arg) {
        Some(d) if arg < 8 => d,
        _ => return false,
    };
    let pos = *world.get::<Position>(agent).unwrap();
    let owner = world.get::<Owned>(agent).unwrap().0;
    let (dx, dy) = dir.vector();
    let target_pos = pos.offset(dx, dy);

    let target = match world.resource::<crate::grid::BlockingGrid>().0.get(target_pos) {
        Some(t) => t,
        None => return false,
    };
    if world.get::<Kind>(target).map(|k| k.0) != Some(EntityKind::Agent) {
        return false;
    }
    let target_owner = world.get::<Owned>(target).map(|o| o.0).unwrap_or(Owner::NEUTRAL);
    if owner.is_hostile_to(target_owner) {
        return false;
    }

    let transferable = {
        let inv = world.get::<Inventory>(agent).unwrap();
        inv.items.keys().next().copied()
    };
    let item = match transferable {
        Some(i) => i,
        None => return false,
    };

    let mut target_inv = world.get_mut::<Inventory>(target).unwrap();
    if target_inv.is_full() {
        return false;
    }
    let added = target_inv.add(item, 1);
    drop(target_inv);
    if added == 0 {
        return false;
    }
    let mut source_inv = world.get_mut::<Inventory>(agent).unwrap();
    source_inv.take(item, 1);
    true
}

// ============================================================================
// VERB 6: PLANT-LANTERN
// ============================================================================

fn do_plant_lantern(world: &mut World, agent: Entity, arg: u8, _tick: u64) -> bool {
    let dir = match Direction::from_arg(arg) {
        Some(d) if arg < 8 => d,
        _ => return false,
    };
    let pos = *world.get::<Position>(agent).unwrap();
    let owner = world.get::<Owned>(agent).unwrap().0;
    let (dx, dy) = dir.vector();
    let target_pos = pos.offset(dx, dy);

    if world.resource::<TintField>().is_tile_frozen(target_pos) {
        return false;
    }
    if world.resource::<crate::grid::BlockingGrid>().0.is_occupied(target_pos) {
        return false;
    }
    let bg = &world.resource::<BackgroundGrid>().0;
    if let Some(existing) = bg.get(target_pos) {
        if world.get::<Kind>(existing).map(|k| k.0) == Some(EntityKind::Door) {
            return false;
        }
    }

    let mut inv = world.get_mut::<Inventory>(agent).unwrap();
    if !inv.take(ItemKind::Lantern, 1) {
        return false;
    }
    drop(inv);

    let lantern = world
        .spawn((
            Position::new(target_pos.x, target_pos.y),
            Kind(EntityKind::Lantern),
            Owned(owner),
            LanternColor(owner),
            Health::new(1),
        ))
        .id();
    world.resource_mut::<BackgroundGrid>().0.place(target_pos, lantern);
    world.resource_mut::<SpatialIndex>().insert(lantern, target_pos, EntityKind::Lantern, owner);
    true
}

// ============================================================================
// VERB 7: PLANT-RESOURCE
// ============================================================================

fn do_plant_resource(world: &mut World, agent: Entity, arg: u8) -> bool {
    if arg >= 8 {
        return false;
    }
    let cardinal = arg % 4;
    let is_tree = arg >= 4;
    let dir = match cardinal {
        0 => Direction::East,
        1 => Direction::North,
        2 => Direction::West,
        _ => Direction::South,
    };
    let pos = *world.get::<Position>(agent).unwrap();
    let (dx, dy) = dir.vector();
    let target_pos = pos.offset(dx, dy);

    let terrain = world.resource::<TerrainGrid>();
    if terrain.terrain_at(target_pos) != TerrainType::Fertile {
        return false;
    }
    if world.resource::<crate::grid::BlockingGrid>().0.is_occupied(target_pos) {
        return false;
    }

    let (item, kind, amount) = if is_tree {
        (ItemKind::Wood, EntityKind::TreeNode, 20)
    } else {
        (ItemKind::Wheat, EntityKind::WheatPlant, 10)
    };

    let mut inv = world.get_mut::<Inventory>(agent).unwrap();
    if !inv.take(item, 1) {
        return false;
    }
    drop(inv);

    let node = world
        .spawn((Position::new(target_pos.x, target_pos.y), Kind(kind), Owned(Owner::NEUTRAL), ResourceAmount(amount), Health::new(1)))
        .id();
    world.resource_mut::<crate::grid::BlockingGrid>().0.place(target_pos, node);
    world.resource_mut::<SpatialIndex>().insert(node, target_pos, kind, Owner::NEUTRAL);
    true
}

// ============================================================================
// VERB 8: BUILD
// ============================================================================

fn do_build(world: &mut World, agent: Entity, arg: u8, tick: u64) -> bool {
    if arg as usize >= BUILD_CATALOG.len() {
        return false;
    }
    let kind = BUILD_CATALOG[arg as usize];
    let owner = world.get::<Owned>(agent).unwrap().0;
    let pos = *world.get::<Position>(agent).unwrap();

    let team_id = match owner.team_id() {
        Some(t) => t,
        None => return false,
    };

    let placement = Direction::ALL
        .iter()
        .map(|d| pos.offset(d.vector().0, d.vector().1))
        .find(|p| {
            !world.resource::<crate::grid::BlockingGrid>().0.is_occupied(*p)
                && !world.resource::<TintField>().is_tile_frozen(*p)
                && world.resource::<TerrainGrid>().in_bounds(p.x, p.y)
        });
    let placement = match placement {
        Some(p) => p,
        None => return false,
    };

    if !buildings::can_afford_and_spend(world, team_id, agent, kind) {
        return false;
    }
    if !buildings::spacing_ok(world, kind, placement) {
        // refund on spacing failure
        buildings::refund(world, team_id, agent, kind);
        return false;
    }

    buildings::spawn_building(world, kind, owner, placement, tick);
    true
}

// ============================================================================
// VERB 9: ORIENT
// ============================================================================

fn do_orient(world: &mut World, agent: Entity, arg: u8) -> bool {
    let dir = match Direction::from_arg(arg) {
        Some(d) if arg < 8 => d,
        _ => return false,
    };
    let mut facing = world.get_mut::<Facing>(agent).unwrap();
    facing.0 = dir;
    true
}

// ============================================================================
// VERB 10: SET-RALLY-POINT
// ============================================================================

fn do_set_rally_point(world: &mut World, agent: Entity, arg: u8) -> bool {
    let dir = match Direction::from_arg(arg) {
        Some(d) if arg < 8 => d,
        _ => return false,
    };
    let pos = *world.get::<Position>(agent).unwrap();
    let owner = world.get::<Owned>(agent).unwrap().0;
    let (dx, dy) = dir.vector();

    // agent must be adjacent to a friendly production building
    let mut building = None;
    for d in Direction::ALL {
        let p = pos.offset(d.vector().0, d.vector().1);
        if let Some(candidate) = world.resource::<crate::grid::BlockingGrid>().0.get(p) {
            let k = world.get::<Kind>(candidate).map(|k| k.0);
            let o = world.get::<Owned>(candidate).map(|o| o.0);
            if k.map(|k| k.is_building()).unwrap_or(false) && o == Some(owner) {
                building = Some(candidate);
                break;
            }
        }
    }
    let building = match building {
        Some(b) => b,
        None => return false,
    };

    let target = pos.offset(dx, dy);
    let mut rally = world.get_mut::<RallyPoint>(building).unwrap();
    rally.0 = Some(target);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip_is_identity() {
        for verb in 0..NUM_VERBS {
            for arg in 0..NUM_ARGS {
                let byte = encode(verb, arg);
                assert_eq!(decode(byte), (verb, arg));
            }
        }
    }

    #[test]
    fn encode_matches_formula() {
        assert_eq!(encode(2, 5), 2 * 25 + 5);
    }

    #[test]
    fn direction_from_arg_rejects_out_of_range() {
        assert!(Direction::from_arg(8).is_none());
        assert!(Direction::from_arg(0).is_some());
    }
}
