//! Combat and damage resolution (spec §4.4).
//!
//! Pure functions over `(attacker, target, context)`: `apply_agent_damage`
//! and `apply_structure_damage` are the only paths in the whole crate that
//! reduce hp. Determinism comes from this being the sole chokepoint — every
//! caller (action dispatcher, tower volleys, tumor adjacency damage) routes
//! through here so double-kill guards and death bookkeeping happen exactly
//! once.

use bevy_ecs::prelude::*;
use std::collections::HashSet;

use crate::components::{Armor, DeathTimeline, Dead, Health};
use crate::ids::UnitClass;

/// Base damage per attacking unit class. A function table keyed by a match,
/// per spec §9 ("avoiding runtime reflection").
pub fn base_damage(class: UnitClass) -> i32 {
    match class {
        UnitClass::Villager => 3,
        UnitClass::ManAtArms => 6,
        UnitClass::Spearman => 5,
        UnitClass::Pikeman => 6,
        UnitClass::Archer => 4,
        UnitClass::Crossbowman => 5,
        UnitClass::EliteArcher => 6,
        UnitClass::HorseArcher => 5,
        UnitClass::Scout => 4,
        UnitClass::Knight => 8,
        UnitClass::Cavalier => 10,
        UnitClass::Champion => 9,
        UnitClass::Camel => 6,
        UnitClass::WarElephant => 14,
        UnitClass::Monk => 0,
        UnitClass::King => 5,
        UnitClass::Ram => 2,
        UnitClass::Mangonel => 12,
        UnitClass::Trebuchet => 20,
        UnitClass::Petard => 15,
        UnitClass::TransportBoat => 0,
        UnitClass::WarGalley => 9,
        UnitClass::FireShip => 11,
        UnitClass::Samurai => 9,
        UnitClass::Conquistador => 8,
        UnitClass::Janissary => 6,
        UnitClass::Longbowman => 7,
        UnitClass::Huskarl => 7,
        UnitClass::Trader => 0,
        UnitClass::Goblin => 4,
    }
}

/// Class-vs-class bonus (e.g. spearmen against cavalry). A small curated
/// table rather than a full matrix: unlisted pairs get zero bonus.
pub fn class_bonus(attacker: UnitClass, target: UnitClass) -> i32 {
    use UnitClass::*;
    match (attacker, target) {
        (Spearman, c) | (Pikeman, c) if c.is_cavalry() => 6,
        (Archer, Villager) | (Crossbowman, Villager) | (Longbowman, Villager) => 2,
        (Camel, c) if c.is_cavalry() => 4,
        (Ram, _) | (Mangonel, _) | (Trebuchet, _) | (Petard, _) => 0,
        _ => 0,
    }
}

/// Siege units get a multiplier against structures, applied to the combined
/// base+bonus damage rather than stacking additively (spec §4.3).
pub fn siege_multiplier(attacker: UnitClass, target_is_structure: bool) -> f32 {
    if target_is_structure && attacker.is_siege() {
        3.0
    } else {
        1.0
    }
}

/// Tank aura damage reduction: halves incoming damage if the target stands
/// in a tank's aura band, floored at 1 pre-armor, never stacking across
/// multiple overlapping auras (spec §4.3, §9 resolves the tie-break as
/// "apply once, strongest source wins" — see DESIGN.md).
pub fn apply_tank_aura_reduction(pre_armor_damage: i32, in_aura_band: bool) -> i32 {
    if in_aura_band {
        (pre_armor_damage / 2).max(1)
    } else {
        pre_armor_damage
    }
}

/// Full damage formula (spec §4.3 verb 2 / §4.4), excluding the armor
/// subtraction which callers apply after this.
pub fn compute_damage(
    attacker_class: UnitClass,
    target_class: UnitClass,
    target_is_structure: bool,
    upgrade_bonus: i32,
    in_aura_band: bool,
) -> i32 {
    let base = base_damage(attacker_class) + class_bonus(attacker_class, target_class) + upgrade_bonus;
    let sieged = (base as f32 * siege_multiplier(attacker_class, target_is_structure)).round() as i32;
    apply_tank_aura_reduction(sieged, in_aura_band)
}

/// Tracks entities already marked dead this step, so later damage
/// applications in the same pass skip them (spec §4.4 double-kill guard).
#[derive(Resource, Debug, Default)]
pub struct DeathGuard(pub HashSet<Entity>);

impl DeathGuard {
    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_marked(&self, e: Entity) -> bool {
        self.0.contains(&e)
    }

    pub fn mark(&mut self, e: Entity) {
        self.0.insert(e);
    }
}

/// Applies damage to an agent. Returns `true` if this call killed it.
/// Skips victims already marked dead this step (double-kill guard).
pub fn apply_agent_damage(
    victim: Entity,
    health: &mut Health,
    armor: &Armor,
    dead: &mut Dead,
    guard: &mut DeathGuard,
    raw_damage: i32,
) -> bool {
    if guard.is_marked(victim) || dead.0 {
        return false;
    }
    let after_armor = (raw_damage - armor.0).max(0);
    health.damage(after_armor);
    if !health.is_alive() {
        dead.0 = true;
        guard.mark(victim);
        true
    } else {
        false
    }
}

/// Applies damage to a building/structure. Structures have no `Dead`
/// component; destruction is signalled by the caller checking
/// `health.is_alive()` after this returns.
pub fn apply_structure_damage(victim: Entity, health: &mut Health, armor: &Armor, guard: &mut DeathGuard, raw_damage: i32) -> bool {
    if guard.is_marked(victim) {
        return false;
    }
    let after_armor = (raw_damage - armor.0).max(0);
    health.damage(after_armor);
    if !health.is_alive() {
        guard.mark(victim);
        true
    } else {
        false
    }
}

/// Converts a freshly-killed agent into a corpse with a decay timeline
/// (spec §3, §4.13).
pub fn begin_corpse_timeline(corpse_steps: u32) -> DeathTimeline {
    DeathTimeline::Corpse {
        steps_left: corpse_steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tank_aura_halves_and_floors_at_one() {
        assert_eq!(apply_tank_aura_reduction(10, true), 5);
        assert_eq!(apply_tank_aura_reduction(1, true), 1);
        assert_eq!(apply_tank_aura_reduction(10, false), 10);
    }

    #[test]
    fn double_kill_guard_skips_already_marked_victim() {
        let mut guard = DeathGuard::default();
        let mut health = Health::new(10);
        let armor = Armor(0);
        let mut dead = Dead(false);
        let victim = Entity::from_raw(1);

        let killed = apply_agent_damage(victim, &mut health, &armor, &mut dead, &mut guard, 100);
        assert!(killed);

        let mut health2 = Health::new(10);
        let killed_again = apply_agent_damage(victim, &mut health2, &armor, &mut dead, &mut guard, 100);
        assert!(!killed_again);
        assert_eq!(health2.current, 10, "second application must be a no-op");
    }

    #[test]
    fn siege_multiplier_only_applies_to_structures() {
        assert_eq!(siege_multiplier(UnitClass::Trebuchet, true), 3.0);
        assert_eq!(siege_multiplier(UnitClass::Trebuchet, false), 1.0);
        assert_eq!(siege_multiplier(UnitClass::Archer, true), 1.0);
    }

    #[test]
    fn compute_damage_applies_bonus_and_aura() {
        let dmg = compute_damage(UnitClass::Spearman, UnitClass::Knight, false, 0, true);
        // base(5) + bonus(6) = 11, halved by aura = 5
        assert_eq!(dmg, 5);
    }
}
