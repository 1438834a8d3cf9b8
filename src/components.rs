//! ECS components for the frontier-core simulation.
//!
//! Components are pure data containers attached to entities; all game logic
//! lives in systems that query them (teacher convention, `tbg_sim::components`).
//! Where the teacher's battlefield was continuous (`Position { x: f32, y: f32 }`)
//! this engine's grid is integer-addressed (spec §3), so the analogous
//! components below trade `f32` for `i32`/`u32` throughout.

use crate::ids::{EntityKind, Owner, StableId, UnitClass};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// Integer tile position on the `W x H` grid (spec §3).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan_to(&self, other: &Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn chebyshev_to(&self, other: &Position) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }
}

/// Eight-way facing, shared by movement, attack patterns, and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    East = 0,
    NorthEast = 1,
    North = 2,
    NorthWest = 3,
    West = 4,
    SouthWest = 5,
    South = 6,
    SouthEast = 7,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::East,
        Direction::NorthEast,
        Direction::North,
        Direction::NorthWest,
        Direction::West,
        Direction::SouthWest,
        Direction::South,
        Direction::SouthEast,
    ];

    pub fn from_arg(arg: u8) -> Option<Direction> {
        if arg < 8 {
            Some(Self::ALL[arg as usize])
        } else {
            None
        }
    }

    pub fn vector(self) -> (i32, i32) {
        match self {
            Direction::East => (1, 0),
            Direction::NorthEast => (1, -1),
            Direction::North => (0, -1),
            Direction::NorthWest => (-1, -1),
            Direction::West => (-1, 0),
            Direction::SouthWest => (-1, 1),
            Direction::South => (0, 1),
            Direction::SouthEast => (1, 1),
        }
    }

    pub fn is_diagonal(self) -> bool {
        matches!(
            self,
            Direction::NorthEast | Direction::NorthWest | Direction::SouthWest | Direction::SouthEast
        )
    }

    pub fn is_cardinal(self) -> bool {
        !self.is_diagonal()
    }

    pub fn cardinal_index(self) -> Option<u8> {
        match self {
            Direction::East => Some(0),
            Direction::North => Some(1),
            Direction::West => Some(2),
            Direction::South => Some(3),
            _ => None,
        }
    }

    /// Next facing one eighth-turn clockwise, used by the control API's
    /// per-control-group formation rotation (spec §6).
    pub fn rotated_clockwise(self) -> Direction {
        Self::ALL[(self as u8 as usize + 1) % Self::ALL.len()]
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Entity kind tag, queried constantly by systems that branch on it.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kind(pub EntityKind);

/// Team ownership, `-1` for neutral/hostile NPCs (spec §3).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owned(pub Owner);

/// Stable cross-step id, distinct from the `bevy_ecs::Entity` handle (spec §9).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableIdComp(pub StableId);

// ============================================================================
// HEALTH & COMBAT COMPONENTS
// ============================================================================

/// Integer hit points; the spec requires integer state for determinism.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    pub fn new(max: i32) -> Self {
        Self { current: max, max }
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0 {
            0.0
        } else {
            (self.current as f32 / self.max as f32).clamp(0.0, 1.0)
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    /// Returns the actual amount applied (clamped at zero).
    pub fn damage(&mut self, amount: i32) -> i32 {
        let applied = amount.min(self.current);
        self.current = (self.current - amount).max(0);
        applied
    }

    pub fn heal(&mut self, amount: i32) {
        self.current = (self.current + amount).min(self.max);
    }
}

/// Move-debt / action cooldown counter; an agent may not act while non-zero.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Cooldown(pub u32);

impl Cooldown {
    pub fn tick(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }

    pub fn ready(&self) -> bool {
        self.0 == 0
    }
}

/// Frozen counter: entity is frozen while `> 0`, independent of standing on
/// a frozen tile (spec §4.6: "frozen iff ... OR it stands on a frozen tile").
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FrozenCounter(pub u32);

/// Per-agent invalid-action counter (spec §4.3, §7).
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ActionInvalidCount(pub u32);

/// Armor rating applied to incoming damage.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Armor(pub i32);

// ============================================================================
// INVENTORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Food,
    Wood,
    Stone,
    Gold,
    Water,
    Wheat,
    Bread,
    Spear,
    Armor,
    Cloth,
    Lantern,
    Relic,
    Bar,
}

/// Capped per-entity item counts (spec §3: "inventory map ... capped").
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub items: HashMap<ItemKind, u32>,
    pub cap: u32,
}

impl Inventory {
    pub fn with_cap(cap: u32) -> Self {
        Self {
            items: HashMap::new(),
            cap,
        }
    }

    pub fn total(&self) -> u32 {
        self.items.values().sum()
    }

    pub fn count(&self, item: ItemKind) -> u32 {
        *self.items.get(&item).unwrap_or(&0)
    }

    /// Adds up to `amount`, clamped by remaining capacity. Returns the
    /// amount actually added.
    pub fn add(&mut self, item: ItemKind, amount: u32) -> u32 {
        let room = self.cap.saturating_sub(self.total());
        let added = amount.min(room);
        if added > 0 {
            *self.items.entry(item).or_insert(0) += added;
        }
        added
    }

    pub fn take(&mut self, item: ItemKind, amount: u32) -> bool {
        match self.items.get_mut(&item) {
            Some(count) if *count >= amount => {
                *count -= amount;
                if *count == 0 {
                    self.items.remove(&item);
                }
                true
            }
            _ => false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.total() >= self.cap
    }
}

// ============================================================================
// AGENT COMPONENTS
// ============================================================================

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stance {
    Aggressive,
    Defensive,
    StandGround,
    NoAttack,
}

impl Default for Stance {
    fn default() -> Self {
        Stance::Aggressive
    }
}

/// Unit-class tag (spec §3: "~30 classes").
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class(pub UnitClass);

/// Current facing, independent of movement direction until the agent moves
/// or issues `orient`.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Facing(pub Direction);

impl Default for Facing {
    fn default() -> Self {
        Facing(Direction::South)
    }
}

/// Marks a live agent; queried constantly so kept as its own marker rather
/// than inferred from `Health::is_alive` (agents can be garrisoned with
/// full health but absent from the grid).
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Dead(pub bool);

/// Reference to the agent's home altar, used by the respawn system.
#[derive(Component, Debug, Clone, Copy)]
pub struct HomeAltar(pub Option<Entity>);

/// Command slots writable only by the external control API (spec §3, §6).
/// Internal AI/action systems must never mutate these directly.
#[derive(Component, Debug, Clone, Default)]
pub struct CommandSlots {
    pub attack_move: Option<Position>,
    pub patrol: Vec<Position>,
    pub hold_position: Option<Position>,
    pub follow_target: Option<Entity>,
    pub rally_building: Option<Entity>,
    pub scout_mode: bool,
}

/// Whether an agent is garrisoned inside a building (removed from the grid
/// but not from the entity pool — spec §4.7).
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Garrisoned(pub bool);

/// Monk faith, recharged in step 8 and spent on heals/converts.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Faith {
    pub current: f32,
    pub max: f32,
}

impl Default for Faith {
    fn default() -> Self {
        Self {
            current: 100.0,
            max: 100.0,
        }
    }
}

/// Post-death timeline (spec §4.13: Dead → Corpse(N) → Skeleton(M) → removed).
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum DeathTimeline {
    Corpse { steps_left: u32 },
    Skeleton { steps_left: u32 },
}

/// Bundle for a freshly-spawned agent.
#[derive(Bundle)]
pub struct AgentBundle {
    pub position: Position,
    pub kind: Kind,
    pub owned: Owned,
    pub stable_id: StableIdComp,
    pub health: Health,
    pub armor: Armor,
    pub cooldown: Cooldown,
    pub frozen: FrozenCounter,
    pub invalid_count: ActionInvalidCount,
    pub inventory: Inventory,
    pub class: Class,
    pub facing: Facing,
    pub stance: Stance,
    pub dead: Dead,
    pub home_altar: HomeAltar,
    pub commands: CommandSlots,
    pub garrisoned: Garrisoned,
    pub faith: Faith,
}

impl AgentBundle {
    pub fn new(pos: Position, owner: Owner, class: UnitClass, max_hp: i32, home_altar: Option<Entity>) -> Self {
        Self {
            position: pos,
            kind: Kind(EntityKind::Agent),
            owned: Owned(owner),
            stable_id: StableIdComp(StableId(0)),
            health: Health::new(max_hp),
            armor: Armor::default(),
            cooldown: Cooldown::default(),
            frozen: FrozenCounter::default(),
            invalid_count: ActionInvalidCount::default(),
            inventory: Inventory::with_cap(crate::config::constants::INVENTORY_CAP),
            class: Class(class),
            facing: Facing::default(),
            stance: Stance::default(),
            dead: Dead(false),
            home_altar: HomeAltar(home_altar),
            commands: CommandSlots::default(),
            garrisoned: Garrisoned(false),
            faith: Faith::default(),
        }
    }
}

// ============================================================================
// BUILDING COMPONENTS
// ============================================================================

/// Placement → construction cooldown → functional (spec §4.13).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingState {
    Placed,
    Functional,
    Destroyed,
}

#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConstructionTimer(pub u32);

/// A single queued production entry with per-entry progress.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueEntry {
    pub unit_class: UnitClass,
    pub progress: u32,
    pub duration: u32,
}

/// Bounded ordered production queue (spec §4.7, cap `PRODUCTION_QUEUE_CAP`).
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionQueue {
    pub entries: std::collections::VecDeque<QueueEntry>,
}

impl ProductionQueue {
    pub fn is_full(&self) -> bool {
        self.entries.len() >= crate::config::constants::PRODUCTION_QUEUE_CAP
    }
}

/// Rally point: external-API-only, does not influence internal AI (spec §4.7).
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RallyPoint(pub Option<Position>);

/// Garrison: capacity plus interior occupant list. Used for agent garrisons
/// (TC/Castle/Tower/House) and relic garrisons (Monastery) alike — callers
/// distinguish by building kind.
#[derive(Component, Debug, Clone, Default)]
pub struct Garrison {
    pub capacity: u32,
    pub occupants: Vec<Entity>,
}

impl Garrison {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            occupants: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.occupants.len() as u32 >= self.capacity
    }
}

/// Research lock: a building under research cannot be used for other
/// purposes until `steps_left` reaches zero (spec §4.7).
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResearchInProgress {
    pub tech_id: u32,
    pub steps_left: u32,
}

/// Per-building market/production/research cooldown; distinct from
/// per-agent `Cooldown`.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BuildingCooldown(pub u32);

#[derive(Bundle)]
pub struct BuildingBundle {
    pub position: Position,
    pub kind: Kind,
    pub owned: Owned,
    pub stable_id: StableIdComp,
    pub health: Health,
    pub state: BuildingState,
    pub construction: ConstructionTimer,
    pub rally: RallyPoint,
    pub cooldown: BuildingCooldown,
}

impl BuildingBundle {
    pub fn new(pos: Position, kind: EntityKind, owner: Owner, max_hp: i32) -> Self {
        Self {
            position: pos,
            kind: Kind(kind),
            owned: Owned(owner),
            stable_id: StableIdComp(StableId(0)),
            health: Health::new(max_hp),
            state: BuildingState::Functional,
            construction: ConstructionTimer::default(),
            rally: RallyPoint::default(),
            cooldown: BuildingCooldown::default(),
        }
    }
}

// ============================================================================
// RESOURCE NODES, OVERLAYS, NPCS
// ============================================================================

/// Harvestable resource node inventory (self-destructs at 0, spec §4.3).
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceAmount(pub u32);

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanternColor(pub Owner);

/// Tumor age; gates branching eligibility (spec §4.9).
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TumorAge(pub u32);

#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Claimed(pub bool);

/// Marks a tumor that has branched and gone inert but remains standing.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Inert(pub bool);

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WildlifeSpecies {
    Cow,
    Wolf,
    Bear,
}

/// Wildlife herd/pack id; cows and wolves share a target via this id.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PackId(pub u32);

#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IsPackAlpha(pub bool);

// ============================================================================
// SHORT-LIVED EFFECTS (spec §4.1 step 1)
// ============================================================================

/// Generic countdown for any of the twelve short-lived effect kinds listed
/// in spec §4.1 step 1; the entity is despawned when it reaches zero.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EffectLifetime(pub u32);

/// Per-class action-tint color code written at an action's effect tile.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActionTintCode(pub u8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_damage_clamps_at_zero() {
        let mut h = Health::new(10);
        let applied = h.damage(15);
        assert_eq!(applied, 10);
        assert_eq!(h.current, 0);
        assert!(!h.is_alive());
    }

    #[test]
    fn inventory_add_respects_cap() {
        let mut inv = Inventory::with_cap(5);
        let added = inv.add(ItemKind::Wood, 8);
        assert_eq!(added, 5);
        assert!(inv.is_full());
    }

    #[test]
    fn inventory_take_fails_when_insufficient() {
        let mut inv = Inventory::with_cap(10);
        inv.add(ItemKind::Gold, 2);
        assert!(!inv.take(ItemKind::Gold, 3));
        assert!(inv.take(ItemKind::Gold, 2));
        assert_eq!(inv.count(ItemKind::Gold), 0);
    }

    #[test]
    fn direction_vectors_are_unit_or_diagonal() {
        for d in Direction::ALL {
            let (dx, dy) = d.vector();
            assert!(dx.abs() <= 1 && dy.abs() <= 1);
        }
    }
}
