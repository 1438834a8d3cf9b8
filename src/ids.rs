//! Stable identifiers and closed enums (spec §3, §9).
//!
//! Cyclic references (agent ↔ altar ↔ team) are resolved as stable integer
//! ids plus dense arrays, never as object graphs: teams are a fixed
//! `[Team; 8]` indexed by `TeamId`, and cross-step references such as
//! "home altar" are a plain `Entity` handle stored on the `Agent` component.

use bevy_ecs::prelude::Entity;
use serde::{Deserialize, Serialize};

/// Team slot, `-1` (neutral/hostile NPC) represented separately as `None`.
pub type TeamId = u8;
pub const MAX_TEAMS: usize = 8;
pub const NEUTRAL: i8 = -1;

/// Either a team slot or neutral, matching the spec's `[-1, 7]` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner(pub i8);

impl Owner {
    pub const NEUTRAL: Owner = Owner(NEUTRAL);

    pub fn team(id: TeamId) -> Self {
        Owner(id as i8)
    }

    pub fn is_neutral(self) -> bool {
        self.0 < 0
    }

    pub fn team_id(self) -> Option<TeamId> {
        if self.0 < 0 {
            None
        } else {
            Some(self.0 as TeamId)
        }
    }

    pub fn is_hostile_to(self, other: Owner) -> bool {
        match (self.team_id(), other.team_id()) {
            (Some(a), Some(b)) => a != b,
            _ => true,
        }
    }
}

/// Closed catalog of entity kinds (spec §3: "~60 kinds: agents, buildings,
/// resources, overlays, effects"). Dynamic dispatch on kind is a match over
/// this enum, never runtime reflection (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Agent,

    // --- buildings: the 25-entry build catalog (spec §4.3 verb 8) ---
    House,
    TownCenter,
    Mill,
    LumberCamp,
    Quarry,
    Granary,
    Dock,
    Market,
    Barracks,
    ArcheryRange,
    Stable,
    SiegeWorkshop,
    Castle,
    Outpost,
    Wall,
    Road,
    Blacksmith,
    Monastery,
    University,
    Door,
    ClayOven,
    WeavingLoom,
    Barrel,
    GuardTower,
    MangonelWorkshop,

    // --- map-init-only structures, not in the build catalog ---
    Altar,
    Temple,
    Wonder,

    // --- resource nodes ---
    TreeNode,
    WheatPlant,
    GoldMine,
    StoneDeposit,
    BerryBush,

    // --- overlays ---
    Lantern,
    Cliff,
    ControlPoint,
    Relic,

    // --- short-lived effects (decayed in step 1) ---
    ActionTint,
    Projectile,
    DamageNumber,
    Ragdoll,
    Debris,
    SpawnAnimation,
    DeathAnimation,
    Sparkle,
    Dust,
    TrailMarker,
    WaterRipple,
    Shield,

    // --- NPC wildlife / clippy ---
    Tumor,
    GoblinHive,
    Cow,
    Wolf,
    Bear,

    // --- post-death agent states ---
    Corpse,
    Skeleton,
}

impl EntityKind {
    pub fn is_blocking(self) -> bool {
        use EntityKind::*;
        matches!(
            self,
            Agent
                | House
                | TownCenter
                | Mill
                | LumberCamp
                | Quarry
                | Granary
                | Dock
                | Market
                | Barracks
                | ArcheryRange
                | Stable
                | SiegeWorkshop
                | Castle
                | Outpost
                | Wall
                | Blacksmith
                | Monastery
                | University
                | ClayOven
                | WeavingLoom
                | Barrel
                | GuardTower
                | MangonelWorkshop
                | Altar
                | Temple
                | Wonder
                | TreeNode
                | GoldMine
                | StoneDeposit
                | BerryBush
                | GoblinHive
                | Cow
                | Wolf
                | Bear
        )
    }

    pub fn is_building(self) -> bool {
        use EntityKind::*;
        matches!(
            self,
            House
                | TownCenter
                | Mill
                | LumberCamp
                | Quarry
                | Granary
                | Dock
                | Market
                | Barracks
                | ArcheryRange
                | Stable
                | SiegeWorkshop
                | Castle
                | Outpost
                | Wall
                | Road
                | Blacksmith
                | Monastery
                | University
                | Door
                | ClayOven
                | WeavingLoom
                | Barrel
                | GuardTower
                | MangonelWorkshop
                | Altar
                | Temple
                | Wonder
        )
    }

    pub fn is_garrisonable(self) -> bool {
        matches!(
            self,
            EntityKind::TownCenter
                | EntityKind::Castle
                | EntityKind::GuardTower
                | EntityKind::House
                | EntityKind::Monastery
        )
    }

    pub fn is_resource_node(self) -> bool {
        matches!(
            self,
            EntityKind::TreeNode
                | EntityKind::WheatPlant
                | EntityKind::GoldMine
                | EntityKind::StoneDeposit
                | EntityKind::BerryBush
        )
    }

    pub fn is_short_lived_effect(self) -> bool {
        use EntityKind::*;
        matches!(
            self,
            ActionTint
                | Projectile
                | DamageNumber
                | Ragdoll
                | Debris
                | SpawnAnimation
                | DeathAnimation
                | Sparkle
                | Dust
                | TrailMarker
                | WaterRipple
                | Shield
        )
    }
}

/// The 25-entry build catalog (spec §4.3 verb 8), in argument order.
pub const BUILD_CATALOG: [EntityKind; 25] = [
    EntityKind::House,
    EntityKind::TownCenter,
    EntityKind::Mill,
    EntityKind::LumberCamp,
    EntityKind::Quarry,
    EntityKind::Granary,
    EntityKind::Dock,
    EntityKind::Market,
    EntityKind::Barracks,
    EntityKind::ArcheryRange,
    EntityKind::Stable,
    EntityKind::SiegeWorkshop,
    EntityKind::Castle,
    EntityKind::Outpost,
    EntityKind::Wall,
    EntityKind::Road,
    EntityKind::Blacksmith,
    EntityKind::Monastery,
    EntityKind::University,
    EntityKind::Door,
    EntityKind::ClayOven,
    EntityKind::WeavingLoom,
    EntityKind::Barrel,
    EntityKind::GuardTower,
    EntityKind::MangonelWorkshop,
];

/// Closed catalog of agent unit classes (spec §3: "~30 classes").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitClass {
    Villager,
    ManAtArms,
    Spearman,
    Pikeman,
    Archer,
    Crossbowman,
    EliteArcher,
    HorseArcher,
    Scout,
    Knight,
    Cavalier,
    Champion,
    Camel,
    WarElephant,
    Monk,
    King,
    Ram,
    Mangonel,
    Trebuchet,
    Petard,
    TransportBoat,
    WarGalley,
    FireShip,
    Samurai,
    Conquistador,
    Janissary,
    Longbowman,
    Huskarl,
    Trader,
    Goblin,
}

impl UnitClass {
    pub fn is_boat(self) -> bool {
        matches!(
            self,
            UnitClass::TransportBoat | UnitClass::WarGalley | UnitClass::FireShip
        )
    }

    pub fn is_cavalry(self) -> bool {
        matches!(
            self,
            UnitClass::Scout
                | UnitClass::Knight
                | UnitClass::Cavalier
                | UnitClass::Camel
                | UnitClass::WarElephant
                | UnitClass::Conquistador
        )
    }

    pub fn is_siege(self) -> bool {
        matches!(
            self,
            UnitClass::Ram | UnitClass::Mangonel | UnitClass::Trebuchet | UnitClass::Petard
        )
    }

    pub fn is_archer(self) -> bool {
        matches!(
            self,
            UnitClass::Archer
                | UnitClass::Crossbowman
                | UnitClass::EliteArcher
                | UnitClass::HorseArcher
                | UnitClass::Longbowman
        )
    }

    pub fn is_monk(self) -> bool {
        matches!(self, UnitClass::Monk)
    }

    pub fn is_tank_aura_source(self) -> Option<i32> {
        match self {
            UnitClass::ManAtArms => Some(1),
            UnitClass::Knight => Some(2),
            _ => None,
        }
    }
}

/// Stable per-entity integer id for cross-step references and determinism
/// tie-breaks (spec §4.4: "ties broken by entity id"). Distinct from the
/// `bevy_ecs::Entity` handle, which is not guaranteed stable across
/// despawn/respawn generations in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StableId(pub u32);

/// Maps a `StableId` back to the live `Entity`, if still alive.
#[derive(Debug, Default, Clone, bevy_ecs::prelude::Resource)]
pub struct StableIdRegistry {
    map: std::collections::HashMap<u32, Entity>,
    next: u32,
}

impl StableIdRegistry {
    pub fn allocate(&mut self, entity: Entity) -> StableId {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        self.map.insert(id, entity);
        StableId(id)
    }

    pub fn resolve(&self, id: StableId) -> Option<Entity> {
        self.map.get(&id.0).copied()
    }

    pub fn release(&mut self, id: StableId) {
        self.map.remove(&id.0);
    }
}
