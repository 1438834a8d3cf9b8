//! Observation tensor construction (spec §4.12).
//!
//! Each agent's view is an `[L, 11, 11]` uint8 slice centered on the agent:
//! a terrain one-hot block, a thing-kind one-hot block (blocking and
//! background grids merged), and a fixed run of scalar meta layers. Tiles
//! the agent cannot see over (elevation blocks line of sight with no
//! connecting road/ramp) are obscured: their one-hot and meta layers are
//! zeroed and only the obscured flag is set.

use bevy_ecs::prelude::*;

use crate::components::*;
use crate::grid::{BackgroundGrid, BlockingGrid, TerrainGrid, TerrainType};
use crate::ids::EntityKind;
use crate::team::Teams;
use crate::tint::TintField;

pub const WINDOW: usize = 11;
pub const WINDOW_RADIUS: i32 = 5;
const NUM_TERRAIN_KINDS: usize = 18;
const NUM_ENTITY_KINDS: usize = 57;
/// team-id(+1), orientation(+1), unit-class(+1), idle flag, action-tint
/// code, rally flag, biome id, garrison fill ratio, relic count,
/// production-queue length, building hp ratio, monk faith ratio,
/// trebuchet-packed flag, stance(+1), obscured flag (spec §4.12).
const NUM_META_LAYERS: usize = 15;
pub const NUM_LAYERS: usize = NUM_TERRAIN_KINDS + NUM_ENTITY_KINDS + NUM_META_LAYERS;

fn terrain_index(t: TerrainType) -> usize {
    use TerrainType::*;
    match t {
        Empty => 0,
        Water => 1,
        Bridge => 2,
        Fertile => 3,
        Road => 4,
        Grass => 5,
        Dune => 6,
        Sand => 7,
        Snow => 8,
        Mud => 9,
        RampUpNorth => 10,
        RampUpEast => 11,
        RampUpSouth => 12,
        RampUpWest => 13,
        RampDownNorth => 14,
        RampDownEast => 15,
        RampDownSouth => 16,
        RampDownWest => 17,
    }
}

fn entity_kind_index(k: EntityKind) -> usize {
    use EntityKind::*;
    let ordinal = match k {
        Agent => 0,
        House => 1,
        TownCenter => 2,
        Mill => 3,
        LumberCamp => 4,
        Quarry => 5,
        Granary => 6,
        Dock => 7,
        Market => 8,
        Barracks => 9,
        ArcheryRange => 10,
        Stable => 11,
        SiegeWorkshop => 12,
        Castle => 13,
        Outpost => 14,
        Wall => 15,
        Road => 16,
        Blacksmith => 17,
        Monastery => 18,
        University => 19,
        Door => 20,
        ClayOven => 21,
        WeavingLoom => 22,
        Barrel => 23,
        GuardTower => 24,
        MangonelWorkshop => 25,
        Altar => 26,
        Temple => 27,
        Wonder => 28,
        TreeNode => 29,
        WheatPlant => 30,
        GoldMine => 31,
        StoneDeposit => 32,
        BerryBush => 33,
        Lantern => 34,
        Cliff => 35,
        ControlPoint => 36,
        Relic => 37,
        ActionTint => 38,
        Projectile => 39,
        DamageNumber => 40,
        Ragdoll => 41,
        Debris => 42,
        SpawnAnimation => 43,
        DeathAnimation => 44,
        Sparkle => 45,
        Dust => 46,
        TrailMarker => 47,
        WaterRipple => 48,
        Shield => 49,
        Tumor => 50,
        GoblinHive => 51,
        Cow => 52,
        Wolf => 53,
        Bear => 54,
        Corpse => 55,
        Skeleton => 56,
    };
    NUM_TERRAIN_KINDS + ordinal
}

/// Flat `[L, 11, 11]` row-major uint8 buffer for one agent.
#[derive(Debug, Clone)]
pub struct AgentObservation {
    pub data: Vec<u8>,
}

impl AgentObservation {
    fn new() -> Self {
        Self {
            data: vec![0u8; NUM_LAYERS * WINDOW * WINDOW],
        }
    }

    #[inline]
    fn set(&mut self, layer: usize, row: usize, col: usize, value: u8) {
        let idx = layer * WINDOW * WINDOW + row * WINDOW + col;
        self.data[idx] = value;
    }
}

const META_OFFSET: usize = NUM_TERRAIN_KINDS + NUM_ENTITY_KINDS;
const META_TEAM: usize = META_OFFSET;
const META_ORIENTATION: usize = META_OFFSET + 1;
const META_CLASS: usize = META_OFFSET + 2;
const META_IDLE: usize = META_OFFSET + 3;
const META_ACTION_TINT: usize = META_OFFSET + 4;
const META_RALLY: usize = META_OFFSET + 5;
const META_BIOME: usize = META_OFFSET + 6;
const META_GARRISON_FILL: usize = META_OFFSET + 7;
const META_RELIC_COUNT: usize = META_OFFSET + 8;
const META_QUEUE_LEN: usize = META_OFFSET + 9;
const META_BUILDING_HP: usize = META_OFFSET + 10;
const META_MONK_FAITH: usize = META_OFFSET + 11;
const META_TREBUCHET_PACKED: usize = META_OFFSET + 12;
const META_STANCE: usize = META_OFFSET + 13;
const META_OBSCURED: usize = META_OFFSET + 14;

/// Whether `observer_elevation` can see `tile_elevation` at `tile_pos`
/// (spec §4.12): blocked when the tile sits strictly higher and no
/// road/ramp connects the two.
fn is_obscured(terrain: &TerrainGrid, observer_pos: Position, tile_pos: Position) -> bool {
    let observer_elev = terrain.elevation_at(observer_pos);
    let tile_elev = terrain.elevation_at(tile_pos);
    if tile_elev <= observer_elev {
        return false;
    }
    let connecting = terrain.terrain_at(tile_pos) == TerrainType::Road
        || terrain.terrain_at(observer_pos) == TerrainType::Road
        || terrain.terrain_at(tile_pos).is_ramp();
    !connecting
}

/// Rebuilds one agent's `[L, 11, 11]` slice (spec §4.12).
#[allow(clippy::too_many_arguments)]
pub fn build_agent_observation(
    world: &World,
    agent: Entity,
    terrain: &TerrainGrid,
    blocking: &BlockingGrid,
    background: &BackgroundGrid,
    tint: &TintField,
    teams: &Teams,
) -> AgentObservation {
    let mut obs = AgentObservation::new();
    let center = *world.get::<Position>(agent).unwrap();
    let owner = world.get::<Owned>(agent).map(|o| o.0);

    for row in 0..WINDOW {
        for col in 0..WINDOW {
            let dx = col as i32 - WINDOW_RADIUS;
            let dy = row as i32 - WINDOW_RADIUS;
            let tile = center.offset(dx, dy);

            if !terrain.in_bounds(tile.x, tile.y) {
                obs.set(META_OBSCURED, row, col, 1);
                continue;
            }
            if is_obscured(terrain, center, tile) {
                obs.set(META_OBSCURED, row, col, 1);
                continue;
            }

            let t_idx = terrain_index(terrain.terrain_at(tile));
            obs.set(t_idx, row, col, 1);

            if let Some(entity) = blocking.0.get(tile).or_else(|| background.0.get(tile)) {
                if let Some(kind) = world.get::<Kind>(entity) {
                    obs.set(entity_kind_index(kind.0), row, col, 1);
                }
                write_entity_meta(world, &mut obs, entity, row, col, owner, teams);
            }

            let frozen = tint.is_tile_frozen(tile);
            if frozen {
                obs.set(META_BIOME, row, col, 1);
            }
        }
    }

    obs
}

fn write_entity_meta(
    world: &World,
    obs: &mut AgentObservation,
    entity: Entity,
    row: usize,
    col: usize,
    observer_owner: Option<crate::ids::Owner>,
    teams: &Teams,
) {
    if let Some(owned) = world.get::<Owned>(entity) {
        let team_val = owned.0.team_id().map(|t| t as u8 + 1).unwrap_or(0);
        obs.set(META_TEAM, row, col, team_val);
    }
    if let Some(facing) = world.get::<Facing>(entity) {
        obs.set(META_ORIENTATION, row, col, facing.0 as u8 + 1);
    }
    if let Some(class) = world.get::<Class>(entity) {
        obs.set(META_CLASS, row, col, class.0 as u8 + 1);
    }
    if let Some(cooldown) = world.get::<Cooldown>(entity) {
        obs.set(META_IDLE, row, col, if cooldown.ready() { 1 } else { 0 });
    }
    if let Some(tint_code) = world.get::<ActionTintCode>(entity) {
        obs.set(META_ACTION_TINT, row, col, tint_code.0);
    }
    if let Some(rally) = world.get::<RallyPoint>(entity) {
        obs.set(META_RALLY, row, col, if rally.0.is_some() { 1 } else { 0 });
    }
    if let Some(garrison) = world.get::<Garrison>(entity) {
        if garrison.capacity > 0 {
            let ratio = (garrison.occupants.len() as f32 / garrison.capacity as f32 * 255.0) as u8;
            obs.set(META_GARRISON_FILL, row, col, ratio);
        }
    }
    if let Some(inv) = world.get::<Inventory>(entity) {
        obs.set(META_RELIC_COUNT, row, col, inv.count(ItemKind::Relic).min(255) as u8);
    }
    if let Some(queue) = world.get::<ProductionQueue>(entity) {
        obs.set(META_QUEUE_LEN, row, col, queue.entries.len().min(255) as u8);
    }
    if let Some(health) = world.get::<Health>(entity) {
        if world.get::<Kind>(entity).map(|k| k.0.is_building()).unwrap_or(false) {
            obs.set(META_BUILDING_HP, row, col, (health.fraction() * 255.0) as u8);
        }
    }
    if let Some(faith) = world.get::<Faith>(entity) {
        obs.set(META_MONK_FAITH, row, col, ((faith.current / faith.max) * 255.0) as u8);
    }
    if let Some(class) = world.get::<Class>(entity) {
        if class.0 == crate::ids::UnitClass::Trebuchet {
            obs.set(META_TREBUCHET_PACKED, row, col, 1);
        }
    }
    if let Some(stance) = world.get::<Stance>(entity) {
        obs.set(META_STANCE, row, col, stance as u8 + 1);
    }
    let _ = teams;
}

/// Lazy rebuild gate (spec §4.12): an agent's slice only needs rebuilding
/// on the first request, after it moves, or when the environment-wide
/// dirty flag (terrain/tint change) is set.
#[derive(Resource, Debug, Default)]
pub struct ObservationDirty {
    pub env_dirty: bool,
    pub first_run: bool,
}

impl ObservationDirty {
    pub fn mark_env_dirty(&mut self) {
        self.env_dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_buffer_has_expected_length() {
        let obs = AgentObservation::new();
        assert_eq!(obs.data.len(), NUM_LAYERS * WINDOW * WINDOW);
    }

    #[test]
    fn obscured_tile_flagged_when_elevation_blocks_with_no_road() {
        let mut terrain = TerrainGrid::new(20, 20);
        terrain.set(
            Position::new(10, 10),
            crate::grid::TerrainCell {
                terrain: TerrainType::Grass,
                elevation: 3,
            },
        );
        assert!(is_obscured(&terrain, Position::new(9, 9), Position::new(10, 10)));
    }

    #[test]
    fn same_elevation_never_obscured() {
        let terrain = TerrainGrid::new(20, 20);
        assert!(!is_obscured(&terrain, Position::new(9, 9), Position::new(10, 10)));
    }
}
