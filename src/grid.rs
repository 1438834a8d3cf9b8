//! Terrain grid and the blocking/background entity grids (spec §3).
//!
//! Grounded in the teacher's `terrain.rs` (`TerrainGrid`, `TerrainType`,
//! `TerrainResource`) but re-purposed: the teacher's terrain carries a
//! deformable-damage model (craters, barrages) for a WWI battlefield, which
//! this RTS-style domain has no use for. What survives is the shape — a
//! `Vec`-backed grid addressed by `(x, y)` wrapped in a `Resource` — not the
//! crater mechanics.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerrainType {
    Empty,
    Water,
    Bridge,
    Fertile,
    Road,
    Grass,
    Dune,
    Sand,
    Snow,
    Mud,
    RampUpNorth,
    RampUpEast,
    RampUpSouth,
    RampUpWest,
    RampDownNorth,
    RampDownEast,
    RampDownSouth,
    RampDownWest,
}

impl TerrainType {
    pub fn is_ramp(self) -> bool {
        matches!(
            self,
            TerrainType::RampUpNorth
                | TerrainType::RampUpEast
                | TerrainType::RampUpSouth
                | TerrainType::RampUpWest
                | TerrainType::RampDownNorth
                | TerrainType::RampDownEast
                | TerrainType::RampDownSouth
                | TerrainType::RampDownWest
        )
    }

    pub fn blocks_boats(self) -> bool {
        !matches!(self, TerrainType::Water | TerrainType::Bridge)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TerrainCell {
    pub terrain: TerrainType,
    pub elevation: i8,
}

impl Default for TerrainCell {
    fn default() -> Self {
        Self {
            terrain: TerrainType::Grass,
            elevation: 0,
        }
    }
}

/// Per-tile terrain, immutable for the episode once map-init completes
/// (spec §3).
#[derive(Resource, Debug, Clone)]
pub struct TerrainGrid {
    pub width: i32,
    pub height: i32,
    cells: Vec<TerrainCell>,
}

impl TerrainGrid {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            cells: vec![TerrainCell::default(); (width * height) as usize],
        }
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// Border ring is always an impassable sentinel (spec §3).
    #[inline]
    pub fn is_border(&self, x: i32, y: i32) -> bool {
        x == 0 || y == 0 || x == self.width - 1 || y == self.height - 1
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    pub fn get(&self, pos: Position) -> Option<TerrainCell> {
        if self.in_bounds(pos.x, pos.y) {
            Some(self.cells[self.index(pos.x, pos.y)])
        } else {
            None
        }
    }

    pub fn set(&mut self, pos: Position, cell: TerrainCell) {
        if self.in_bounds(pos.x, pos.y) {
            let idx = self.index(pos.x, pos.y);
            self.cells[idx] = cell;
        }
    }

    pub fn elevation_at(&self, pos: Position) -> i8 {
        self.get(pos).map(|c| c.elevation).unwrap_or(0)
    }

    pub fn terrain_at(&self, pos: Position) -> TerrainType {
        self.get(pos).map(|c| c.terrain).unwrap_or(TerrainType::Empty)
    }

    /// Whether movement between adjacent tiles `from`→`to` is legal purely
    /// on elevation/road grounds (spec §4.3 verb 1): elevation delta greater
    /// than 1 is always impassable; a delta of exactly 1 requires road on
    /// either endpoint, and is forbidden on a diagonal step.
    pub fn elevation_allows_move(&self, from: Position, to: Position, diagonal: bool) -> bool {
        let delta = (self.elevation_at(to) - self.elevation_at(from)).abs();
        match delta {
            0 => true,
            1 => {
                if diagonal {
                    false
                } else {
                    self.terrain_at(from) == TerrainType::Road || self.terrain_at(to) == TerrainType::Road
                }
            }
            _ => false,
        }
    }
}

/// Either a blocking entity or background overlay grid (spec §3: "two
/// logical grids"). Generic over what "occupied" means so the same type
/// backs both.
#[derive(Debug, Clone)]
pub struct EntityGrid {
    width: i32,
    height: i32,
    cells: Vec<Option<Entity>>,
}

impl EntityGrid {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            cells: vec![None; (width * height) as usize],
        }
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x >= 0 && y >= 0 && x < self.width && y < self.height {
            Some((y * self.width + x) as usize)
        } else {
            None
        }
    }

    pub fn get(&self, pos: Position) -> Option<Entity> {
        self.index(pos.x, pos.y).and_then(|i| self.cells[i])
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        self.get(pos).is_some()
    }

    /// Places `entity` at `pos`. Returns `false` (no mutation) if the tile
    /// is already occupied by a different entity (spec §4.2: `PositionOccupied`).
    pub fn place(&mut self, pos: Position, entity: Entity) -> bool {
        match self.index(pos.x, pos.y) {
            Some(i) => {
                if self.cells[i].is_some() && self.cells[i] != Some(entity) {
                    false
                } else {
                    self.cells[i] = Some(entity);
                    true
                }
            }
            None => false,
        }
    }

    pub fn clear(&mut self, pos: Position) {
        if let Some(i) = self.index(pos.x, pos.y) {
            self.cells[i] = None;
        }
    }

    pub fn clear_entity(&mut self, entity: Entity) {
        for c in self.cells.iter_mut() {
            if *c == Some(entity) {
                *c = None;
            }
        }
    }
}

/// Blocking grid: at most one blocking entity per tile (spec §3).
#[derive(Resource, Debug, Clone)]
pub struct BlockingGrid(pub EntityGrid);

/// Background grid: doors, cliff pieces, lanterns (spec §3).
#[derive(Resource, Debug, Clone)]
pub struct BackgroundGrid(pub EntityGrid);

impl BlockingGrid {
    pub fn new(width: i32, height: i32) -> Self {
        Self(EntityGrid::new(width, height))
    }
}

impl BackgroundGrid {
    pub fn new(width: i32, height: i32) -> Self {
        Self(EntityGrid::new(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_tiles_are_impassable() {
        let grid = TerrainGrid::new(10, 10);
        assert!(grid.is_border(0, 5));
        assert!(grid.is_border(9, 5));
        assert!(!grid.is_border(5, 5));
    }

    #[test]
    fn elevation_delta_of_two_never_allowed() {
        let mut grid = TerrainGrid::new(10, 10);
        grid.set(
            Position::new(1, 1),
            TerrainCell {
                terrain: TerrainType::Grass,
                elevation: 1,
            },
        );
        grid.set(
            Position::new(1, 2),
            TerrainCell {
                terrain: TerrainType::Grass,
                elevation: -1,
            },
        );
        assert!(!grid.elevation_allows_move(Position::new(1, 1), Position::new(1, 2), false));
    }

    #[test]
    fn elevation_delta_one_requires_road_and_no_diagonal() {
        let mut grid = TerrainGrid::new(10, 10);
        grid.set(
            Position::new(1, 1),
            TerrainCell {
                terrain: TerrainType::Road,
                elevation: 0,
            },
        );
        grid.set(
            Position::new(1, 2),
            TerrainCell {
                terrain: TerrainType::Grass,
                elevation: 1,
            },
        );
        assert!(grid.elevation_allows_move(Position::new(1, 1), Position::new(1, 2), false));
        assert!(!grid.elevation_allows_move(Position::new(1, 1), Position::new(1, 2), true));
    }

    #[test]
    fn entity_grid_rejects_double_occupancy() {
        let mut grid = EntityGrid::new(5, 5);
        let e1 = Entity::from_raw(1);
        let e2 = Entity::from_raw(2);
        assert!(grid.place(Position::new(2, 2), e1));
        assert!(!grid.place(Position::new(2, 2), e2));
    }
}
