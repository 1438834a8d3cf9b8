//! Team state (spec §3: "Team — eight slots").

use crate::ids::MAX_TEAMS;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Stockpile {
    pub food: u32,
    pub wood: u32,
    pub stone: u32,
    pub gold: u32,
    pub water: u32,
}

/// Per-team market price vector against gold (spec §4.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketPrices {
    pub food: f32,
    pub wood: f32,
    pub stone: f32,
}

impl Default for MarketPrices {
    fn default() -> Self {
        Self {
            food: 1.0,
            wood: 1.0,
            stone: 1.0,
        }
    }
}

/// Per-team modifiers (spec §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TeamModifiers {
    pub gather_rate_multiplier: f32,
    pub build_cost_multiplier: f32,
    pub unit_hp_bonus: i32,
    pub unit_attack_bonus: i32,
}

impl Default for TeamModifiers {
    fn default() -> Self {
        Self {
            gather_rate_multiplier: 1.0,
            build_cost_multiplier: 1.0,
            unit_hp_bonus: 0,
            unit_attack_bonus: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Standard,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Standard
    }
}

/// Relic-hold and king-of-the-hill progress, reset on loss/contest
/// (spec §4.11).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VictoryState {
    pub relic_hold_steps: u64,
    pub wonder_built_step: Option<u64>,
    pub hill_control_steps: HashMap_<u32, u64>,
    pub eliminated: bool,
}

// Keep the map keyed by control-point index without pulling HashMap into
// every call site that only cares about the struct shape.
pub type HashMap_<K, V> = std::collections::HashMap<K, V>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub color: [u8; 3],
    pub stockpile: Stockpile,
    pub research: HashSet<u32>,
    /// Fog-of-war: one bit per tile, row-major. `Vec<bool>` rather than a
    /// packed bitset — the spec calls it a "bitmap" but never requires the
    /// packed representation, and `Vec<bool>` keeps query sites simple.
    pub fog: Vec<bool>,
    pub market: MarketPrices,
    pub difficulty: Difficulty,
    pub victory: VictoryState,
    pub modifiers: TeamModifiers,
    pub pop_cap: u32,
    pub pop_count: u32,
}

impl Team {
    pub fn new(color: [u8; 3], map_tiles: usize) -> Self {
        Self {
            color,
            stockpile: Stockpile::default(),
            research: HashSet::new(),
            fog: vec![false; map_tiles],
            market: MarketPrices::default(),
            difficulty: Difficulty::default(),
            victory: VictoryState::default(),
            modifiers: TeamModifiers::default(),
            pop_cap: 0,
            pop_count: 0,
        }
    }
}

/// All eight team slots (spec §3). A fixed-size array, not a growable
/// collection, matching the spec's "eight slots" and the "dense arrays"
/// resolution of cyclic references in §9.
#[derive(Resource, Debug, Clone)]
pub struct Teams(pub [Team; MAX_TEAMS]);

impl Teams {
    pub fn new(map_tiles: usize) -> Self {
        let default_colors: [[u8; 3]; MAX_TEAMS] = [
            [220, 40, 40],
            [40, 90, 220],
            [40, 180, 80],
            [220, 200, 40],
            [180, 60, 200],
            [40, 200, 200],
            [230, 140, 40],
            [140, 140, 140],
        ];
        let teams = std::array::from_fn(|i| Team::new(default_colors[i], map_tiles));
        Self(teams)
    }

    pub fn get(&self, id: crate::ids::TeamId) -> &Team {
        &self.0[id as usize]
    }

    pub fn get_mut(&mut self, id: crate::ids::TeamId) -> &mut Team {
        &mut self.0[id as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teams_have_eight_slots() {
        let teams = Teams::new(100);
        assert_eq!(teams.0.len(), MAX_TEAMS);
    }

    #[test]
    fn stockpile_defaults_to_zero() {
        let team = Team::new([0, 0, 0], 10);
        assert_eq!(team.stockpile.food, 0);
    }
}
