//! Simulation configuration.
//!
//! Mirrors the teacher's `SimConfig` resource (`systems/performance.rs`) but
//! extended with every option recognized by the external interface (spec §6):
//! episode limits, reward weights, and the active victory condition.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Which victory predicate(s) the episode honors (spec §6, §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VictoryCondition {
    None,
    Conquest,
    Wonder,
    Relic,
    Regicide,
    KingOfTheHill,
    /// Any of the five predicates may end the episode.
    Any,
}

impl Default for VictoryCondition {
    fn default() -> Self {
        Self::Any
    }
}

/// Per-episode reward weights (spec §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RewardWeights {
    pub heart_reward: f32,
    pub ore_reward: f32,
    pub bar_reward: f32,
    pub wood_reward: f32,
    pub water_reward: f32,
    pub wheat_reward: f32,
    pub spear_reward: f32,
    pub armor_reward: f32,
    pub food_reward: f32,
    pub cloth_reward: f32,
    pub tumor_kill_reward: f32,
    pub survival_penalty: f32,
    pub death_penalty: f32,
    pub victory_reward: f32,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            heart_reward: 1.0,
            ore_reward: 0.5,
            bar_reward: 0.75,
            wood_reward: 0.25,
            water_reward: 0.25,
            wheat_reward: 0.25,
            spear_reward: 0.5,
            armor_reward: 0.5,
            food_reward: 0.25,
            cloth_reward: 0.5,
            tumor_kill_reward: 1.0,
            survival_penalty: -0.001,
            death_penalty: -1.0,
            victory_reward: 10.0,
        }
    }
}

/// Top-level simulation configuration resource.
///
/// Combines the spec's external-interface options with the teacher's own
/// ambient performance knobs (fixed timestep, sector size, LOD distances),
/// which are scheduling concerns rather than spec features and are carried
/// unconditionally per the ambient-stack rule.
#[derive(Resource, Debug, Clone)]
pub struct SimConfig {
    /// Number of agent slots addressed by the action buffer.
    pub map_agents: usize,
    /// Per-team population ceiling (spec §4.10).
    pub map_agents_per_team: u32,
    /// Grid width in tiles (spec §3, ≈305).
    pub map_width: i32,
    /// Grid height in tiles (spec §3, ≈191).
    pub map_height: i32,
    /// Maximum steps before truncation.
    pub max_steps: u64,
    /// RNG seed.
    pub seed: u64,
    /// Spawner tumor production rate (probability per eligible tick).
    pub tumor_spawn_rate: f32,
    /// Reward weights.
    pub rewards: RewardWeights,
    /// Active victory condition.
    pub victory_condition: VictoryCondition,
    /// Spatial index base cell size in tiles (spec §4.5).
    pub cell_size: i32,
    /// Documented no-op hook for the "adaptive" difficulty mode (spec §9
    /// open question — no driving signal specified, so this flag is
    /// stored but never read by any system).
    pub adaptive_difficulty: bool,

    // --- ambient performance knobs, teacher-derived ---
    /// Fixed timestep in seconds for the outer `step(dt)` accumulator.
    pub fixed_timestep: f32,
    /// Size of LOD/sector batching cells, in tiles.
    pub sector_size: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            map_agents: 8 * 300,
            map_agents_per_team: 300,
            map_width: 305,
            map_height: 191,
            max_steps: 10_000,
            seed: 0,
            tumor_spawn_rate: 0.02,
            rewards: RewardWeights::default(),
            victory_condition: VictoryCondition::Any,
            cell_size: 16,
            adaptive_difficulty: false,
            fixed_timestep: 1.0 / 30.0,
            sector_size: 40.0,
        }
    }
}

/// Constants that the spec calls out by name rather than leaving tunable.
pub mod constants {
    pub const ARCHER_BASE_RANGE: i32 = 5;
    pub const TRAIL_DECAY: f32 = 6.0;
    pub const TRAIL_STRENGTH_AGENT: f32 = 90.0;
    pub const TRAIL_STRENGTH_LANTERN: f32 = 60.0;
    pub const TUMOR_INCREMENT_BASE: f32 = 40.0;
    pub const STRENGTH_CAP: f32 = 255.0;
    pub const FREEZE_TOLERANCE: f32 = 24.0;
    pub const NEUTRAL_THRESHOLD: f32 = 16.0;
    pub const TOTAL_RELICS_ON_MAP: u32 = 5;
    pub const RELIC_VICTORY_COUNTDOWN: u64 = 1000;
    pub const WONDER_VICTORY_COUNTDOWN: u64 = 1000;
    pub const HILL_CONTROL_RADIUS: i32 = 6;
    pub const HILL_VICTORY_COUNTDOWN: u64 = 500;
    pub const TUMOR_BRANCH_MIN_AGE: u32 = 50;
    pub const TUMOR_BRANCH_CHANCE: f32 = 0.01;
    pub const MONASTERY_RELIC_GOLD_INTERVAL: u64 = 50;
    pub const MARKET_PRICE_DECAY_INTERVAL: u64 = 100;
    pub const MARKET_MIN_PRICE: f32 = 0.2;
    pub const MARKET_MAX_PRICE: f32 = 5.0;
    pub const PRODUCTION_QUEUE_CAP: usize = 10;
    pub const INVENTORY_CAP: u32 = 20;
    pub const GARRISON_BONUS_CAP: u32 = 5;
}
