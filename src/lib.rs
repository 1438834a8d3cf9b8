//! Frontier Core - deterministic multi-agent RTS simulation engine.
//!
//! A fixed-step, turn-based ECS simulation built on `bevy_ecs`, designed as
//! the training backend for reinforcement-learning agents: a byte-encoded
//! action per living agent drives one `step()`, producing per-agent
//! observation tensors and rewards (spec §4.1, §6).

pub mod action;
pub mod buildings;
pub mod combat;
pub mod components;
pub mod config;
pub mod control;
pub mod error;
pub mod grid;
pub mod ids;
pub mod market;
pub mod npc;
pub mod observation;
pub mod population;
pub mod rng;
pub mod spatial;
pub mod team;
pub mod tint;
pub mod victory;
pub mod world;

pub mod api;

pub use api::SimWorld;
pub use components::*;
pub use config::{RewardWeights, SimConfig, VictoryCondition};
pub use error::{SimError, SimResult};
pub use ids::{EntityKind, Owner, StableId, TeamId, UnitClass, BUILD_CATALOG, MAX_TEAMS};
pub use observation::AgentObservation;
pub use spatial::{SpatialEntry, SpatialIndex};
pub use victory::VictoryOutcome;
pub use world::EntitySnapshot;
