//! Public API for the simulation (spec §4.1, §6).
//!
//! `SimWorld` owns the `bevy_ecs::World` and drives one deterministic step
//! per call to `step`, in the fixed fifteen-step order spec §4.1 names.
//! Grounded in the teacher's `SimWorld`: same shape (owns `World` + a small
//! set of scheduling resources, exposes `step`/`snapshot`-style reads), but
//! turn-based instead of fixed-timestep-accumulator driven — an RL action
//! buffer arrives once per step rather than a wall-clock `dt`.

use bevy_ecs::prelude::*;
use rand::Rng;
use tracing::{debug, info};

use crate::action;
use crate::buildings;
use crate::combat::{self, DeathGuard};
use crate::components::*;
use crate::config::SimConfig;
use crate::error::{ErrorSlot, SimResult};
use crate::grid::{BackgroundGrid, BlockingGrid, TerrainGrid};
use crate::ids::{EntityKind, StableIdRegistry};
use crate::market;
use crate::npc;
use crate::observation::{self, AgentObservation};
use crate::population;
use crate::rng::{SimRng, Stream};
use crate::spatial::SpatialIndex;
use crate::team::Teams;
use crate::tint::{self, TintAccumulation, TintField};
use crate::victory::{self, VictoryOutcome};
use crate::world::{self, Reward, StepIndex};

/// The main simulation world container (spec §4.2, §5).
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    tick: u64,
    done: bool,
    winner: Option<VictoryOutcome>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Self {
        let mut world = World::new();
        let tiles = (config.map_width * config.map_height) as usize;

        world.insert_resource(TerrainGrid::new(config.map_width, config.map_height));
        world.insert_resource(BlockingGrid::new(config.map_width, config.map_height));
        world.insert_resource(BackgroundGrid::new(config.map_width, config.map_height));
        world.insert_resource(SpatialIndex::new(config.cell_size));
        world.insert_resource(TintField::new(config.map_width, config.map_height));
        world.insert_resource(Teams::new(tiles));
        world.insert_resource(StableIdRegistry::default());
        world.insert_resource(SimRng::new(config.seed));
        world.insert_resource(DeathGuard::default());
        world.insert_resource(ErrorSlot::default());
        world.insert_resource(observation::ObservationDirty::default());
        world.insert_resource(StepIndex(0));
        world.insert_resource(crate::control::Selection::default());
        world.insert_resource(config);

        let mut schedule = Schedule::default();
        schedule.add_systems(crate::spatial::spatial_index_update_system);

        Self {
            world,
            schedule,
            tick: 0,
            done: false,
            winner: None,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn winner(&self) -> Option<VictoryOutcome> {
        self.winner
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Advances the simulation by exactly one step, executing `actions`
    /// (one encoded byte per living agent, matched to agents in the
    /// shuffled order spec §4.1 step 4 describes) and running the fixed
    /// fifteen-step pipeline (spec §4.1).
    pub fn step(&mut self, actions: &[u8]) -> SimResult<()> {
        if self.done {
            return Ok(());
        }
        if let Some(fatal) = self.world.resource::<ErrorSlot>().fatal.clone() {
            return Err(fatal);
        }

        self.world.resource_mut::<StepIndex>().0 = self.tick;

        // 1. decay short-lived effects
        world::decay_short_lived_effects(&mut self.world);
        // 2. pre-action death sweep
        world::death_sweep(&mut self.world);
        // 3. recompute population
        population::recompute_population(&mut self.world);

        // 4. shuffled action execution
        self.run_action_phase(actions);

        // 5. per-step entity tick
        self.schedule.run(&mut self.world);
        buildings::run_building_tick(&mut self.world);
        self.run_research_tick();
        npc::run_wildlife_tick(&mut self.world, self.tick);
        self.run_tower_volleys();
        self.run_tumor_spawn();
        npc::run_goblin_hive_tick(&mut self.world, self.tick);
        self.run_trade_cog_income();

        // 6. tumor branching/spread
        npc::run_tumor_tick(&mut self.world, self.tick);
        // 7. tumor adjacency damage
        self.run_tumor_adjacency_damage();
        // 8. tank/monk auras + faith recharge
        self.run_aura_and_faith_pass();
        // 9. post-combat death sweep
        world::death_sweep(&mut self.world);
        world::advance_death_timelines(&mut self.world);
        // 10. respawn
        population::run_respawn_tick(&mut self.world);
        population::update_elimination_state(&mut self.world);
        // 11. temple hybrid requests
        self.run_temple_hybrid_pass();
        // 12. survival reward
        world::apply_survival_reward(&mut self.world);
        // 13. tint field recompute
        self.recompute_tint();
        // 14. victory monitors
        self.winner = victory::evaluate_victory(&mut self.world, self.tick);
        // 15. termination / dirty flag
        self.world.resource_mut::<DeathGuard>().clear();
        let max_steps = self.world.resource::<SimConfig>().max_steps;
        if self.winner.is_some() || self.tick + 1 >= max_steps {
            self.done = true;
            info!(tick = self.tick, winner = ?self.winner, "episode terminated");
        } else {
            self.world.resource_mut::<observation::ObservationDirty>().mark_env_dirty();
        }

        self.tick += 1;
        Ok(())
    }

    fn run_action_phase(&mut self, actions: &[u8]) {
        let mut living: Vec<(Entity, u32)> = {
            let mut query = self.world.query::<(Entity, &Dead, &StableIdComp)>();
            query
                .iter(&self.world)
                .filter(|(_, dead, _)| !dead.0)
                .map(|(e, _, sid)| (e, sid.0 .0))
                .collect()
        };
        let mut rng = self.world.resource::<SimRng>().stream(self.tick, Stream::Shuffle);
        crate::rng::shuffle_in_place(&mut living, &mut rng);

        let mut action_rng = self.world.resource::<SimRng>().stream(self.tick, Stream::Misc);
        for (entity, stable_id) in living {
            let byte = actions.get(stable_id as usize).copied().unwrap_or(0);
            action::dispatch(&mut self.world, entity, byte, self.tick, &mut action_rng);
        }
    }

    /// Tower/castle auto-attack volleys (spec §4.1 step 5, §4.4): each
    /// garrisonable defensive building with a ready cooldown fires at the
    /// nearest enemy agent in range, with interior garrison occupants
    /// absorbing bonus arrows up to `GARRISON_BONUS_CAP`.
    fn run_tower_volleys(&mut self) {
        let towers: Vec<(Entity, Position, crate::ids::Owner)> = {
            let mut query = self.world.query::<(Entity, &Position, &Owned, &Kind, &mut BuildingCooldown)>();
            let mut ready = Vec::new();
            for (entity, pos, owned, kind, mut cooldown) in query.iter_mut(&mut self.world) {
                if !matches!(kind.0, EntityKind::GuardTower | EntityKind::Castle | EntityKind::TownCenter) {
                    continue;
                }
                if cooldown.0 > 0 {
                    cooldown.0 -= 1;
                    continue;
                }
                ready.push((entity, *pos, owned.0));
            }
            ready
        };

        for (tower, pos, owner) in towers {
            let target = {
                let index = self.world.resource::<SpatialIndex>();
                index.nearest_enemy_agent(pos, owner, 8)
            };
            let Some(target) = target else { continue };

            let bonus_arrows = self
                .world
                .get::<Garrison>(tower)
                .map(|g| g.occupants.len().min(crate::config::constants::GARRISON_BONUS_CAP as usize) as i32)
                .unwrap_or(0);
            let dmg = combat::base_damage(crate::ids::UnitClass::Archer) + bonus_arrows;
            let armor = self.world.get::<Armor>(target.entity).copied().unwrap_or_default();

            let killed = self.world.resource_scope(|world, mut guard: Mut<DeathGuard>| {
                let mut query = world.query::<(&mut Health, &mut Dead)>();
                if let Ok((mut health, mut dead)) = query.get_mut(world, target.entity) {
                    combat::apply_agent_damage(target.entity, &mut health, &armor, &mut dead, &mut guard, dmg)
                } else {
                    false
                }
            });

            if let Some(mut cooldown) = self.world.get_mut::<BuildingCooldown>(tower) {
                cooldown.0 = 10;
            }
            debug!(?tower, target = ?target.entity, dmg, killed, "tower volley");
        }
    }

    /// Rate-gated tumor spawning at map-init dune patches (spec §4.1 step 5,
    /// §4.9): each step, every `Dune` tile rolls `tumor_spawn_rate` against
    /// the misc substream.
    fn run_tumor_spawn(&mut self) {
        let rate = self.world.resource::<SimConfig>().tumor_spawn_rate;
        if rate <= 0.0 {
            return;
        }
        let mut rng = self.world.resource::<SimRng>().stream(self.tick, Stream::Misc);
        let dune_tiles: Vec<Position> = {
            let terrain = self.world.resource::<TerrainGrid>();
            let mut tiles = Vec::new();
            for y in 0..terrain.height {
                for x in 0..terrain.width {
                    let pos = Position::new(x, y);
                    if terrain.terrain_at(pos) == crate::grid::TerrainType::Dune && rng.gen::<f32>() < rate {
                        tiles.push(pos);
                    }
                }
            }
            tiles
        };
        for pos in dune_tiles {
            if self.world.resource::<BlockingGrid>().0.is_occupied(pos) {
                continue;
            }
            let tumor = self
                .world
                .spawn((
                    Position::new(pos.x, pos.y),
                    Kind(EntityKind::Tumor),
                    Owned(crate::ids::Owner::NEUTRAL),
                    TumorAge::default(),
                    Claimed::default(),
                    Inert::default(),
                    Health::new(20),
                ))
                .id();
            self.world.resource_mut::<BlockingGrid>().0.place(pos, tumor);
            self.world.resource_mut::<SpatialIndex>().insert(tumor, pos, EntityKind::Tumor, crate::ids::Owner::NEUTRAL);
        }
    }

    /// Tumor adjacency damage: living agents/wildlife standing adjacent to
    /// an active tumor take a small probabilistic tick of damage, blocked
    /// by an active shield effect (spec §4.1 step 7).
    fn run_tumor_adjacency_damage(&mut self) {
        let tumors: Vec<Position> = {
            let mut query = self.world.query::<(&Position, &Kind, &Inert)>();
            query
                .iter(&self.world)
                .filter(|(_, kind, inert)| kind.0 == EntityKind::Tumor && !inert.0)
                .map(|(p, _, _)| *p)
                .collect()
        };
        if tumors.is_empty() {
            return;
        }
        let mut rng = self.world.resource::<SimRng>().stream(self.tick, Stream::Misc);

        for pos in tumors {
            let victims: Vec<Entity> = {
                let index = self.world.resource::<SpatialIndex>();
                let mut out = Vec::new();
                index.for_each_in_radius(pos, EntityKind::Agent, 1, |e| out.push(e.entity));
                out
            };
            for victim in victims {
                if rng.gen::<f32>() >= 0.1 {
                    continue;
                }
                let victim_pos = self.world.get::<Position>(victim).copied().unwrap_or(pos);
                let shielded = {
                    let index = self.world.resource::<SpatialIndex>();
                    index.nearest(victim_pos, EntityKind::Shield, 0).is_some()
                };
                if shielded {
                    continue;
                }
                let armor = self.world.get::<Armor>(victim).copied().unwrap_or_default();
                self.world.resource_scope(|world, mut guard: Mut<DeathGuard>| {
                    let mut query = world.query::<(&mut Health, &mut Dead)>();
                    if let Ok((mut health, mut dead)) = query.get_mut(world, victim) {
                        combat::apply_agent_damage(victim, &mut health, &armor, &mut dead, &mut guard, 1);
                    }
                });
            }
        }
    }

    /// Tank defensive auras, monk healing auras, and faith recharge
    /// (spec §4.1 step 8): non-stacking, last-writer-wins when bands
    /// overlap (see DESIGN.md Open Question resolution).
    fn run_aura_and_faith_pass(&mut self) {
        let monks: Vec<(Entity, Position, crate::ids::Owner)> = {
            let mut query = self.world.query::<(Entity, &Position, &Owned, &Class)>();
            query
                .iter(&self.world)
                .filter(|(_, _, _, class)| class.0.is_monk())
                .map(|(e, p, o, _)| (e, *p, o.0))
                .collect()
        };

        for (monk, pos, owner) in &monks {
            if let Some(mut faith) = self.world.get_mut::<Faith>(*monk) {
                faith.current = (faith.current + 0.5).min(faith.max);
            }
            let wounded: Vec<Entity> = {
                let index = self.world.resource::<SpatialIndex>();
                let mut out = Vec::new();
                index.for_each_in_radius(*pos, EntityKind::Agent, 2, |e| {
                    if e.owner == *owner {
                        out.push(e.entity);
                    }
                });
                out
            };
            for ally in wounded {
                if let Some(mut health) = self.world.get_mut::<Health>(ally) {
                    if health.current < health.max {
                        health.heal(1);
                    }
                }
            }
        }
    }

    /// Temple hybrid requests (spec §4.1 step 11): two friendly agents
    /// adjacent to a Temple, with a heart available, consume it and enqueue
    /// a new villager at the temple.
    fn run_temple_hybrid_pass(&mut self) {
        let temples: Vec<(Entity, Position, crate::ids::Owner)> = {
            let mut query = self.world.query::<(Entity, &Position, &Owned, &Kind)>();
            query
                .iter(&self.world)
                .filter(|(_, _, _, kind)| kind.0 == EntityKind::Temple)
                .map(|(e, p, o, _)| (e, *p, o.0))
                .collect()
        };

        for (_temple, pos, owner) in temples {
            let team_id = match owner.team_id() {
                Some(t) => t,
                None => continue,
            };
            let adjacent_friendlies = {
                let index = self.world.resource::<SpatialIndex>();
                let mut count = 0;
                index.for_each_in_radius(pos, EntityKind::Agent, 1, |e| {
                    if e.owner == owner {
                        count += 1;
                    }
                });
                count
            };
            if adjacent_friendlies < 2 {
                continue;
            }
            let has_heart = self.world.resource::<Teams>().get(team_id).stockpile.food > 0;
            if !has_heart {
                continue;
            }
            let (pop_count, pop_cap) = {
                let team = self.world.resource::<Teams>().get(team_id);
                (team.pop_count, team.pop_cap)
            };
            if pop_count >= pop_cap {
                continue;
            }
            if let Some(free) = first_free_adjacent(&self.world, pos) {
                self.world.resource_mut::<Teams>().get_mut(team_id).stockpile.food -= 1;
                let villager = world::create_agent(&mut self.world, free, owner, crate::ids::UnitClass::Villager, 25, None);
                if let Ok(villager) = villager {
                    debug!(?villager, "temple hybrid spawn");
                }
            }
        }
    }

    fn recompute_tint(&mut self) {
        let (agents, lanterns, tumors) = {
            let mut agent_q = self.world.query::<(&Position, &Owned, &Kind)>();
            let mut agents = Vec::new();
            let mut lanterns = Vec::new();
            let mut tumors = Vec::new();
            for (pos, owned, kind) in agent_q.iter(&self.world) {
                match kind.0 {
                    EntityKind::Agent => agents.push((*pos, owned.0)),
                    EntityKind::Lantern => lanterns.push((*pos, owned.0)),
                    EntityKind::Tumor => tumors.push(*pos),
                    _ => {}
                }
            }
            (agents, lanterns, tumors)
        };

        let contrib = TintAccumulation { agents, lanterns, tumors };
        let terrain = self.world.resource::<TerrainGrid>().clone();
        let teams = self.world.resource::<Teams>().clone();
        let mut field = self.world.resource_mut::<TintField>();
        tint::recompute_tint_field(&mut field, &terrain, &teams, &contrib);
    }

    fn run_trade_cog_income(&mut self) {
        let traders: Vec<Entity> = {
            let mut query = self.world.query::<(Entity, &Class)>();
            query.iter(&self.world).filter(|(_, c)| c.0 == crate::ids::UnitClass::Trader).map(|(e, _)| e).collect()
        };
        for trader in traders {
            let owner = self.world.get::<Owned>(trader).map(|o| o.0);
            if let Some(team_id) = owner.and_then(|o| o.team_id()) {
                self.world.resource_mut::<Teams>().get_mut(team_id).stockpile.gold += 1;
            }
        }
        let mut teams = self.world.resource_mut::<Teams>();
        market::decay_market_prices(&mut teams, self.tick);
    }

    /// Rebuilds (or returns the cached) observation slice for `agent`,
    /// honoring the lazy-rebuild gate: first run, agent moved, or the
    /// environment-wide dirty flag (spec §4.12).
    pub fn observation_for(&mut self, agent: Entity) -> AgentObservation {
        let terrain = self.world.resource::<TerrainGrid>().clone();
        let blocking = self.world.resource::<BlockingGrid>().clone();
        let background = self.world.resource::<BackgroundGrid>().clone();
        let tint = self.world.resource::<TintField>().clone();
        let teams = self.world.resource::<Teams>().clone();
        observation::build_agent_observation(&self.world, agent, &terrain, &blocking, &background, &tint, &teams)
    }

    pub fn reward_for(&self, agent: Entity) -> f32 {
        self.world.get::<Reward>(agent).map(|r| r.0).unwrap_or(0.0)
    }

    pub fn take_reward(&mut self, agent: Entity) -> f32 {
        if let Some(mut reward) = self.world.get_mut::<Reward>(agent) {
            let value = reward.0;
            reward.0 = 0.0;
            value
        } else {
            0.0
        }
    }

    pub fn error_slot(&self) -> &ErrorSlot {
        self.world.resource::<ErrorSlot>()
    }

    /// Per-agent terminated flag (spec §6 `u8[MapAgents]` terminated
    /// buffer): set once the episode is done, except for the winning
    /// team's own agents, which read `truncated` instead (spec §8
    /// scenario 4: "team-0 agents truncated, others terminated").
    pub fn terminated_for(&self, agent: Entity) -> bool {
        if !self.done {
            return false;
        }
        match self.winner {
            Some(VictoryOutcome::Winner(team)) => self.world.get::<Owned>(agent).map(|o| o.0.team_id() != Some(team)).unwrap_or(true),
            _ => true,
        }
    }

    /// Per-agent truncated flag: set for the winning team's own agents when
    /// a winner was declared, and for every agent when the episode ended by
    /// hitting `max_steps` without a winner (spec §6, §8).
    pub fn truncated_for(&self, agent: Entity) -> bool {
        if !self.done {
            return false;
        }
        match self.winner {
            Some(VictoryOutcome::Winner(team)) => self.world.get::<Owned>(agent).map(|o| o.0.team_id() == Some(team)).unwrap_or(false),
            None => true,
        }
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn first_free_adjacent(world: &World, pos: Position) -> Option<Position> {
    let blocking = world.resource::<BlockingGrid>();
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
    fn fresh_world_is_not_done() {
        let sim = SimWorld::new();
        assert!(!sim.is_done());
        assert_eq!(sim.tick(), 0);
    }

    #[test]
    fn step_with_no_actions_advances_tick() {
        let mut sim = SimWorld::new();
        sim.step(&[]).unwrap();
        assert_eq!(sim.tick(), 1);
    }

    #[test]
    fn episode_terminates_at_max_steps() {
        let mut config = SimConfig::default();
        config.max_steps = 3;
        let mut sim = SimWorld::with_config(config);
        for _ in 0..3 {
            sim.step(&[]).unwrap();
        }
        assert!(sim.is_done());
    }
}
