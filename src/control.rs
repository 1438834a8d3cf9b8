//! External control API (spec §6): per-agent orders, garrison, production
//! queue, research, rally points, selection/control-group bookkeeping,
//! formation, market, fog-of-war and threat queries, team modifiers,
//! territory scoring, difficulty, and the FFI error slot — all callable
//! between `step()` calls, never mid-step (spec §5).
//!
//! Grounded in the teacher's control surface (`order_move`,
//! `order_attack_move`, `spawn_tree`, `damage_destructible`, …): one
//! inherent method on `SimWorld` per concern, routing failures through
//! `ErrorSlot` via `fail_not_found`/`fail_capacity` instead of panicking,
//! matching spec §7's "recovered locally" handling for `NotFound` and
//! `CapacityExceeded`.

use bevy_ecs::prelude::*;

use crate::api::SimWorld;
use crate::buildings;
use crate::components::*;
use crate::error::SimError;
use crate::ids::{EntityKind, TeamId, UnitClass};
use crate::market;
use crate::spatial::SpatialEntry;
use crate::team::{Difficulty, TeamModifiers};

/// External-only selection/control-group bookkeeping (spec §6). The sim
/// core has no notion of "selected" units; this resource exists purely so
/// embedders can issue commands to a named group without re-threading
/// entity lists through the action buffer.
#[derive(Resource, Debug, Default)]
pub struct Selection {
    pub selected: Vec<Entity>,
    pub groups: [Vec<Entity>; 10],
}

impl SimWorld {
    fn fail_not_found(&mut self, what: &str) {
        self.world_mut().resource_mut::<crate::error::ErrorSlot>().set(SimError::NotFound(what.to_string()));
    }

    fn fail_capacity(&mut self, what: &str) {
        self.world_mut().resource_mut::<crate::error::ErrorSlot>().set(SimError::CapacityExceeded(what.to_string()));
    }

    fn agent_exists(&self, agent: Entity) -> bool {
        self.world().get_entity(agent).is_some()
    }

    // ---- per-agent orders (spec §6) -----------------------------------

    /// Sets an attack-move destination, clearing any conflicting order.
    pub fn set_attack_move(&mut self, agent: Entity, to: Position) -> bool {
        if !self.agent_exists(agent) {
            self.fail_not_found("agent");
            return false;
        }
        if let Some(mut cmd) = self.world_mut().get_mut::<CommandSlots>(agent) {
            cmd.attack_move = Some(to);
            cmd.patrol.clear();
            cmd.hold_position = None;
            cmd.follow_target = None;
            true
        } else {
            false
        }
    }

    /// Appends a patrol waypoint (spec §6 "patrol (with waypoint append)").
    pub fn append_patrol(&mut self, agent: Entity, waypoint: Position) -> bool {
        if !self.agent_exists(agent) {
            self.fail_not_found("agent");
            return false;
        }
        if let Some(mut cmd) = self.world_mut().get_mut::<CommandSlots>(agent) {
            cmd.patrol.push(waypoint);
            true
        } else {
            false
        }
    }

    pub fn set_stance(&mut self, agent: Entity, stance: Stance) -> bool {
        if let Some(mut s) = self.world_mut().get_mut::<Stance>(agent) {
            *s = stance;
            true
        } else {
            self.fail_not_found("agent");
            false
        }
    }

    pub fn set_hold_position(&mut self, agent: Entity, at: Position) -> bool {
        if let Some(mut cmd) = self.world_mut().get_mut::<CommandSlots>(agent) {
            cmd.hold_position = Some(at);
            cmd.attack_move = None;
            cmd.patrol.clear();
            cmd.follow_target = None;
            true
        } else {
            self.fail_not_found("agent");
            false
        }
    }

    pub fn set_follow(&mut self, agent: Entity, target: Entity) -> bool {
        if !self.agent_exists(target) {
            self.fail_not_found("follow target");
            return false;
        }
        if let Some(mut cmd) = self.world_mut().get_mut::<CommandSlots>(agent) {
            cmd.follow_target = Some(target);
            cmd.attack_move = None;
            cmd.hold_position = None;
            cmd.patrol.clear();
            true
        } else {
            self.fail_not_found("agent");
            false
        }
    }

    /// Clears every standing order (spec §6 "stop").
    pub fn stop(&mut self, agent: Entity) -> bool {
        if let Some(mut cmd) = self.world_mut().get_mut::<CommandSlots>(agent) {
            *cmd = CommandSlots::default();
            true
        } else {
            self.fail_not_found("agent");
            false
        }
    }

    pub fn set_scout_mode(&mut self, agent: Entity, enabled: bool) -> bool {
        if let Some(mut cmd) = self.world_mut().get_mut::<CommandSlots>(agent) {
            cmd.scout_mode = enabled;
            true
        } else {
            self.fail_not_found("agent");
            false
        }
    }

    // ---- garrison (spec §6) --------------------------------------------

    /// Garrisons `agent` inside `building`, failing with `CapacityExceeded`
    /// if the garrison is full.
    pub fn garrison_in(&mut self, agent: Entity, building: Entity) -> bool {
        let mut garrison = match self.world_mut().get_mut::<Garrison>(building) {
            Some(g) => g,
            None => {
                self.fail_not_found("building");
                return false;
            }
        };
        if garrison.is_full() {
            drop(garrison);
            self.fail_capacity("garrison");
            return false;
        }
        garrison.occupants.push(agent);
        drop(garrison);
        if let Some(mut garrisoned) = self.world_mut().get_mut::<Garrisoned>(agent) {
            garrisoned.0 = true;
        }
        true
    }

    /// Ejects every occupant of `building` back onto its tile (spec §6
    /// "ungarrison-all").
    pub fn ungarrison_all(&mut self, building: Entity) -> bool {
        let (pos, occupants) = {
            let world = self.world();
            let pos = match world.get::<Position>(building) {
                Some(p) => *p,
                None => {
                    self.fail_not_found("building");
                    return false;
                }
            };
            let occupants = world.get::<Garrison>(building).map(|g| g.occupants.clone()).unwrap_or_default();
            (pos, occupants)
        };
        for occupant in &occupants {
            if let Some(mut garrisoned) = self.world_mut().get_mut::<Garrisoned>(*occupant) {
                garrisoned.0 = false;
            }
            if let Some(mut op) = self.world_mut().get_mut::<Position>(*occupant) {
                *op = pos;
            }
        }
        if let Some(mut garrison) = self.world_mut().get_mut::<Garrison>(building) {
            garrison.occupants.clear();
        }
        true
    }

    // ---- production queue & research (spec §6) -------------------------

    pub fn queue_train(&mut self, building: Entity, class: UnitClass) -> bool {
        if buildings::queue_train(self.world_mut(), building, class) {
            true
        } else {
            self.fail_capacity("production queue");
            false
        }
    }

    pub fn cancel_last_queued(&mut self, building: Entity) -> bool {
        buildings::cancel_last_queued(self.world_mut(), building)
    }

    pub fn queue_size(&self, building: Entity) -> Option<usize> {
        self.world().get::<ProductionQueue>(building).map(|q| q.entries.len())
    }

    /// `(progress, duration)` of the front queue entry, if any.
    pub fn queue_progress(&self, building: Entity) -> Option<(u32, u32)> {
        self.world().get::<ProductionQueue>(building).and_then(|q| q.entries.front()).map(|e| (e.progress, e.duration))
    }

    /// Starts research on `building` for `tech_id`, failing if it already
    /// has research in progress.
    pub fn start_research(&mut self, building: Entity, tech_id: u32, duration_steps: u32) -> bool {
        if self.world().get::<ResearchInProgress>(building).is_some() {
            self.fail_capacity("research slot occupied");
            return false;
        }
        if self.world().get::<Position>(building).is_none() {
            self.fail_not_found("building");
            return false;
        }
        self.world_mut().entity_mut(building).insert(ResearchInProgress {
            tech_id,
            steps_left: duration_steps.max(1),
        });
        true
    }

    pub fn has_research(&self, team: TeamId, tech_id: u32) -> bool {
        self.world().resource::<crate::team::Teams>().get(team).research.contains(&tech_id)
    }

    /// Ticks every building's `ResearchInProgress`, completing finished
    /// entries into the owning team's research set (spec §9 "Production-
    /// queue and research ticks").
    pub(crate) fn run_research_tick(&mut self) {
        let mut completed: Vec<(Entity, TeamId, u32)> = Vec::new();
        {
            let world = self.world_mut();
            let mut query = world.query::<(Entity, &Owned, &mut ResearchInProgress)>();
            for (entity, owned, mut research) in query.iter_mut(world) {
                research.steps_left = research.steps_left.saturating_sub(1);
                if research.steps_left == 0 {
                    if let Some(team) = owned.0.team_id() {
                        completed.push((entity, team, research.tech_id));
                    }
                }
            }
        }
        for (entity, team, tech_id) in &completed {
            self.world_mut().resource_mut::<crate::team::Teams>().get_mut(*team).research.insert(*tech_id);
            self.world_mut().entity_mut(*entity).remove::<ResearchInProgress>();
        }
    }

    // ---- rally point (spec §6) -----------------------------------------

    pub fn set_rally_point(&mut self, building: Entity, at: Position) -> bool {
        if let Some(mut rally) = self.world_mut().get_mut::<RallyPoint>(building) {
            rally.0 = Some(at);
            true
        } else {
            self.fail_not_found("building");
            false
        }
    }

    pub fn clear_rally_point(&mut self, building: Entity) -> bool {
        if let Some(mut rally) = self.world_mut().get_mut::<RallyPoint>(building) {
            rally.0 = None;
            true
        } else {
            self.fail_not_found("building");
            false
        }
    }

    pub fn rally_point(&self, building: Entity) -> Option<Position> {
        self.world().get::<RallyPoint>(building).and_then(|r| r.0)
    }

    // ---- selection & control groups (spec §6) --------------------------

    pub fn select(&mut self, units: &[Entity]) {
        self.world_mut().resource_mut::<Selection>().selected = units.to_vec();
    }

    pub fn select_add(&mut self, unit: Entity) {
        let mut sel = self.world_mut().resource_mut::<Selection>();
        if !sel.selected.contains(&unit) {
            sel.selected.push(unit);
        }
    }

    pub fn select_remove(&mut self, unit: Entity) {
        self.world_mut().resource_mut::<Selection>().selected.retain(|&e| e != unit);
    }

    pub fn selected(&self) -> Vec<Entity> {
        self.world().resource::<Selection>().selected.clone()
    }

    pub fn create_group(&mut self, slot: usize) -> bool {
        let selected = self.world().resource::<Selection>().selected.clone();
        let mut sel = self.world_mut().resource_mut::<Selection>();
        match sel.groups.get_mut(slot) {
            Some(group) => {
                *group = selected;
                true
            }
            None => false,
        }
    }

    pub fn recall_group(&mut self, slot: usize) -> Vec<Entity> {
        self.world().resource::<Selection>().groups.get(slot).cloned().unwrap_or_default()
    }

    /// Issues `order` to every currently selected unit (spec §6
    /// "issue-command-to-selection"). `order` receives each selected
    /// entity and decides how to route it.
    pub fn issue_command_to_selection(&mut self, mut order: impl FnMut(&mut SimWorld, Entity)) {
        let selected = self.world().resource::<Selection>().selected.clone();
        for unit in selected {
            order(self, unit);
        }
    }

    // ---- formation (spec §6) -------------------------------------------

    /// Sets a uniform facing for every member of control group `slot`
    /// (spec §6 "formation set/clear/rotation per control group").
    pub fn set_formation_facing(&mut self, slot: usize, facing: Direction) -> bool {
        let group = self.world().resource::<Selection>().groups.get(slot).cloned().unwrap_or_default();
        if group.is_empty() {
            return false;
        }
        for unit in group {
            if let Some(mut f) = self.world_mut().get_mut::<Facing>(unit) {
                f.0 = facing;
            }
        }
        true
    }

    pub fn clear_formation(&mut self, slot: usize) -> bool {
        match self.world_mut().resource_mut::<Selection>().groups.get_mut(slot) {
            Some(group) => {
                group.clear();
                true
            }
            None => false,
        }
    }

    pub fn rotate_formation(&mut self, slot: usize) -> bool {
        let group = self.world().resource::<Selection>().groups.get(slot).cloned().unwrap_or_default();
        if group.is_empty() {
            return false;
        }
        for unit in group {
            if let Some(mut f) = self.world_mut().get_mut::<Facing>(unit) {
                f.0 = f.0.rotated_clockwise();
            }
        }
        true
    }

    // ---- market (spec §6) ------------------------------------------------

    /// Sells `qty` units of `item` from the team stockpile for gold at the
    /// current team price, nudging that price down (spec §6 "market
    /// buy/sell"). Unlike `market::trade`, this reads from the team
    /// stockpile directly rather than an agent's inventory.
    pub fn market_sell(&mut self, team: TeamId, item: ItemKind, qty: u32) -> Option<u32> {
        let world = self.world_mut();
        let mut teams = world.resource_mut::<crate::team::Teams>();
        let stock = &mut teams.get_mut(team).stockpile;
        let available = match item {
            ItemKind::Food => &mut stock.food,
            ItemKind::Wood => &mut stock.wood,
            ItemKind::Stone => &mut stock.stone,
            _ => return None,
        };
        if *available < qty {
            return None;
        }
        *available -= qty;
        let price = market::price_for_team(&teams.get(team).market, item);
        let gold = (price * qty as f32).round().max(1.0) as u32;
        teams.get_mut(team).stockpile.gold += gold;
        let market_prices = &mut teams.get_mut(team).market;
        market::nudge_price_down_team(market_prices, item);
        Some(gold)
    }

    /// Buys `qty` units of `item` with gold at the current team price.
    pub fn market_buy(&mut self, team: TeamId, item: ItemKind, qty: u32) -> bool {
        let world = self.world_mut();
        let mut teams = world.resource_mut::<crate::team::Teams>();
        let price = market::price_for_team(&teams.get(team).market, item);
        let cost = (price * qty as f32).round().max(1.0) as u32;
        let stock = &mut teams.get_mut(team).stockpile;
        if stock.gold < cost {
            return false;
        }
        stock.gold -= cost;
        match item {
            ItemKind::Food => stock.food += qty,
            ItemKind::Wood => stock.wood += qty,
            ItemKind::Stone => stock.stone += qty,
            _ => return false,
        }
        true
    }

    pub fn market_price(&self, team: TeamId, item: ItemKind) -> f32 {
        market::price_for_team(&self.world().resource::<crate::team::Teams>().get(team).market, item)
    }

    // ---- fog-of-war queries (spec §6) -----------------------------------

    pub fn is_visible(&self, team: TeamId, pos: Position) -> bool {
        let terrain = self.world().resource::<crate::grid::TerrainGrid>();
        if !terrain.in_bounds(pos.x, pos.y) {
            return false;
        }
        let idx = (pos.y * terrain.width + pos.x) as usize;
        self.world().resource::<crate::team::Teams>().get(team).fog.get(idx).copied().unwrap_or(false)
    }

    // ---- threat-map queries (spec §6) -----------------------------------

    pub fn nearest_threat(&self, pos: Position, owner: crate::ids::Owner, max_dist: i32) -> Option<SpatialEntry> {
        self.world().resource::<crate::spatial::SpatialIndex>().nearest_enemy_agent(pos, owner, max_dist)
    }

    pub fn threats_in_range(&self, pos: Position, owner: crate::ids::Owner, radius: i32) -> Vec<SpatialEntry> {
        let index = self.world().resource::<crate::spatial::SpatialIndex>();
        let mut out = Vec::new();
        index.for_each_in_radius(pos, EntityKind::Agent, radius, |e| {
            if owner.is_hostile_to(e.owner) {
                out.push(*e);
            }
        });
        out
    }

    pub fn threat_at(&self, pos: Position, owner: crate::ids::Owner) -> bool {
        self.nearest_threat(pos, owner, 0).is_some()
    }

    // ---- team modifiers, territory, difficulty (spec §6) -----------------

    pub fn team_modifiers(&self, team: TeamId) -> TeamModifiers {
        self.world().resource::<crate::team::Teams>().get(team).modifiers
    }

    pub fn set_team_modifiers(&mut self, team: TeamId, modifiers: TeamModifiers) {
        self.world_mut().resource_mut::<crate::team::Teams>().get_mut(team).modifiers = modifiers;
    }

    /// Per-team tint-territory control score, indexed `[0..=MAX_TEAMS]`
    /// with index `MAX_TEAMS` holding the contested/neutral count.
    pub fn territory_scores(&self) -> Vec<u32> {
        let world = self.world();
        let tint = world.resource::<crate::tint::TintField>();
        let teams = world.resource::<crate::team::Teams>();
        tint.territory_scores(teams)
    }

    pub fn difficulty(&self, team: TeamId) -> Difficulty {
        self.world().resource::<crate::team::Teams>().get(team).difficulty
    }

    pub fn set_difficulty(&mut self, team: TeamId, difficulty: Difficulty) {
        self.world_mut().resource_mut::<crate::team::Teams>().get_mut(team).difficulty = difficulty;
    }

    /// Documented no-op hook (spec §9 "adaptive difficulty"): toggles the
    /// config flag but nothing currently reads it besides this getter.
    pub fn set_adaptive_difficulty(&mut self, enabled: bool) {
        self.world_mut().resource_mut::<crate::config::SimConfig>().adaptive_difficulty = enabled;
    }

    pub fn adaptive_difficulty(&self) -> bool {
        self.world().resource::<crate::config::SimConfig>().adaptive_difficulty
    }

    // ---- FFI error query/clear (spec §6, §7) ------------------------------

    pub fn has_error(&self) -> bool {
        self.world().resource::<crate::error::ErrorSlot>().has_error()
    }

    pub fn get_error_kind(&self) -> Option<&'static str> {
        self.world().resource::<crate::error::ErrorSlot>().get_error_kind()
    }

    pub fn get_error_message(&self) -> Option<String> {
        self.world().resource::<crate::error::ErrorSlot>().get_error_message()
    }

    pub fn clear_error(&mut self) {
        self.world_mut().resource_mut::<crate::error::ErrorSlot>().clear_error();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::create_agent;

    #[test]
    fn stop_clears_all_standing_orders() {
        let mut sim = SimWorld::new();
        let agent = create_agent(sim.world_mut(), Position::new(1, 1), crate::ids::Owner::team(0), UnitClass::Villager, 25, None).unwrap();
        sim.set_attack_move(agent, Position::new(5, 5));
        assert!(sim.stop(agent));
        let cmd = sim.world().get::<CommandSlots>(agent).unwrap();
        assert!(cmd.attack_move.is_none());
    }

    #[test]
    fn garrison_in_respects_capacity() {
        let mut sim = SimWorld::new();
        let tc = buildings::spawn_building(sim.world_mut(), EntityKind::GuardTower, crate::ids::Owner::team(0), Position::new(2, 2), 0);
        let agents: Vec<Entity> = (0..6).map(|i| create_agent(sim.world_mut(), Position::new(3 + i, 2), crate::ids::Owner::team(0), UnitClass::Villager, 25, None).unwrap()).collect();
        for a in &agents[..5] {
            assert!(sim.garrison_in(*a, tc));
        }
        assert!(!sim.garrison_in(agents[5], tc));
        assert!(sim.has_error());
    }

    #[test]
    fn selection_and_control_group_round_trip() {
        let mut sim = SimWorld::new();
        let a = create_agent(sim.world_mut(), Position::new(1, 1), crate::ids::Owner::team(0), UnitClass::Villager, 25, None).unwrap();
        sim.select(&[a]);
        assert!(sim.create_group(0));
        assert_eq!(sim.recall_group(0), vec![a]);
    }

    #[test]
    fn market_sell_then_buy_round_trips_gold() {
        let mut sim = SimWorld::new();
        sim.world_mut().resource_mut::<crate::team::Teams>().get_mut(0).stockpile.wood = 10;
        let gold = sim.market_sell(0, ItemKind::Wood, 5).unwrap();
        assert!(gold > 0);
        assert_eq!(sim.world().resource::<crate::team::Teams>().get(0).stockpile.wood, 5);
    }
}
