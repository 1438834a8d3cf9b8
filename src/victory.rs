//! Victory monitors (spec §4.11): conquest, wonder, relic, regicide, and
//! king-of-the-hill, each gated by `SimConfig::victory_condition`.

use bevy_ecs::prelude::*;
use tracing::info;

use crate::components::*;
use crate::config::constants::{HILL_CONTROL_RADIUS, HILL_VICTORY_COUNTDOWN, RELIC_VICTORY_COUNTDOWN, WONDER_VICTORY_COUNTDOWN};
use crate::config::{SimConfig, VictoryCondition};
use crate::ids::{EntityKind, TeamId};
use crate::spatial::SpatialIndex;
use crate::team::Teams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VictoryOutcome {
    Winner(TeamId),
    Draw,
}

fn condition_active(config: &SimConfig, c: VictoryCondition) -> bool {
    config.victory_condition == c || config.victory_condition == VictoryCondition::Any
}

/// Conquest: the episode ends once only one team has any living agents or
/// standing structures (spec §4.11).
fn check_conquest(teams: &Teams) -> Option<VictoryOutcome> {
    let alive: Vec<TeamId> = teams
        .0
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.victory.eliminated)
        .map(|(i, _)| i as TeamId)
        .collect();
    match alive.len() {
        0 => Some(VictoryOutcome::Draw),
        1 => Some(VictoryOutcome::Winner(alive[0])),
        _ => None,
    }
}

/// Wonder: a team holding a completed wonder for `WONDER_VICTORY_COUNTDOWN`
/// consecutive steps wins (spec §4.11).
fn check_wonder(world: &World, teams: &mut Teams, step: u64) -> Option<VictoryOutcome> {
    let mut query = world.query::<(&Owned, &Kind, &BuildingState)>();
    let mut holder: Option<TeamId> = None;
    for (owned, kind, state) in query.iter(world) {
        if kind.0 == EntityKind::Wonder && *state == BuildingState::Functional {
            holder = owned.0.team_id();
            break;
        }
    }
    match holder {
        Some(team_id) => {
            let victory = &mut teams.get_mut(team_id).victory;
            if victory.wonder_built_step.is_none() {
                victory.wonder_built_step = Some(step);
            }
            let started = victory.wonder_built_step.unwrap();
            if step.saturating_sub(started) >= WONDER_VICTORY_COUNTDOWN {
                Some(VictoryOutcome::Winner(team_id))
            } else {
                None
            }
        }
        None => {
            for team in teams.0.iter_mut() {
                team.victory.wonder_built_step = None;
            }
            None
        }
    }
}

/// Relic: a team holding all `TOTAL_RELICS_ON_MAP` relics (garrisoned in
/// monasteries) for `RELIC_VICTORY_COUNTDOWN` consecutive steps wins
/// (spec §4.11).
fn check_relic(world: &World, teams: &mut Teams) -> Option<VictoryOutcome> {
    let mut per_team_relics = [0u32; crate::ids::MAX_TEAMS];
    let mut query = world.query::<(&Owned, &Kind, &Garrison)>();
    for (owned, kind, garrison) in query.iter(world) {
        if kind.0 == EntityKind::Monastery {
            if let Some(team) = owned.0.team_id() {
                per_team_relics[team as usize] += garrison.occupants.len() as u32;
            }
        }
    }

    let mut leader: Option<TeamId> = None;
    for (id, count) in per_team_relics.iter().enumerate() {
        if *count >= crate::config::constants::TOTAL_RELICS_ON_MAP {
            leader = Some(id as TeamId);
        }
    }

    for (id, team) in teams.0.iter_mut().enumerate() {
        if leader == Some(id as TeamId) {
            team.victory.relic_hold_steps += 1;
        } else {
            team.victory.relic_hold_steps = 0;
        }
    }

    leader.and_then(|id| {
        if teams.get(id).victory.relic_hold_steps >= RELIC_VICTORY_COUNTDOWN {
            Some(VictoryOutcome::Winner(id))
        } else {
            None
        }
    })
}

/// Regicide: the episode ends the instant any team's king dies
/// (spec §4.11) — the surviving team with a living king wins; a
/// simultaneous double-regicide is a draw.
fn check_regicide(world: &World) -> Option<VictoryOutcome> {
    let mut kings_alive: Vec<TeamId> = Vec::new();
    let mut any_king_existed = false;
    let mut query = world.query::<(&Owned, &Class, &Dead)>();
    for (owned, class, dead) in query.iter(world) {
        if class.0 == crate::ids::UnitClass::King {
            any_king_existed = true;
            if !dead.0 {
                if let Some(team) = owned.0.team_id() {
                    kings_alive.push(team);
                }
            }
        }
    }
    if !any_king_existed {
        return None;
    }
    match kings_alive.len() {
        0 => Some(VictoryOutcome::Draw),
        1 => Some(VictoryOutcome::Winner(kings_alive[0])),
        _ => None,
    }
}

/// King of the Hill: the team alone controlling a designated hill control
/// point's radius for `HILL_VICTORY_COUNTDOWN` consecutive steps wins
/// (spec §4.11).
fn check_king_of_the_hill(world: &World, teams: &mut Teams) -> Option<VictoryOutcome> {
    let hills: Vec<(u32, Position)> = {
        let mut query = world.query::<(Entity, &Position, &Kind)>();
        query
            .iter(world)
            .filter(|(_, _, k)| k.0 == EntityKind::ControlPoint)
            .enumerate()
            .map(|(i, (_, p, _))| (i as u32, *p))
            .collect()
    };

    let index = world.resource::<SpatialIndex>();
    let mut winner = None;

    for (hill_id, pos) in hills {
        let mut controllers: Vec<TeamId> = Vec::new();
        index.for_each_in_radius(pos, EntityKind::Agent, HILL_CONTROL_RADIUS, |e| {
            if let Some(team) = e.owner.team_id() {
                if !controllers.contains(&team) {
                    controllers.push(team);
                }
            }
        });

        if controllers.len() == 1 {
            let team_id = controllers[0];
            let steps = teams.get_mut(team_id).victory.hill_control_steps.entry(hill_id).or_insert(0);
            *steps += 1;
            if *steps >= HILL_VICTORY_COUNTDOWN {
                winner = Some(VictoryOutcome::Winner(team_id));
            }
        } else {
            for team in teams.0.iter_mut() {
                team.victory.hill_control_steps.insert(hill_id, 0);
            }
        }
    }
    winner
}

/// Evaluates every active victory predicate for this step (spec §4.1
/// step 15), in a fixed priority order so a tie between predicates firing
/// the same step is resolved deterministically: conquest, wonder, relic,
/// regicide, king-of-the-hill.
pub fn evaluate_victory(world: &mut World, step: u64) -> Option<VictoryOutcome> {
    let config = world.resource::<SimConfig>().clone();

    if condition_active(&config, VictoryCondition::Conquest) {
        let teams = world.resource::<Teams>();
        if let Some(outcome) = check_conquest(teams) {
            info!(?outcome, step, "conquest victory");
            return Some(outcome);
        }
    }
    if condition_active(&config, VictoryCondition::Wonder) {
        let mut teams = world.resource_mut::<Teams>().clone();
        let outcome = check_wonder(world, &mut teams, step);
        *world.resource_mut::<Teams>() = teams;
        if let Some(outcome) = outcome {
            info!(?outcome, step, "wonder victory");
            return Some(outcome);
        }
    }
    if condition_active(&config, VictoryCondition::Relic) {
        let mut teams = world.resource_mut::<Teams>().clone();
        let outcome = check_relic(world, &mut teams);
        *world.resource_mut::<Teams>() = teams;
        if let Some(outcome) = outcome {
            info!(?outcome, step, "relic victory");
            return Some(outcome);
        }
    }
    if condition_active(&config, VictoryCondition::Regicide) {
        if let Some(outcome) = check_regicide(world) {
            info!(?outcome, step, "regicide victory");
            return Some(outcome);
        }
    }
    if condition_active(&config, VictoryCondition::KingOfTheHill) {
        let mut teams = world.resource_mut::<Teams>().clone();
        let outcome = check_king_of_the_hill(world, &mut teams);
        *world.resource_mut::<Teams>() = teams;
        if let Some(outcome) = outcome {
            info!(?outcome, step, "king of the hill victory");
            return Some(outcome);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conquest_declares_sole_survivor() {
        let mut teams = Teams::new(10);
        teams.get_mut(1).victory.eliminated = true;
        teams.get_mut(2).victory.eliminated = true;
        teams.get_mut(3).victory.eliminated = true;
        teams.get_mut(4).victory.eliminated = true;
        teams.get_mut(5).victory.eliminated = true;
        teams.get_mut(6).victory.eliminated = true;
        teams.get_mut(7).victory.eliminated = true;
        assert_eq!(check_conquest(&teams), Some(VictoryOutcome::Winner(0)));
    }

    #[test]
    fn conquest_is_none_with_multiple_survivors() {
        let teams = Teams::new(10);
        assert_eq!(check_conquest(&teams), None);
    }
}
