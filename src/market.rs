//! Market trading and production-station crafting (spec §4.8).
//!
//! Prices float per-team against a gold baseline and decay toward 1.0 every
//! `MARKET_PRICE_DECAY_INTERVAL` steps (spec §9: decay runs once per step,
//! after that step's agent-mediated trades have already settled, so a trade
//! always sees the price as of the start of its own step — see DESIGN.md).

use bevy_ecs::prelude::*;

use crate::components::*;
use crate::config::constants::{MARKET_MAX_PRICE, MARKET_MIN_PRICE, MARKET_PRICE_DECAY_INTERVAL};
use crate::ids::EntityKind;
use crate::team::{MarketPrices, Teams};

/// Sell the agent's most abundant tradable resource for gold at the
/// building owner's team price, nudging that price down afterward (selling
/// pressure) and nudging the complementary buy price is not modeled —
/// single-resource sell only, matching spec §4.8's description of the
/// market as a sell-for-gold mechanism.
pub fn trade(world: &mut World, agent: Entity, market: Entity) -> bool {
    let owner = world.get::<Owned>(agent).map(|o| o.0);
    let team_id = match owner.and_then(|o| o.team_id()) {
        Some(t) => t,
        None => return false,
    };
    let _ = market;

    let sellable = {
        let inv = world.get::<Inventory>(agent).unwrap();
        [ItemKind::Food, ItemKind::Wood, ItemKind::Stone]
            .into_iter()
            .filter(|item| inv.count(*item) > 0)
            .max_by_key(|item| inv.count(*item))
    };
    let item = match sellable {
        Some(i) => i,
        None => return false,
    };

    let mut teams = world.resource_mut::<Teams>();
    let market_prices = &mut teams.get_mut(team_id).market;
    let price = price_for(market_prices, item);

    let mut inv = world.get_mut::<Inventory>(agent).unwrap();
    if !inv.take(item, 1) {
        return false;
    }
    let gold_gain = price.round().max(1.0) as u32;
    drop(inv);

    let mut teams = world.resource_mut::<Teams>();
    teams.get_mut(team_id).stockpile.gold += gold_gain;
    nudge_price_down(&mut teams.get_mut(team_id).market, item);
    true
}

/// Public wrapper over [`price_for`] for team-level market queries and
/// control-API buy/sell (spec §6: "market buy/sell and price queries").
pub fn price_for_team(prices: &MarketPrices, item: ItemKind) -> f32 {
    price_for(prices, item)
}

/// Public wrapper over [`nudge_price_down`] for control-API sells that
/// bypass agent-mediated `trade`.
pub fn nudge_price_down_team(prices: &mut MarketPrices, item: ItemKind) {
    nudge_price_down(prices, item)
}

fn price_for(prices: &MarketPrices, item: ItemKind) -> f32 {
    match item {
        ItemKind::Food => prices.food,
        ItemKind::Wood => prices.wood,
        ItemKind::Stone => prices.stone,
        _ => 1.0,
    }
}

fn nudge_price_down(prices: &mut MarketPrices, item: ItemKind) {
    let slot = match item {
        ItemKind::Food => &mut prices.food,
        ItemKind::Wood => &mut prices.wood,
        ItemKind::Stone => &mut prices.stone,
        _ => return,
    };
    *slot = (*slot * 0.98).clamp(MARKET_MIN_PRICE, MARKET_MAX_PRICE);
}

/// Decays every team's market prices toward 1.0, run once per
/// `MARKET_PRICE_DECAY_INTERVAL` steps, before that step's trades settle
/// (spec §4.1, §4.8).
pub fn decay_market_prices(teams: &mut Teams, tick: u64) {
    if tick == 0 || tick % MARKET_PRICE_DECAY_INTERVAL != 0 {
        return;
    }
    for team in teams.0.iter_mut() {
        for slot in [&mut team.market.food, &mut team.market.wood, &mut team.market.stone] {
            *slot = (*slot + (1.0 - *slot) * 0.1).clamp(MARKET_MIN_PRICE, MARKET_MAX_PRICE);
        }
    }
}

/// Converts raw resources into a crafted good at a production station
/// (mill → bread, clay oven → bread, weaving loom → cloth, blacksmith →
/// spear/armor/bar), spending one unit of the matching raw resource from
/// the agent's inventory (spec §4.7/§4.8 crafting stations).
pub fn try_station_craft(world: &mut World, agent: Entity, _station: Entity, kind: EntityKind) -> bool {
    let (input, output) = match kind {
        EntityKind::Mill | EntityKind::ClayOven => (ItemKind::Wheat, ItemKind::Bread),
        EntityKind::WeavingLoom => (ItemKind::Cloth, ItemKind::Cloth),
        EntityKind::Blacksmith => (ItemKind::Stone, ItemKind::Bar),
        _ => return false,
    };

    let mut inv = world.get_mut::<Inventory>(agent).unwrap();
    if !inv.take(input, 1) {
        return false;
    }
    let added = inv.add(output, 1);
    added > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_sells_resource_for_gold_and_lowers_price() {
        let mut world = World::new();
        world.insert_resource(Teams::new(10));
        let agent = world
            .spawn(AgentBundle::new(
                Position::new(0, 0),
                crate::ids::Owner::team(0),
                crate::ids::UnitClass::Villager,
                30,
                None,
            ))
            .id();
        world.get_mut::<Inventory>(agent).unwrap().add(ItemKind::Wood, 3);
        let market = world.spawn(()).id();

        let before_price = world.resource::<Teams>().get(0).market.wood;
        assert!(trade(&mut world, agent, market));
        assert_eq!(world.resource::<Teams>().get(0).stockpile.gold, 1);
        assert!(world.resource::<Teams>().get(0).market.wood < before_price);
    }

    #[test]
    fn trade_fails_with_empty_inventory() {
        let mut world = World::new();
        world.insert_resource(Teams::new(10));
        let agent = world
            .spawn(AgentBundle::new(
                Position::new(0, 0),
                crate::ids::Owner::team(0),
                crate::ids::UnitClass::Villager,
                30,
                None,
            ))
            .id();
        let market = world.spawn(()).id();
        assert!(!trade(&mut world, agent, market));
    }
}
