//! Trade profit and trade diplomacy
//!
//! Profit is what a caravan earns on delivery. Diplomacy lets one nation
//! ask another for passage to a destination, offering a tariff share and a
//! bribe; the receiving side scores the offer and accepts, counters or
//! declines.

use serde::{Deserialize, Serialize};

use super::floor_count;
use super::map::{hex_distance, manhattan};
use super::merchant;
use crate::core::config::rules;
use crate::core::error::ActionError;
use crate::core::types::{CellId, PlayerId, Turn};
use crate::world::{Building, Cell, WorldModel};

pub const CASTLE_MULTIPLIER: f64 = 2.0;
pub const FORT_MULTIPLIER: f64 = 1.5;
/// Profit bonus per hex between origin and destination
pub const DISTANCE_BONUS: f64 = 0.05;

/// Reference cargo a nation assumes when weighing a request
pub const REFERENCE_REWARD: f64 = 75.0;
pub const MAX_TARIFF: f64 = 0.25;
pub const BASE_LOSS_RATE: f64 = 0.05;
pub const LOSS_RATE_PER_CELL: f64 = 0.02;
pub const BRIBE_WEIGHT: f64 = 25.0;
pub const RELATION_WEIGHT: f64 = 20.0;
pub const ACCEPT_SCORE: f64 = 5.0;
pub const COUNTER_SCORE: f64 = 1.0;
pub const COUNTER_TARIFF_STEP: f64 = 0.08;

pub fn destination_multiplier(cell: &Cell) -> f64 {
    match cell.building {
        Some(Building::Castle) => CASTLE_MULTIPLIER,
        _ => FORT_MULTIPLIER,
    }
}

/// `floor(cargo × multiplier × (1 + distance × 0.05))`
pub fn gross_profit(cargo: u32, multiplier: f64, distance: u32) -> u32 {
    floor_count(cargo as f64 * multiplier * (1.0 + distance as f64 * DISTANCE_BONUS))
}

/// Breakdown of what a delivery pays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitQuote {
    pub cargo: u32,
    pub distance: u32,
    pub multiplier: f64,
    pub gross: u32,
    pub tax: u32,
    pub net: u32,
    /// Nation whose territory levies the tax, if any
    pub levied_by: Option<PlayerId>,
}

/// Price a delivery of `cargo` carried `distance` hexes to `destination`
///
/// The tax rate is that of whichever nation's army holds the destination.
pub fn settle(world: &WorldModel, cargo: u32, distance: u32, destination: &Cell) -> ProfitQuote {
    let multiplier = destination_multiplier(destination);
    let gross = gross_profit(cargo, multiplier, distance);
    let levied_by = destination.ownership.army_owner();
    let rate = levied_by
        .and_then(|p| world.player(p))
        .map_or(0.0, |p| p.tax_rate);
    let tax = floor_count(gross as f64 * rate).min(gross);
    ProfitQuote {
        cargo,
        distance,
        multiplier,
        gross,
        tax,
        net: gross - tax,
        levied_by,
    }
}

/// What the caravan on `merchant` would earn trading at `destination`
///
/// An empty caravan is quoted at the base cargo it would be restocked with.
pub fn expected_profit(
    world: &WorldModel,
    merchant: CellId,
    destination: CellId,
) -> Result<ProfitQuote, ActionError> {
    let info = world
        .try_cell(merchant)?
        .merchant()
        .ok_or(ActionError::InvalidTarget {
            cell: merchant,
            reason: "no caravan here",
        })?;
    let dest = world.try_cell(destination)?;
    let cargo = if info.gold == 0 {
        rules().merchant_base_cargo
    } else {
        info.gold
    };
    Ok(settle(world, cargo, hex_distance(merchant, destination), dest))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub from_player: PlayerId,
    pub to_player: PlayerId,
    /// Cell of the proposer's caravan
    pub merchant: CellId,
    pub target: CellId,
    /// Share of the expected reward offered, `0..=0.25`
    pub proposed_tariff: f64,
    pub proposed_bribe: u32,
    /// Last turn the offer stands
    pub expires_turn: Turn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TradeDecision {
    Accept,
    Counter { tariff: f64, bribe: u32 },
    Decline,
}

/// Score a request from the receiving nation's point of view
///
/// Distance here is grid (row plus column) distance between the caravan
/// and the target. Unknown cells and expired offers are declined.
pub fn evaluate_request(world: &WorldModel, req: &TradeRequest) -> TradeDecision {
    let (Some(merchant), Some(target)) = (world.cell(req.merchant), world.cell(req.target)) else {
        return TradeDecision::Decline;
    };
    if world.turn > req.expires_turn {
        return TradeDecision::Decline;
    }

    let distance = manhattan(merchant.id, target.id) as f64;
    let tariff = req.proposed_tariff.clamp(0.0, MAX_TARIFF);
    let expected_reward =
        REFERENCE_REWARD * destination_multiplier(target) * (1.0 + distance * DISTANCE_BONUS);
    let revenue = expected_reward * tariff;
    let loss = expected_reward * (BASE_LOSS_RATE + distance * LOSS_RATE_PER_CELL);
    let relation = world.relation(req.to_player, req.from_player) as f64;
    let score = req.proposed_bribe as f64 / BRIBE_WEIGHT + revenue - loss + relation / RELATION_WEIGHT;

    tracing::debug!(
        from = %req.from_player,
        to = %req.to_player,
        score,
        "trade request scored"
    );

    if score >= ACCEPT_SCORE {
        TradeDecision::Accept
    } else if score >= COUNTER_SCORE {
        TradeDecision::Counter {
            tariff: (tariff + COUNTER_TARIFF_STEP).min(MAX_TARIFF),
            bribe: floor_count((loss - revenue) * 0.5),
        }
    } else {
        TradeDecision::Decline
    }
}

/// Send the proposer's caravan on its way under an accepted request
///
/// The caravan goes through the same checks as a plain dispatch: it must be
/// idle, and the target must be a castle or completed fort. The bribe
/// changes hands only when the proposer can cover it.
pub fn accept_request(world: &WorldModel, req: &TradeRequest) -> Result<WorldModel, ActionError> {
    let (mut next, _) = merchant::dispatch(world, req.merchant, req.target, req.from_player)?;

    if req.proposed_bribe > 0 && next.try_player(req.from_player)?.can_afford(req.proposed_bribe) {
        next.try_player_mut(req.from_player)?.gold -= req.proposed_bribe;
        next.try_player_mut(req.to_player)?.gold += req.proposed_bribe;
    }

    tracing::info!(
        merchant = %req.merchant,
        target = %req.target,
        bribe = req.proposed_bribe,
        "trade request accepted"
    );
    Ok(next)
}
