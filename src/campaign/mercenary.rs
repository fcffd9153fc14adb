//! Encounters with the neutral mercenary band
//!
//! A player stack next to a band can buy it, lean on it, talk it round, or
//! back away. Attacking it outright first gives the band a chance to join
//! of its own accord.

use serde::{Deserialize, Serialize};

use super::battle::{engage, CombatReport, Engagement};
use super::floor_count;
use super::reputation::{apply_delta, fear_power, justice_power};
use crate::core::config::rules;
use crate::core::error::ActionError;
use crate::core::rng::RandomSource;
use crate::core::types::{CellId, PlayerId};
use crate::world::{Ownership, WorldModel};

pub const AUTO_JOIN_FACTOR: f64 = 0.3;
pub const TEMPORARY_PRICE_FACTOR: f64 = 0.5;
/// Share of the list price a fully just nation saves
pub const JUSTICE_DISCOUNT_FACTOR: f64 = 0.3;
pub const INTIMIDATE_FACTOR: f64 = 0.6;
/// Share of an intimidated band that sticks around
pub const INTIMIDATE_SURVIVAL: f64 = 0.8;
pub const PERSUADE_FACTOR: f64 = 0.5;
pub const PURSUIT_FACTOR: f64 = 0.4;

pub const INTIMIDATE_FEAR_GAIN: f64 = 10.0;
pub const INTIMIDATE_JUSTICE_LOSS: f64 = 5.0;
pub const PERSUADE_JUSTICE_GAIN: f64 = 3.0;
pub const AUTO_JOIN_JUSTICE_GAIN: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MercenaryChoice {
    HireTemporary,
    HirePermanent,
    Intimidate,
    Persuade,
    Withdraw,
}

/// Gold asked for a band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HireQuote {
    pub temporary: u32,
    pub permanent: u32,
    pub discount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NegotiationOutcome {
    /// The band merged into the player's stack on `cell`
    Joined {
        cell: CellId,
        units: u32,
        lease: Option<u32>,
        cost: u32,
    },
    /// Persuasion failed; nothing changed
    Refused,
    /// Intimidation failed or a withdrawal was run down
    Fought(CombatReport),
    Withdrew,
}

#[derive(Debug, Clone)]
pub struct Negotiation {
    pub world: WorldModel,
    pub outcome: NegotiationOutcome,
}

/// Price of `units` mercenaries for a nation with the given justice
pub fn hire_quote(units: u32, justice: f64) -> HireQuote {
    let base = units as f64 * rules().mercenary_unit_price as f64;
    let discount = base * justice_power(justice) * JUSTICE_DISCOUNT_FACTOR;
    HireQuote {
        temporary: floor_count(base * TEMPORARY_PRICE_FACTOR - discount),
        permanent: floor_count(base - discount),
        discount: floor_count(discount),
    }
}

pub fn auto_join_probability(justice: f64) -> f64 {
    justice_power(justice) * AUTO_JOIN_FACTOR
}

pub fn intimidate_probability(fear: f64) -> f64 {
    fear_power(fear) * INTIMIDATE_FACTOR
}

pub fn persuade_probability(justice: f64) -> f64 {
    justice_power(justice) * PERSUADE_FACTOR
}

pub fn pursuit_probability(fear: f64) -> f64 {
    fear_power(fear) * PURSUIT_FACTOR
}

/// Player stack on `from` and the band on `band`, validated
fn parties(world: &WorldModel, from: CellId, band: CellId) -> Result<(PlayerId, u32), ActionError> {
    let cell = world.try_cell(from)?;
    let player = cell
        .ownership
        .army_owner()
        .ok_or(ActionError::NotControlled(from))?;
    let target = world.try_cell(band)?;
    if target.ownership != Ownership::Mercenary || target.unit_count == 0 {
        return Err(ActionError::InvalidTarget {
            cell: band,
            reason: "no mercenary band here",
        });
    }
    Ok((player, target.unit_count))
}

/// Move the player's stack onto the band's cell with the band's `recruits` added
fn merge_band(
    next: &mut WorldModel,
    from: CellId,
    band: CellId,
    recruits: u32,
    lease: Option<u32>,
) -> Result<u32, ActionError> {
    let stack = next.try_cell(from)?.clone();
    let player = stack
        .ownership
        .army_owner()
        .ok_or(ActionError::NotControlled(from))?;
    let ownership = match lease {
        Some(turns) => Ownership::Army {
            player,
            lease_turns: Some(turns),
        },
        None => stack.ownership.clone(),
    };
    let units = stack.unit_count + recruits;
    let cell = next.try_cell_mut(band)?;
    cell.vacate();
    cell.occupy(ownership, units);
    cell.unit_type = stack.unit_type;
    cell.retreat_streak = 0;
    next.try_cell_mut(from)?.vacate();
    Ok(units)
}

/// Roll for a band to switch sides unprompted when attacked
///
/// Returns the merged world and the stack size on success, `None` when the
/// attack should go ahead as a battle.
pub fn try_auto_join(
    world: &WorldModel,
    from: CellId,
    band: CellId,
    rng: &mut impl RandomSource,
) -> Result<Option<(WorldModel, u32)>, ActionError> {
    let (player, band_units) = parties(world, from, band)?;
    let justice = world.try_player(player)?.reputation.justice;
    if !rng.chance(auto_join_probability(justice)) {
        return Ok(None);
    }

    let mut next = world.clone();
    let units = merge_band(&mut next, from, band, band_units, None)?;
    let p = next.try_player_mut(player)?;
    p.reputation = apply_delta(p.reputation, 0.0, AUTO_JOIN_JUSTICE_GAIN);
    tracing::info!(cell = %band, units, "mercenaries joined of their own accord");
    Ok(Some((next, units)))
}

/// Resolve one of the interactive options against the band on `band`
pub fn negotiate(
    world: &WorldModel,
    from: CellId,
    band: CellId,
    choice: MercenaryChoice,
    rng: &mut impl RandomSource,
) -> Result<Negotiation, ActionError> {
    let (player, band_units) = parties(world, from, band)?;
    let rep = world.try_player(player)?.reputation;
    let mut next = world.clone();

    let outcome = match choice {
        MercenaryChoice::HireTemporary | MercenaryChoice::HirePermanent => {
            let quote = hire_quote(band_units, rep.justice);
            let (cost, lease) = if choice == MercenaryChoice::HireTemporary {
                (quote.temporary, Some(rules().mercenary_lease_turns))
            } else {
                (quote.permanent, None)
            };
            let buyer = next.try_player_mut(player)?;
            if !buyer.can_afford(cost) {
                return Err(ActionError::InsufficientGold {
                    need: cost,
                    have: buyer.gold,
                });
            }
            buyer.gold -= cost;
            let units = merge_band(&mut next, from, band, band_units, lease)?;
            tracing::info!(%player, cell = %band, cost, ?lease, "mercenaries hired");
            NegotiationOutcome::Joined {
                cell: band,
                units,
                lease,
                cost,
            }
        }
        MercenaryChoice::Intimidate => {
            if rng.chance(intimidate_probability(rep.fear)) {
                let survivors = floor_count(band_units as f64 * INTIMIDATE_SURVIVAL);
                let units = merge_band(&mut next, from, band, survivors, None)?;
                let p = next.try_player_mut(player)?;
                p.reputation =
                    apply_delta(p.reputation, INTIMIDATE_FEAR_GAIN, -INTIMIDATE_JUSTICE_LOSS);
                NegotiationOutcome::Joined {
                    cell: band,
                    units,
                    lease: None,
                    cost: 0,
                }
            } else {
                let engaged = engage(world, from, band, Engagement::Fight, rng)?;
                next = engaged.world;
                NegotiationOutcome::Fought(engaged.report)
            }
        }
        MercenaryChoice::Persuade => {
            if rng.chance(persuade_probability(rep.justice)) {
                let units = merge_band(&mut next, from, band, band_units, None)?;
                let p = next.try_player_mut(player)?;
                p.reputation = apply_delta(p.reputation, 0.0, PERSUADE_JUSTICE_GAIN);
                NegotiationOutcome::Joined {
                    cell: band,
                    units,
                    lease: None,
                    cost: 0,
                }
            } else {
                NegotiationOutcome::Refused
            }
        }
        MercenaryChoice::Withdraw => {
            if rng.chance(pursuit_probability(rep.fear)) {
                tracing::debug!(cell = %band, "mercenaries gave chase");
                let engaged = engage(world, band, from, Engagement::Fight, rng)?;
                next = engaged.world;
                NegotiationOutcome::Fought(engaged.report)
            } else {
                NegotiationOutcome::Withdrew
            }
        }
    };

    Ok(Negotiation {
        world: next,
        outcome,
    })
}
