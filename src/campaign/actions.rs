//! The action surface
//!
//! Everything a nation can do on its turn goes through [`apply_action`]:
//! the UI and the AI submit the same `Action` values and get back either a
//! new world with an outcome, or an `ActionError` and an untouched world.

use std::collections::VecDeque;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use super::battle::{engage, CombatReport, Engagement};
use super::mercenary::{negotiate, try_auto_join, MercenaryChoice, NegotiationOutcome};
use super::trade::{accept_request, evaluate_request, TradeDecision, TradeRequest};
use super::turn::{end_turn, TurnEvent};
use super::{fort, merchant};
use crate::core::error::ActionError;
use crate::core::rng::RandomSource;
use crate::core::types::{CellId, PlayerId};
use crate::world::{Cell, Ownership, WorldModel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Relocate an army, or merge it into another of the same nation
    Move { from: CellId, to: CellId },
    /// `engagement` is the defender's response
    Attack {
        from: CellId,
        to: CellId,
        engagement: Engagement,
    },
    Fortify { cell: CellId },
    Mercenary {
        from: CellId,
        band: CellId,
        choice: MercenaryChoice,
    },
    DispatchMerchant { merchant: CellId, destination: CellId },
    ProposeTrade(TradeRequest),
    EndTurn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Moved { from: CellId, to: CellId, merged: bool },
    Combat(CombatReport),
    /// The attacked band switched sides before any blow was struck
    AutoJoined { cell: CellId, units: u32 },
    FortStarted { cell: CellId, garrison: u32 },
    Negotiated(NegotiationOutcome),
    Dispatched {
        merchant: CellId,
        destination: CellId,
        route_len: usize,
    },
    Trade(TradeDecision),
    TurnEnded(Vec<TurnEvent>),
}

#[derive(Debug, Clone)]
pub struct ActionReport {
    pub world: WorldModel,
    pub outcome: Outcome,
}

impl ActionReport {
    fn new(world: WorldModel, outcome: Outcome) -> Self {
        Self { world, outcome }
    }
}

/// Apply `action` on behalf of `actor`
///
/// Only the nation whose turn it is may act, with one exception: an attack
/// launched from a bandit or mercenary cell is relayed by the defending
/// nation, who picks the engagement.
pub fn apply_action(
    world: &WorldModel,
    actor: PlayerId,
    action: &Action,
    rng: &mut impl RandomSource,
) -> Result<ActionReport, ActionError> {
    world.try_player(actor)?;

    if let Action::Attack {
        from,
        to,
        engagement,
    } = action
    {
        if world.try_cell(*from)?.ownership.is_neutral() {
            return relay_neutral_attack(world, actor, *from, *to, *engagement, rng);
        }
    }

    if actor != world.current_player {
        return Err(ActionError::NotYourTurn { actor });
    }

    match action {
        Action::Move { from, to } => move_stack(world, actor, *from, *to),
        Action::Attack {
            from,
            to,
            engagement,
        } => attack(world, actor, *from, *to, *engagement, rng),
        Action::Fortify { cell } => {
            let next = fort::start_construction(world, *cell, actor)?;
            let garrison = next.try_cell(*cell)?.fort.garrison_units();
            Ok(ActionReport::new(
                next,
                Outcome::FortStarted {
                    cell: *cell,
                    garrison,
                },
            ))
        }
        Action::Mercenary { from, band, choice } => {
            field_army(world, actor, *from)?;
            adjacent(world, *from, *band)?;
            let result = negotiate(world, *from, *band, *choice, rng)?;
            Ok(ActionReport::new(
                result.world,
                Outcome::Negotiated(result.outcome),
            ))
        }
        Action::DispatchMerchant {
            merchant: at,
            destination,
        } => {
            let (next, route_len) = merchant::dispatch(world, *at, *destination, actor)?;
            Ok(ActionReport::new(
                next,
                Outcome::Dispatched {
                    merchant: *at,
                    destination: *destination,
                    route_len,
                },
            ))
        }
        Action::ProposeTrade(req) => propose_trade(world, actor, req),
        Action::EndTurn => {
            let report = end_turn(world, rng);
            Ok(ActionReport::new(
                report.world,
                Outcome::TurnEnded(report.events),
            ))
        }
    }
}

/// The actor's army on `at`, free to leave its cell
fn field_army<'w>(world: &'w WorldModel, actor: PlayerId, at: CellId) -> Result<&'w Cell, ActionError> {
    let cell = world.try_cell(at)?;
    if cell.ownership.army_owner() != Some(actor) {
        return Err(ActionError::NotControlled(at));
    }
    if !cell.fort.is_none() {
        return Err(ActionError::Ineligible {
            cell: at,
            reason: "a fort garrison cannot leave its walls",
        });
    }
    Ok(cell)
}

fn adjacent(world: &WorldModel, from: CellId, to: CellId) -> Result<(), ActionError> {
    world.try_cell(to)?;
    if world.neighbors(from).contains(&to) {
        Ok(())
    } else {
        Err(ActionError::OutOfReach { from, to })
    }
}

/// Whether `to` is within `range` steps of `from`, passing only empty cells on the way
fn reachable(world: &WorldModel, from: CellId, to: CellId, range: u32) -> bool {
    let mut depth: AHashMap<CellId, u32> = AHashMap::new();
    let mut queue = VecDeque::from([from]);
    depth.insert(from, 0);

    while let Some(current) = queue.pop_front() {
        let d = depth.get(&current).copied().unwrap_or(0);
        if d >= range {
            continue;
        }
        for n in world.neighbors(current) {
            if n == to {
                return true;
            }
            if depth.contains_key(&n) || !world.cell(n).is_some_and(Cell::is_empty) {
                continue;
            }
            depth.insert(n, d + 1);
            queue.push_back(n);
        }
    }
    false
}

fn move_stack(
    world: &WorldModel,
    actor: PlayerId,
    from: CellId,
    to: CellId,
) -> Result<ActionReport, ActionError> {
    let mover = field_army(world, actor, from)?.clone();
    let target = world.try_cell(to)?;
    if from == to {
        return Err(ActionError::InvalidTarget {
            cell: to,
            reason: "already there",
        });
    }
    let merged = match target.ownership.army_owner() {
        Some(owner) if owner == actor => true,
        None if target.is_empty() => false,
        _ => {
            return Err(ActionError::InvalidTarget {
                cell: to,
                reason: "destination is occupied",
            })
        }
    };
    let range = mover.unit_type.unwrap_or_default().move_range();
    if !reachable(world, from, to, range) {
        return Err(ActionError::OutOfReach { from, to });
    }

    let mut next = world.clone();
    let dest = next.try_cell_mut(to)?;
    if merged {
        dest.unit_count += mover.unit_count;
    } else {
        dest.occupy(mover.ownership.clone(), mover.unit_count);
        dest.unit_type = mover.unit_type;
        dest.retreat_streak = mover.retreat_streak;
    }
    let src = next.try_cell_mut(from)?;
    src.vacate();
    src.retreat_streak = 0;

    tracing::debug!(%from, %to, merged, "army moved");
    Ok(ActionReport::new(next, Outcome::Moved { from, to, merged }))
}

fn attack(
    world: &WorldModel,
    actor: PlayerId,
    from: CellId,
    to: CellId,
    engagement: Engagement,
    rng: &mut impl RandomSource,
) -> Result<ActionReport, ActionError> {
    field_army(world, actor, from)?;
    adjacent(world, from, to)?;

    let defender = world.try_cell(to)?;
    if defender.ownership == Ownership::Mercenary && engagement == Engagement::Fight {
        if let Some((next, units)) = try_auto_join(world, from, to, rng)? {
            return Ok(ActionReport::new(next, Outcome::AutoJoined { cell: to, units }));
        }
    }

    let engaged = engage(world, from, to, engagement, rng)?;
    Ok(ActionReport::new(engaged.world, Outcome::Combat(engaged.report)))
}

/// Answer a bandit assault rolled by the last sweep against one of `actor`'s stacks
///
/// Mercenary bands never attack on their own, and each assault is answered once.
fn relay_neutral_attack(
    world: &WorldModel,
    actor: PlayerId,
    from: CellId,
    to: CellId,
    engagement: Engagement,
    rng: &mut impl RandomSource,
) -> Result<ActionReport, ActionError> {
    if world.try_cell(from)?.ownership != Ownership::Bandit {
        return Err(ActionError::InvalidTarget {
            cell: from,
            reason: "only bandits attack on their own",
        });
    }
    if world.try_cell(to)?.ownership.player() != Some(actor) {
        return Err(ActionError::NotControlled(to));
    }
    adjacent(world, from, to)?;

    let mut staged = world.clone();
    if !staged.take_assault(from, to) {
        return Err(ActionError::Ineligible {
            cell: from,
            reason: "no assault from this gang is pending",
        });
    }
    let engaged = engage(&staged, from, to, engagement, rng)?;
    Ok(ActionReport::new(engaged.world, Outcome::Combat(engaged.report)))
}

fn propose_trade(
    world: &WorldModel,
    actor: PlayerId,
    req: &TradeRequest,
) -> Result<ActionReport, ActionError> {
    if req.from_player != actor {
        return Err(ActionError::NotControlled(req.merchant));
    }
    if req.to_player == actor {
        return Err(ActionError::InvalidTarget {
            cell: req.target,
            reason: "a nation cannot trade with itself",
        });
    }
    world.try_player(req.to_player)?;
    let owner = world.try_cell(req.merchant)?.merchant().map(|m| m.owner);
    if owner != Some(actor) {
        return Err(ActionError::NotControlled(req.merchant));
    }

    let decision = evaluate_request(world, req);
    let next = match decision {
        TradeDecision::Accept => accept_request(world, req)?,
        TradeDecision::Counter { .. } | TradeDecision::Decline => world.clone(),
    };
    Ok(ActionReport::new(next, Outcome::Trade(decision)))
}
