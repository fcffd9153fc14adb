//! Bandit gangs
//!
//! Gangs appear near caravans away from castles, forts and armies, prey on
//! caravans and weak armies next to them, and drift toward the nearest
//! caravan otherwise. A nation's fear keeps them cautious.

use ahash::AHashSet;

use super::map::manhattan;
use super::turn::{TurnEvent, TurnReport};
use crate::core::config::rules;
use crate::core::rng::{shuffle, RandomSource};
use crate::core::types::CellId;
use crate::world::{Assault, Building, Cell, Ownership, WorldModel};

pub const MERCHANT_BASE_RATE: f64 = 0.80;
pub const MERCHANT_FEAR_PENALTY: f64 = 0.60;
pub const MERCHANT_MIN_RATE: f64 = 0.20;

pub const ARMY_BASE_RATE: f64 = 0.70;
pub const ARMY_FEAR_PENALTY: f64 = 0.50;
pub const ARMY_MIN_RATE: f64 = 0.15;

/// Base rate against an army of roughly equal size
pub const PARITY_BASE_RATE: f64 = 0.30;
pub const PARITY_MIN_RATE: f64 = 0.10;

/// Gang-to-army size ratio for a confident attack
pub const OVERWHELMING_RATIO: f64 = 2.0;
/// Smallest ratio at which a gang will try its luck
pub const PARITY_RATIO: f64 = 0.8;

/// Chance a gang falls on a caravan whose nation has `fear`
pub fn merchant_attack_rate(fear: f64) -> f64 {
    (MERCHANT_BASE_RATE - fear / 100.0 * MERCHANT_FEAR_PENALTY).max(MERCHANT_MIN_RATE)
}

/// Chance a gang of `bandits` attacks `defenders` soldiers; `None` when it won't try
pub fn army_attack_rate(bandits: u32, defenders: u32, fear: f64) -> Option<f64> {
    if defenders == 0 {
        return None;
    }
    let ratio = bandits as f64 / defenders as f64;
    let penalty = fear / 100.0 * ARMY_FEAR_PENALTY;
    if ratio >= OVERWHELMING_RATIO {
        Some((ARMY_BASE_RATE - penalty).max(ARMY_MIN_RATE))
    } else if ratio >= PARITY_RATIO {
        Some((PARITY_BASE_RATE - penalty).max(PARITY_MIN_RATE))
    } else {
        None
    }
}

/// Castle, fort or army within the exclusion diamond around `cell`
pub fn near_nation(world: &WorldModel, cell: CellId) -> bool {
    let radius = rules().bandit_exclusion_radius.max(0) as u32;
    world.cells.iter().any(|c| {
        let d = manhattan(cell, c.id);
        d > 0
            && d <= radius
            && (matches!(c.building, Some(Building::Castle | Building::Fort))
                || (c.ownership.army_owner().is_some() && c.unit_count > 0))
    })
}

/// Maybe raise a gang next to a random caravan
///
/// Needs at least one caravan on the board. The spawn cell is the first
/// empty neighbour, in shuffled order, outside every exclusion zone.
pub fn spawn_bandits(world: &WorldModel, rng: &mut impl RandomSource) -> TurnReport {
    let mut next = world.clone();
    let mut events = Vec::new();
    let r = rules();

    let merchants = world.merchant_cells();
    if !merchants.is_empty() && rng.chance(r.bandit_spawn_chance) {
        let near = merchants[rng.pick_index(merchants.len())];
        let mut candidates = world.neighbors(near);
        shuffle(&mut candidates, rng);
        let spot = candidates.into_iter().find(|c| {
            world.cell(*c).is_some_and(Cell::is_empty) && !near_nation(world, *c)
        });
        match spot {
            Some(cell) => {
                let units = rng.range_inclusive(1, r.bandit_max_units.max(1));
                next.set_occupant(cell, Ownership::Bandit, units);
                tracing::info!(%cell, units, "bandits appeared");
                events.push(TurnEvent::BanditSpawned { cell, units });
            }
            None => tracing::debug!(merchant = %near, "no hideout for bandits"),
        }
    }

    TurnReport {
        world: next,
        events,
    }
}

/// Fear of the nation behind `target`, if it is a caravan or army
fn target_fear(world: &WorldModel, target: &Cell) -> Option<f64> {
    target
        .ownership
        .player()
        .and_then(|p| world.player(p))
        .map(|p| p.reputation.fear)
}

/// Roll one gang's attack on its neighbours. Returns true when it engaged.
fn strike(
    world: &mut WorldModel,
    bandit: CellId,
    rng: &mut impl RandomSource,
    events: &mut Vec<TurnEvent>,
) -> bool {
    let Some(gang) = world.cell(bandit).map(|c| c.unit_count) else {
        return false;
    };

    for target in world.cardinal_neighbors(bandit) {
        let Some(cell) = world.cell(target) else {
            continue;
        };
        if cell.unit_count == 0 {
            continue;
        }
        let Some(fear) = target_fear(world, cell) else {
            continue;
        };

        match &cell.ownership {
            Ownership::Merchant(info) => {
                let rate = merchant_attack_rate(fear);
                let hit = rng.chance(rate);
                tracing::debug!(%bandit, %target, rate, hit, "bandits eye a caravan");
                if hit {
                    let (owner, gold) = (info.owner, info.gold);
                    if let Some(c) = world.cell_mut(target) {
                        c.vacate();
                    }
                    tracing::info!(%bandit, %target, gold, "caravan plundered");
                    events.push(TurnEvent::MerchantPlundered {
                        bandit,
                        merchant: target,
                        owner,
                        gold,
                    });
                    return true;
                }
            }
            Ownership::Army { .. } => {
                let Some(rate) = army_attack_rate(gang, cell.unit_count, fear) else {
                    continue;
                };
                let hit = rng.chance(rate);
                tracing::debug!(%bandit, %target, rate, hit, "bandits eye an army");
                if hit {
                    world.pending_assaults.push(Assault { bandit, target });
                    events.push(TurnEvent::BanditAssault { bandit, target });
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Step a gang one cell. Returns where it ended up.
fn prowl(
    world: &mut WorldModel,
    bandit: CellId,
    rng: &mut impl RandomSource,
    events: &mut Vec<TurnEvent>,
) -> CellId {
    let open: Vec<CellId> = world
        .neighbors(bandit)
        .into_iter()
        .filter(|n| world.cell(*n).is_some_and(Cell::is_empty))
        .collect();
    if open.is_empty() {
        return bandit;
    }

    let quarry = world
        .merchant_cells()
        .into_iter()
        .min_by_key(|m| manhattan(bandit, *m));

    let to = match quarry {
        Some(quarry) => {
            let here = manhattan(bandit, quarry);
            open.iter()
                .copied()
                .min_by_key(|n| manhattan(*n, quarry))
                .filter(|n| manhattan(*n, quarry) < here)
        }
        None => {
            let mut open = open;
            shuffle(&mut open, rng);
            open.first().copied()
        }
    };

    let Some(to) = to else {
        return bandit;
    };
    let Some(gang) = world.cell(bandit).cloned() else {
        return bandit;
    };
    if let Some(dest) = world.cell_mut(to) {
        dest.occupy(Ownership::Bandit, gang.unit_count);
        dest.unit_type = gang.unit_type;
    }
    if let Some(src) = world.cell_mut(bandit) {
        src.vacate();
    }
    events.push(TurnEvent::BanditMoved { from: bandit, to });
    to
}

/// Every gang on the board attacks a neighbour or moves, in row-major order
pub fn engage_and_move(world: &WorldModel, rng: &mut impl RandomSource) -> TurnReport {
    let mut next = world.clone();
    let mut events = Vec::new();
    let mut handled: AHashSet<CellId> = AHashSet::new();

    for bandit in world.bandit_cells() {
        if handled.contains(&bandit) {
            continue;
        }
        if strike(&mut next, bandit, rng, &mut events) {
            handled.insert(bandit);
            continue;
        }
        let end = prowl(&mut next, bandit, rng, &mut events);
        handled.insert(end);
    }

    TurnReport {
        world: next,
        events,
    }
}
