//! Turn orchestration
//!
//! `end_turn` hands control to the other nation. When control comes back
//! to player 0 a new round starts and the world sweep runs: forts build,
//! leases tick, caravans spawn and travel, bandits spawn and prowl.

use serde::{Deserialize, Serialize};

use super::{bandit, fort, merchant};
use crate::core::rng::RandomSource;
use crate::core::types::{CellId, PlayerId};
use crate::world::{Ownership, WorldModel};

/// Something the sweep did, in the order it happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum TurnEvent {
    FortAdvanced { cell: CellId, stage: u8 },
    FortCompleted { cell: CellId },
    /// A hired band's contract ran out and it went neutral where it stood
    LeaseExpired {
        cell: CellId,
        former_owner: PlayerId,
        units: u32,
    },
    MerchantSpawned {
        cell: CellId,
        owner: PlayerId,
        gold: u32,
        /// Completed fort the new caravan is credited to
        fort: CellId,
    },
    MerchantMoved { from: CellId, to: CellId },
    MerchantArrived { cell: CellId, destination: CellId },
    MerchantReturning { cell: CellId },
    MerchantDelivered {
        cell: CellId,
        owner: PlayerId,
        gross: u32,
        tax: u32,
        net: u32,
    },
    MerchantWaiting { cell: CellId, blocked_by: CellId },
    MerchantSurrounded { cell: CellId },
    RouteReplanned { cell: CellId, length: usize },
    DetourPlanned { cell: CellId, length: usize },
    DetourFailed { cell: CellId },
    RoadPaved { cell: CellId },
    BanditSpawned { cell: CellId, units: u32 },
    BanditMoved { from: CellId, to: CellId },
    MerchantPlundered {
        bandit: CellId,
        merchant: CellId,
        owner: PlayerId,
        gold: u32,
    },
    /// A gang chose to attack an army; resolve it with an `Attack` action
    BanditAssault { bandit: CellId, target: CellId },
}

/// A world produced by one sweep step, with what happened along the way
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub world: WorldModel,
    pub events: Vec<TurnEvent>,
}

impl TurnReport {
    fn then(mut self, step: impl FnOnce(&WorldModel) -> TurnReport) -> TurnReport {
        let next = step(&self.world);
        self.events.extend(next.events);
        TurnReport {
            world: next.world,
            events: self.events,
        }
    }
}

/// Count down temporary hires; expired bands turn neutral in place
pub fn tick_leases(world: &WorldModel) -> TurnReport {
    let mut next = world.clone();
    let mut events = Vec::new();

    for cell in next.cells.iter_mut() {
        let Ownership::Army {
            player,
            lease_turns: Some(left),
        } = &mut cell.ownership
        else {
            continue;
        };
        *left = left.saturating_sub(1);
        if *left > 0 {
            continue;
        }
        let former_owner = *player;
        cell.ownership = Ownership::Mercenary;
        tracing::info!(cell = %cell.id, %former_owner, units = cell.unit_count, "mercenary lease expired");
        events.push(TurnEvent::LeaseExpired {
            cell: cell.id,
            former_owner,
            units: cell.unit_count,
        });
    }

    TurnReport {
        world: next,
        events,
    }
}

/// Run the start-of-round sweep once
pub fn sweep(world: &WorldModel, rng: &mut impl RandomSource) -> TurnReport {
    fort::progress_all(world)
        .then(tick_leases)
        .then(|w| merchant::spawn_merchants(w, &mut *rng))
        .then(merchant::advance_all)
        .then(|w| bandit::spawn_bandits(w, &mut *rng))
        .then(|w| bandit::engage_and_move(w, &mut *rng))
}

/// Hand the turn to the other nation, sweeping when a new round begins
pub fn end_turn(world: &WorldModel, rng: &mut impl RandomSource) -> TurnReport {
    let mut next = world.clone();
    next.current_player = world.current_player.opponent();

    if next.current_player != PlayerId::FIRST {
        return TurnReport {
            world: next,
            events: Vec::new(),
        };
    }

    next.turn += 1;
    // Assaults nobody answered lapse with the round
    next.pending_assaults.clear();
    let _span = tracing::info_span!("sweep", turn = next.turn).entered();
    let report = sweep(&next, rng);
    tracing::debug!(events = report.events.len(), "sweep finished");
    report
}
