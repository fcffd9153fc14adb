//! Caravan lifecycle
//!
//! `Idle -> Outbound -> AtTarget -> Returning -> Idle`. A caravan walks its
//! planned route one cell per sweep, trades at the destination for a few
//! sweeps, walks home (faster on roads) and pays out on arrival. Caravans
//! persist between trips; only their trip data is cleared.

use ahash::AHashSet;

use super::map::{adjacent6, hex_distance};
use super::route::{plan_detour, plan_route};
use super::trade::settle;
use super::turn::{TurnEvent, TurnReport};
use crate::core::config::rules;
use crate::core::error::ActionError;
use crate::core::rng::RandomSource;
use crate::core::types::{CellId, PlayerId};
use crate::world::{MerchantInfo, MerchantPhase, Ownership, WorldModel};

/// Send an idle caravan of `actor` to trade at `destination`
///
/// The caravan's current cell becomes its origin and an empty cargo is
/// restocked. Returns the new world and the planned route length.
pub fn dispatch(
    world: &WorldModel,
    merchant: CellId,
    destination: CellId,
    actor: PlayerId,
) -> Result<(WorldModel, usize), ActionError> {
    let info = world
        .try_cell(merchant)?
        .merchant()
        .ok_or(ActionError::InvalidTarget {
            cell: merchant,
            reason: "no caravan here",
        })?;
    if info.owner != actor {
        return Err(ActionError::NotControlled(merchant));
    }
    if info.phase != MerchantPhase::Idle {
        return Err(ActionError::Ineligible {
            cell: merchant,
            reason: "caravan is already on a trip",
        });
    }
    if !world.try_cell(destination)?.is_trade_post() {
        return Err(ActionError::InvalidTarget {
            cell: destination,
            reason: "caravans trade only at castles and completed forts",
        });
    }
    if destination == merchant {
        return Err(ActionError::InvalidTarget {
            cell: destination,
            reason: "caravan is already there",
        });
    }

    let route = plan_route(world, merchant, destination);
    let route_len = route.len();
    let mut next = world.clone();
    if let Some(info) = next.try_cell_mut(merchant)?.merchant_mut() {
        info.route = route.into();
        info.destination = Some(destination);
        info.origin = Some(merchant);
        info.phase = MerchantPhase::Outbound;
        info.detour_attempted = false;
        if info.gold == 0 {
            info.gold = rules().merchant_base_cargo;
        }
    }
    tracing::debug!(%merchant, %destination, route_len, "caravan dispatched");
    Ok((next, route_len))
}

/// Top up each nation's caravans to one fewer than its completed forts
///
/// Nations with fewer than two completed forts get none. A new caravan
/// appears beside the nation's castle; with no free cell there, nothing
/// spawns.
pub fn spawn_merchants(world: &WorldModel, rng: &mut impl RandomSource) -> TurnReport {
    let mut next = world.clone();
    let mut events = Vec::new();
    let r = rules();

    for player in [PlayerId::FIRST, PlayerId::SECOND] {
        let forts = next.complete_forts_of(player);
        if forts.len() < 2 || next.merchant_count(player) >= forts.len() - 1 {
            continue;
        }
        let fort = forts[rng.pick_index(forts.len())];
        let gold = rng.range_inclusive(r.merchant_base_cargo, r.merchant_max_spawn_cargo);
        let Some(castle) = next.castle_of(player) else {
            continue;
        };
        let Some(cell) = next
            .cardinal_neighbors(castle)
            .into_iter()
            .find(|n| next.cell(*n).is_some_and(|c| c.is_empty()))
        else {
            tracing::debug!(%player, "no room beside the castle for a caravan");
            continue;
        };

        next.set_occupant(
            cell,
            Ownership::Merchant(MerchantInfo::new(player, gold)),
            r.merchant_units,
        );
        tracing::info!(%player, %cell, gold, "caravan spawned");
        events.push(TurnEvent::MerchantSpawned {
            cell,
            owner: player,
            gold,
            fort,
        });
    }

    TurnReport {
        world: next,
        events,
    }
}

/// Run one sweep of every caravan on the board, in row-major order
pub fn advance_all(world: &WorldModel) -> TurnReport {
    let mut next = world.clone();
    let mut events = Vec::new();
    let mut settled: AHashSet<CellId> = AHashSet::new();

    for at in world.merchant_cells() {
        if settled.contains(&at) {
            continue;
        }
        let end = step(&mut next, at, &mut events);
        settled.insert(end);
    }

    TurnReport {
        world: next,
        events,
    }
}

/// Run one sweep of the caravan on `at` alone
pub fn advance(world: &WorldModel, at: CellId) -> TurnReport {
    let mut next = world.clone();
    let mut events = Vec::new();
    step(&mut next, at, &mut events);
    TurnReport {
        world: next,
        events,
    }
}

/// Every six-direction neighbour is off the board or closed to the caravan
fn surrounded(world: &WorldModel, at: CellId, owner: PlayerId) -> bool {
    adjacent6(at).all(|n| {
        !world
            .cell(n)
            .is_some_and(|c| c.is_empty() || c.ownership.army_owner() == Some(owner))
    })
}

/// Move the occupant of `from` onto the empty cell `to`
fn relocate(world: &mut WorldModel, from: CellId, to: CellId) {
    let Some(mover) = world.cell(from).cloned() else {
        return;
    };
    if let Some(dest) = world.cell_mut(to) {
        dest.occupy(mover.ownership, mover.unit_count);
        dest.unit_type = mover.unit_type;
        dest.retreat_streak = mover.retreat_streak;
    }
    if let Some(src) = world.cell_mut(from) {
        src.vacate();
        src.retreat_streak = 0;
    }
}

/// Step onto `to`, paving it if this is a seasoned outbound route
fn enter(
    world: &mut WorldModel,
    info: &MerchantInfo,
    from: CellId,
    to: CellId,
    events: &mut Vec<TurnEvent>,
) {
    relocate(world, from, to);
    events.push(TurnEvent::MerchantMoved { from, to });
    if info.phase == MerchantPhase::Outbound && info.round_trips >= rules().paving_round_trips {
        if let Some(cell) = world.cell_mut(to) {
            if !cell.has_road {
                cell.has_road = true;
                tracing::info!(cell = %to, "road paved");
                events.push(TurnEvent::RoadPaved { cell: to });
            }
        }
    }
}

/// Reach the goal of the current leg
fn arrive(world: &mut WorldModel, info: &mut MerchantInfo, at: CellId, events: &mut Vec<TurnEvent>) {
    match info.phase {
        MerchantPhase::Outbound => {
            info.phase = MerchantPhase::AtTarget;
            info.dwell_turns_left = rules().merchant_dwell_turns;
            info.route.clear();
            info.detour_attempted = false;
            events.push(TurnEvent::MerchantArrived {
                cell: at,
                destination: info.destination.unwrap_or(at),
            });
        }
        MerchantPhase::Returning => deliver(world, info, at, events),
        MerchantPhase::Idle | MerchantPhase::AtTarget => {}
    }
}

/// Pay out the cargo and reset the caravan for its next trip
///
/// The caravan stays on the board, idle, so its round-trip count keeps
/// building toward paved roads.
fn deliver(world: &mut WorldModel, info: &mut MerchantInfo, at: CellId, events: &mut Vec<TurnEvent>) {
    let owner = info.owner;
    let destination = info.destination.and_then(|d| world.cell(d).cloned());
    if let Some(dest) = destination {
        let origin = info.origin.unwrap_or(at);
        let quote = settle(world, info.gold, hex_distance(origin, dest.id), &dest);
        if let Some(p) = world.player_mut(owner) {
            p.gold += quote.net;
        }
        if let Some(collector) = quote.levied_by.filter(|c| *c != owner) {
            if let Some(p) = world.player_mut(collector) {
                p.gold += quote.tax;
            }
        }
        tracing::info!(
            %owner,
            cell = %at,
            gross = quote.gross,
            tax = quote.tax,
            net = quote.net,
            "cargo delivered"
        );
        events.push(TurnEvent::MerchantDelivered {
            cell: at,
            owner,
            gross: quote.gross,
            tax: quote.tax,
            net: quote.net,
        });
    }
    info.round_trips += 1;
    info.clear_trip();
}

/// Advance one caravan. Returns the cell it ends the sweep on.
fn step(world: &mut WorldModel, at: CellId, events: &mut Vec<TurnEvent>) -> CellId {
    let Some(mut info) = world.cell(at).and_then(|c| c.merchant()).cloned() else {
        return at;
    };
    let mut pos = at;
    run_leg(world, &mut info, &mut pos, events);
    if let Some(cell) = world.cell_mut(pos) {
        cell.ownership = Ownership::Merchant(info);
    }
    pos
}

fn run_leg(
    world: &mut WorldModel,
    info: &mut MerchantInfo,
    pos: &mut CellId,
    events: &mut Vec<TurnEvent>,
) {
    let r = rules();

    if info.phase == MerchantPhase::Idle {
        if info.route.is_empty() {
            return;
        }
        info.phase = MerchantPhase::Outbound;
    }

    if info.phase == MerchantPhase::AtTarget {
        info.dwell_turns_left = info.dwell_turns_left.saturating_sub(1);
        if info.dwell_turns_left > 0 {
            return;
        }
        info.phase = MerchantPhase::Returning;
        let home = *info.origin.get_or_insert(*pos);
        info.route = plan_route(world, *pos, home).into();
        events.push(TurnEvent::MerchantReturning { cell: *pos });
    }

    let goal = match info.phase {
        MerchantPhase::Outbound => info.destination,
        MerchantPhase::Returning => info.origin,
        MerchantPhase::Idle | MerchantPhase::AtTarget => None,
    };
    let Some(goal) = goal else {
        return;
    };

    if *pos == goal {
        arrive(world, info, *pos, events);
        return;
    }

    if info.route.is_empty() {
        info.route = plan_route(world, *pos, goal).into();
        tracing::debug!(cell = %pos, len = info.route.len(), "route exhausted, replanned");
        events.push(TurnEvent::RouteReplanned {
            cell: *pos,
            length: info.route.len(),
        });
        return;
    }

    if surrounded(world, *pos, info.owner) {
        tracing::debug!(cell = %pos, "caravan surrounded");
        events.push(TurnEvent::MerchantSurrounded { cell: *pos });
        return;
    }

    let on_road = info
        .route
        .front()
        .and_then(|head| world.cell(*head))
        .is_some_and(|c| c.has_road);
    let speed = if info.route.len() <= 2 {
        1
    } else if info.phase == MerchantPhase::Returning && on_road {
        r.road_speed
    } else {
        1
    };

    let mut steps = 0;
    while steps < speed {
        let Some(&head) = info.route.front() else {
            break;
        };
        let Some(next_cell) = world.cell(head) else {
            info.route.pop_front();
            continue;
        };

        if head == goal {
            info.route.pop_front();
            if next_cell.is_empty() {
                enter(world, info, *pos, head, events);
                *pos = head;
            }
            arrive(world, info, *pos, events);
            return;
        }

        match &next_cell.ownership {
            Ownership::Empty => {
                info.route.pop_front();
                enter(world, info, *pos, head, events);
                *pos = head;
                info.detour_attempted = false;
                steps += 1;
            }
            Ownership::Army { player, .. } if *player == info.owner => {
                info.route.pop_front();
                steps += 1;
            }
            Ownership::Army { .. } if !info.detour_attempted => {
                info.detour_attempted = true;
                match plan_detour(world, *pos, goal, info.owner) {
                    Some(path) => {
                        tracing::debug!(cell = %pos, blocked_by = %head, len = path.len(), "detour planned");
                        events.push(TurnEvent::DetourPlanned {
                            cell: *pos,
                            length: path.len(),
                        });
                        info.route = path.into();
                    }
                    None => {
                        tracing::debug!(cell = %pos, blocked_by = %head, "no detour");
                        events.push(TurnEvent::DetourFailed { cell: *pos });
                    }
                }
                break;
            }
            _ => {
                events.push(TurnEvent::MerchantWaiting {
                    cell: *pos,
                    blocked_by: head,
                });
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::ScriptedRng;
    use crate::world::{blank_world, Building, FortState};

    fn caravan(world: &mut WorldModel, at: CellId, gold: u32) {
        world.set_occupant(
            at,
            Ownership::Merchant(MerchantInfo::new(PlayerId(0), gold)),
            2,
        );
    }

    /// 1x6 strip, caravan on (0,0), unheld castle on (0,4)
    fn strip() -> WorldModel {
        let mut world = blank_world(1, 6);
        caravan(&mut world, CellId::new(0, 0), 50);
        world.cell_mut(CellId::new(0, 4)).unwrap().building = Some(Building::Castle);
        world
    }

    fn info_at(world: &WorldModel, at: CellId) -> &MerchantInfo {
        world.cell(at).unwrap().merchant().unwrap()
    }

    fn sweep(world: WorldModel) -> (WorldModel, Vec<TurnEvent>) {
        let report = advance_all(&world);
        (report.world, report.events)
    }

    #[test]
    fn test_dispatch_validation() {
        let mut world = strip();
        let at = CellId::new(0, 0);
        assert!(matches!(
            dispatch(&world, at, CellId::new(0, 3), PlayerId(0)),
            Err(ActionError::InvalidTarget { .. })
        ));
        assert_eq!(
            dispatch(&world, at, CellId::new(0, 4), PlayerId(1)).unwrap_err(),
            ActionError::NotControlled(at)
        );

        world.cell_mut(at).unwrap().merchant_mut().unwrap().gold = 0;
        let (next, len) = dispatch(&world, at, CellId::new(0, 4), PlayerId(0)).unwrap();
        assert_eq!(len, 4);
        let info = info_at(&next, at);
        assert_eq!(info.gold, 50);
        assert_eq!(info.origin, Some(at));
        assert_eq!(info.phase, MerchantPhase::Outbound);

        assert!(matches!(
            dispatch(&next, at, CellId::new(0, 4), PlayerId(0)),
            Err(ActionError::Ineligible { .. })
        ));
    }

    #[test]
    fn test_round_trip_delivers_and_persists() {
        let (mut world, _) = dispatch(&strip(), CellId::new(0, 0), CellId::new(0, 4), PlayerId(0)).unwrap();
        let mut log = Vec::new();
        for _ in 0..9 {
            let (next, events) = sweep(world);
            world = next;
            log.push(events);
        }

        assert!(log[3].contains(&TurnEvent::MerchantArrived {
            cell: CellId::new(0, 4),
            destination: CellId::new(0, 4)
        }));
        assert!(log[5].contains(&TurnEvent::MerchantReturning {
            cell: CellId::new(0, 4)
        }));
        // Unheld castle: no tax, 50 × 2.0 × 1.2
        assert!(log[8].contains(&TurnEvent::MerchantDelivered {
            cell: CellId::new(0, 0),
            owner: PlayerId(0),
            gross: 120,
            tax: 0,
            net: 120
        }));
        assert_eq!(world.players[0].gold, 1120);

        let info = info_at(&world, CellId::new(0, 0));
        assert_eq!(info.phase, MerchantPhase::Idle);
        assert_eq!(info.round_trips, 1);
        assert_eq!(info.gold, 0);
        assert!(info.destination.is_none());
    }

    #[test]
    fn test_dwell_holds_caravan_in_place() {
        let mut world = strip();
        let at = CellId::new(0, 4);
        world.cell_mut(CellId::new(0, 0)).unwrap().vacate();
        caravan(&mut world, at, 50);
        let info = world.cell_mut(at).unwrap().merchant_mut().unwrap();
        info.phase = MerchantPhase::AtTarget;
        info.dwell_turns_left = 2;
        info.origin = Some(CellId::new(0, 0));
        info.destination = Some(at);

        let (world, events) = sweep(world);
        assert!(events.is_empty());
        assert_eq!(info_at(&world, at).dwell_turns_left, 1);

        let (world, _) = sweep(world);
        assert_eq!(info_at(&world, CellId::new(0, 3)).phase, MerchantPhase::Returning);
    }

    #[test]
    fn test_delivery_taxed_by_foreign_castle() {
        let mut world = blank_world(1, 6);
        let home = CellId::new(0, 3);
        let castle = CellId::new(0, 0);
        world.set_occupant(castle, Ownership::army(PlayerId(1)), 5);
        world.cell_mut(castle).unwrap().building = Some(Building::Castle);
        caravan(&mut world, CellId::new(0, 4), 50);
        let info = world.cell_mut(CellId::new(0, 4)).unwrap().merchant_mut().unwrap();
        info.phase = MerchantPhase::Returning;
        info.origin = Some(home);
        info.destination = Some(castle);
        info.route = vec![home].into();

        let (world, events) = sweep(world);
        // Distance 3 from home to castle: 50 × 2 × 1.15 = 115, tax 20% = 23
        assert!(events.contains(&TurnEvent::MerchantDelivered {
            cell: home,
            owner: PlayerId(0),
            gross: 115,
            tax: 23,
            net: 92
        }));
        assert_eq!(world.players[0].gold, 1092);
        assert_eq!(world.players[1].gold, 1023);
    }

    #[test]
    fn test_seasoned_route_paves_outbound() {
        let mut world = strip();
        world.cell_mut(CellId::new(0, 0)).unwrap().merchant_mut().unwrap().round_trips = 2;
        let (world, _) = dispatch(&world, CellId::new(0, 0), CellId::new(0, 4), PlayerId(0)).unwrap();
        let (world, events) = sweep(world);
        assert!(world.cell(CellId::new(0, 1)).unwrap().has_road);
        assert!(events.contains(&TurnEvent::RoadPaved {
            cell: CellId::new(0, 1)
        }));
    }

    #[test]
    fn test_returning_on_road_moves_three() {
        let mut world = blank_world(1, 7);
        let at = CellId::new(0, 5);
        caravan(&mut world, at, 50);
        for col in 1..=4 {
            world.cell_mut(CellId::new(0, col)).unwrap().has_road = true;
        }
        let info = world.cell_mut(at).unwrap().merchant_mut().unwrap();
        info.phase = MerchantPhase::Returning;
        info.origin = Some(CellId::new(0, 0));
        info.destination = Some(at);
        info.route = (0..5).rev().map(|c| CellId::new(0, c)).collect();

        let (world, _) = sweep(world);
        assert!(world.cell(CellId::new(0, 2)).unwrap().merchant().is_some());
        assert!(world.cell(at).unwrap().is_empty());
    }

    #[test]
    fn test_own_army_is_passed_through() {
        let mut world = strip();
        world.set_occupant(CellId::new(0, 1), Ownership::army(PlayerId(0)), 3);
        let (world, _) = dispatch(&world, CellId::new(0, 0), CellId::new(0, 4), PlayerId(0)).unwrap();

        let (world, events) = sweep(world);
        assert!(events.is_empty());
        assert_eq!(info_at(&world, CellId::new(0, 0)).route.len(), 3);

        let (world, _) = sweep(world);
        assert!(world.cell(CellId::new(0, 2)).unwrap().merchant().is_some());
        assert_eq!(world.cell(CellId::new(0, 1)).unwrap().unit_count, 3);
    }

    #[test]
    fn test_hostile_army_triggers_one_detour() {
        let mut world = blank_world(3, 6);
        caravan(&mut world, CellId::new(0, 0), 50);
        world.cell_mut(CellId::new(0, 4)).unwrap().building = Some(Building::Castle);
        let (mut world, _) = dispatch(&world, CellId::new(0, 0), CellId::new(0, 4), PlayerId(0)).unwrap();
        world.set_occupant(CellId::new(0, 1), Ownership::army(PlayerId(1)), 4);

        let (world, events) = sweep(world);
        assert_eq!(
            events,
            vec![TurnEvent::DetourPlanned {
                cell: CellId::new(0, 0),
                length: 5
            }]
        );

        let (world, _) = sweep(world);
        let info = info_at(&world, CellId::new(1, 0));
        assert!(!info.detour_attempted);
    }

    #[test]
    fn test_failed_detour_is_not_retried() {
        let mut world = blank_world(3, 6);
        caravan(&mut world, CellId::new(0, 0), 50);
        world.cell_mut(CellId::new(0, 4)).unwrap().building = Some(Building::Castle);
        let (mut world, _) = dispatch(&world, CellId::new(0, 0), CellId::new(0, 4), PlayerId(0)).unwrap();
        world.set_occupant(CellId::new(0, 1), Ownership::army(PlayerId(1)), 4);
        for row in 0..3 {
            world.set_occupant(CellId::new(row, 2), Ownership::Bandit, 1);
        }

        let (world, events) = sweep(world);
        assert_eq!(
            events,
            vec![TurnEvent::DetourFailed {
                cell: CellId::new(0, 0)
            }]
        );
        let (_, events) = sweep(world);
        assert_eq!(
            events,
            vec![TurnEvent::MerchantWaiting {
                cell: CellId::new(0, 0),
                blocked_by: CellId::new(0, 1)
            }]
        );
    }

    #[test]
    fn test_surrounded_caravan_stays() {
        let mut world = blank_world(1, 3);
        let at = CellId::new(0, 1);
        caravan(&mut world, at, 50);
        world.set_occupant(CellId::new(0, 0), Ownership::Bandit, 1);
        world.set_occupant(CellId::new(0, 2), Ownership::Bandit, 1);
        let info = world.cell_mut(at).unwrap().merchant_mut().unwrap();
        info.phase = MerchantPhase::Outbound;
        info.destination = Some(CellId::new(0, 2));
        info.route = vec![CellId::new(0, 2)].into();

        let (_, events) = sweep(world);
        assert_eq!(events, vec![TurnEvent::MerchantSurrounded { cell: at }]);
    }

    #[test]
    fn test_mercenary_on_path_means_waiting() {
        let mut world = blank_world(3, 6);
        caravan(&mut world, CellId::new(0, 0), 50);
        world.cell_mut(CellId::new(0, 4)).unwrap().building = Some(Building::Castle);
        world.set_occupant(CellId::new(0, 1), Ownership::Mercenary, 3);
        let (world, _) = dispatch(&world, CellId::new(0, 0), CellId::new(0, 4), PlayerId(0)).unwrap();
        let (world, events) = sweep(world);
        assert_eq!(
            events,
            vec![TurnEvent::MerchantWaiting {
                cell: CellId::new(0, 0),
                blocked_by: CellId::new(0, 1)
            }]
        );
        assert!(!info_at(&world, CellId::new(0, 0)).detour_attempted);
    }

    #[test]
    fn test_exhausted_route_is_replanned() {
        let mut world = strip();
        let info = world.cell_mut(CellId::new(0, 0)).unwrap().merchant_mut().unwrap();
        info.phase = MerchantPhase::Outbound;
        info.destination = Some(CellId::new(0, 4));
        info.origin = Some(CellId::new(0, 0));

        let (world, events) = sweep(world);
        assert_eq!(
            events,
            vec![TurnEvent::RouteReplanned {
                cell: CellId::new(0, 0),
                length: 4
            }]
        );
        assert_eq!(info_at(&world, CellId::new(0, 0)).route.len(), 4);
    }

    #[test]
    fn test_spawn_tracks_completed_forts() {
        let mut world = blank_world(7, 7);
        let castle = CellId::new(5, 1);
        world.set_occupant(castle, Ownership::army(PlayerId(0)), 5);
        world.cell_mut(castle).unwrap().building = Some(Building::Castle);
        for fort in [CellId::new(2, 2), CellId::new(2, 4)] {
            world.set_occupant(fort, Ownership::army(PlayerId(0)), 3);
            let cell = world.cell_mut(fort).unwrap();
            cell.building = Some(Building::Fort);
            cell.fort = FortState::Complete { garrison_units: 3 };
        }

        let report = spawn_merchants(&world, &mut ScriptedRng::new([0.0, 0.0]));
        assert_eq!(
            report.events,
            vec![TurnEvent::MerchantSpawned {
                cell: CellId::new(4, 1),
                owner: PlayerId(0),
                gold: 50,
                fort: CellId::new(2, 2)
            }]
        );
        let spawned = report.world.cell(CellId::new(4, 1)).unwrap();
        assert_eq!(spawned.unit_count, 2);

        let again = spawn_merchants(&report.world, &mut ScriptedRng::constant(0.0));
        assert!(again.events.is_empty());
    }
}
