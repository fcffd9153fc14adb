//! Combat resolution
//!
//! An engagement ends one of three ways, chosen by the defender: a fought
//! battle, a retreat, or a surrender. The `resolve_*` functions are pure
//! arithmetic over unit counts and reputation; [`engage`] applies the result
//! to a world snapshot.

use serde::{Deserialize, Serialize};

use super::floor_count;
use super::fort;
use super::map::hex_distance;
use super::reputation::{after_battle, fear_power, justice_power};
use crate::core::config::rules;
use crate::core::error::ActionError;
use crate::core::rng::RandomSource;
use crate::core::types::CellId;
use crate::world::{Cell, Ownership, Reputation, WorldModel};

/// Share of the winning stack that survives a battle
pub const WINNER_SURVIVAL_RATE: f64 = 0.6;

/// Retreat survival before streak penalties
pub const RETREAT_BASE_SURVIVAL: f64 = 0.7;
/// Survival lost per consecutive earlier retreat
pub const RETREAT_STREAK_PENALTY: f64 = 0.1;
pub const RETREAT_MAX_PENALTY: f64 = 0.3;
pub const RETREAT_MIN_SURVIVAL: f64 = 0.3;

/// Surrendered troops executed, scaled by the victor's fear power
pub const EXECUTION_RATE: f64 = 0.5;
/// Remaining troops recruited, scaled by the victor's justice power
pub const RECRUIT_RATE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Attacker,
    Defender,
}

/// Defender's response to an attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Engagement {
    #[default]
    Fight,
    Retreat,
    Surrender,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleResult {
    pub winner: Side,
    pub attacker_power: f64,
    pub defender_power: f64,
    /// Chance the attacker had of winning
    pub win_probability: f64,
    pub attacker_survivors: u32,
    pub defender_survivors: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetreatResult {
    pub survival_rate: f64,
    pub survivors: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurrenderResult {
    pub deaths: u32,
    pub recruited: u32,
    pub escaped: u32,
}

/// What happened in an engagement, after it was applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatReport {
    Battle {
        attacker: CellId,
        defender: CellId,
        result: BattleResult,
        /// Gold paid for destroying a mercenary band
        bounty: u32,
        /// Fort garrison returned to the captured cell
        released: u32,
    },
    Retreat {
        attacker: CellId,
        defender: CellId,
        result: RetreatResult,
        /// Where the survivors went; `None` means they were destroyed
        refuge: Option<CellId>,
        released: u32,
    },
    Surrender {
        attacker: CellId,
        defender: CellId,
        result: SurrenderResult,
        released: u32,
    },
}

/// A world after an engagement, with the report of what happened
#[derive(Debug, Clone)]
pub struct Engaged {
    pub world: WorldModel,
    pub report: CombatReport,
}

/// `units × (1 + fear / 100)`
pub fn combat_power(units: u32, fear: f64) -> f64 {
    units as f64 * (1.0 + fear / 100.0)
}

/// Attacker's share of the total power; 0 when neither side has any
pub fn win_probability(attacker_power: f64, defender_power: f64) -> f64 {
    let total = attacker_power + defender_power;
    if total <= 0.0 {
        0.0
    } else {
        attacker_power / total
    }
}

fn winner_survivors(units: u32) -> u32 {
    if units == 0 {
        return 0;
    }
    floor_count(units as f64 * WINNER_SURVIVAL_RATE).max(1)
}

/// Fight it out. One draw decides the winner; the loser is wiped out.
pub fn resolve_battle(
    attacker: &Cell,
    defender: &Cell,
    attacker_rep: Reputation,
    defender_fear: f64,
    rng: &mut impl RandomSource,
) -> BattleResult {
    let attacker_power = combat_power(attacker.unit_count, attacker_rep.fear);
    let defender_power = combat_power(defender.unit_count, defender_fear);
    let p = win_probability(attacker_power, defender_power);
    let roll = rng.next_f64();
    let winner = if roll < p { Side::Attacker } else { Side::Defender };

    tracing::debug!(
        attacker = %attacker.id,
        defender = %defender.id,
        p,
        roll,
        ?winner,
        "battle rolled"
    );

    let (attacker_survivors, defender_survivors) = match winner {
        Side::Attacker => (winner_survivors(attacker.unit_count), 0),
        Side::Defender => (0, winner_survivors(defender.unit_count)),
    };

    BattleResult {
        winner,
        attacker_power,
        defender_power,
        win_probability: p,
        attacker_survivors,
        defender_survivors,
    }
}

/// `max(0.3, 0.7 − min(0.3, streak × 0.1))`
pub fn retreat_survival_rate(retreat_streak: u32) -> f64 {
    let penalty = (retreat_streak as f64 * RETREAT_STREAK_PENALTY).min(RETREAT_MAX_PENALTY);
    (RETREAT_BASE_SURVIVAL - penalty).max(RETREAT_MIN_SURVIVAL)
}

/// Fall back, losing a share that grows with consecutive retreats
pub fn resolve_retreat(defender: &Cell) -> RetreatResult {
    let survival_rate = retreat_survival_rate(defender.retreat_streak);
    let survivors = if defender.unit_count == 0 {
        0
    } else {
        floor_count(defender.unit_count as f64 * survival_rate).max(1)
    };
    RetreatResult {
        survival_rate,
        survivors,
    }
}

/// Lay down arms. A feared victor executes, a just one recruits.
pub fn resolve_surrender(troops: u32, attacker_rep: Reputation) -> SurrenderResult {
    let deaths = floor_count(troops as f64 * fear_power(attacker_rep.fear) * EXECUTION_RATE).min(troops);
    let remaining = troops - deaths;
    let recruited =
        floor_count(remaining as f64 * justice_power(attacker_rep.justice) * RECRUIT_RATE).min(remaining);
    SurrenderResult {
        deaths,
        recruited,
        escaped: remaining - recruited,
    }
}

/// Whether two occupants fight on the same side
pub fn same_side(a: &Ownership, b: &Ownership) -> bool {
    match (a.player(), b.player()) {
        (Some(x), Some(y)) => x == y,
        (None, None) => a == b && !a.is_empty(),
        _ => false,
    }
}

/// Reputation an occupant fights with. Neutrals use the configured fear and no justice.
pub fn side_reputation(world: &WorldModel, ownership: &Ownership) -> Reputation {
    ownership
        .player()
        .and_then(|p| world.player(p))
        .map(|p| p.reputation)
        .unwrap_or_else(|| Reputation::new(rules().neutral_fear, 0.0))
}

/// Empty neighbour of `from` farthest from the nearest unit `is_enemy` accepts
///
/// Candidates come from the six-direction set. The score is the minimum
/// hex distance to any enemy stack; ties keep the earliest candidate.
pub fn pick_retreat_cell(
    world: &WorldModel,
    from: CellId,
    is_enemy: impl Fn(&Cell) -> bool,
) -> Option<CellId> {
    let enemies: Vec<CellId> = world
        .cells
        .iter()
        .filter(|c| c.unit_count > 0 && is_enemy(c))
        .map(|c| c.id)
        .collect();

    let mut best: Option<(CellId, u32)> = None;
    for candidate in world.neighbors(from) {
        if !world.cell(candidate).is_some_and(Cell::is_empty) {
            continue;
        }
        let spacing = enemies
            .iter()
            .map(|e| hex_distance(candidate, *e))
            .min()
            .unwrap_or(u32::MAX);
        if best.map_or(true, |(_, s)| spacing > s) {
            best = Some((candidate, spacing));
        }
    }
    best.map(|(id, _)| id)
}

/// Resolve an attack from `attacker` on `defender` with the defender's chosen response
///
/// Cells must exist, both must hold units, and they must be on opposing
/// sides. Adjacency and turn order are the caller's business.
pub fn engage(
    world: &WorldModel,
    attacker: CellId,
    defender: CellId,
    engagement: Engagement,
    rng: &mut impl RandomSource,
) -> Result<Engaged, ActionError> {
    let att = world.try_cell(attacker)?;
    let def = world.try_cell(defender)?;
    if matches!(att.ownership, Ownership::Empty | Ownership::Merchant(_)) {
        return Err(ActionError::Ineligible {
            cell: attacker,
            reason: "no fighting force here",
        });
    }
    if att.unit_count == 0 {
        return Err(ActionError::InsufficientUnits { need: 1, have: 0 });
    }
    if def.unit_count == 0 {
        return Err(ActionError::InvalidTarget {
            cell: defender,
            reason: "nothing to attack",
        });
    }
    if same_side(&att.ownership, &def.ownership) {
        return Err(ActionError::InvalidTarget {
            cell: defender,
            reason: "cannot attack your own side",
        });
    }

    let attacker_rep = side_reputation(world, &att.ownership);
    let defender_rep = side_reputation(world, &def.ownership);
    let mut next = world.clone();

    let report = match engagement {
        Engagement::Fight => {
            let result = resolve_battle(att, def, attacker_rep, defender_rep.fear, rng);
            let mut bounty = 0;
            let mut released = 0;
            match result.winner {
                Side::Attacker => {
                    released = capture(&mut next, att, defender, result.attacker_survivors, true)?;
                    if def.ownership == Ownership::Mercenary {
                        if let Some(owner) = att.ownership.army_owner() {
                            bounty = def.unit_count.saturating_mul(rules().mercenary_bounty_per_unit);
                            let payee = next.try_player_mut(owner)?;
                            payee.gold = payee.gold.saturating_add(bounty);
                        }
                    }
                }
                Side::Defender => {
                    next.try_cell_mut(attacker)?.vacate();
                    let held = next.try_cell_mut(defender)?;
                    held.unit_count = result.defender_survivors;
                    held.retreat_streak = 0;
                }
            }

            let attacker_losses = att.unit_count.saturating_sub(result.attacker_survivors);
            let defender_losses = def.unit_count.saturating_sub(result.defender_survivors);
            let attacker_won = result.winner == Side::Attacker;
            if let Some(p) = att.ownership.player() {
                let player = next.try_player_mut(p)?;
                player.reputation = after_battle(
                    player.reputation,
                    attacker_won,
                    defender_losses,
                    attacker_losses,
                );
            }
            if let Some(p) = def.ownership.player() {
                let player = next.try_player_mut(p)?;
                player.reputation = after_battle(
                    player.reputation,
                    !attacker_won,
                    attacker_losses,
                    defender_losses,
                );
            }

            CombatReport::Battle {
                attacker,
                defender,
                result,
                bounty,
                released,
            }
        }
        Engagement::Retreat => {
            let result = resolve_retreat(def);
            let refuge = pick_retreat_cell(world, defender, |c| same_side(&c.ownership, &att.ownership));
            if let Some(to) = refuge {
                let mut ownership = def.ownership.clone();
                if let Ownership::Merchant(info) = &mut ownership {
                    info.route.clear();
                    info.detour_attempted = false;
                }
                let cell = next.try_cell_mut(to)?;
                cell.occupy(ownership, result.survivors);
                cell.unit_type = def.unit_type;
                cell.retreat_streak = def.retreat_streak + 1;
            } else {
                tracing::debug!(cell = %defender, "no room to retreat, band destroyed");
            }
            // The garrison left with the survivors; nothing is handed over
            let released = capture(&mut next, att, defender, att.unit_count, false)?;
            CombatReport::Retreat {
                attacker,
                defender,
                result,
                refuge,
                released,
            }
        }
        Engagement::Surrender => {
            let result = resolve_surrender(def.unit_count, attacker_rep);
            let released = capture(&mut next, att, defender, att.unit_count + result.recruited, true)?;
            CombatReport::Surrender {
                attacker,
                defender,
                result,
                released,
            }
        }
    };

    Ok(Engaged {
        world: next,
        report,
    })
}

/// Move the attacking stack onto a taken cell, tearing down any fort there
///
/// With `take_garrison` the frozen garrison joins the captor; otherwise the
/// fort is simply cleared. Returns the units handed over.
fn capture(
    next: &mut WorldModel,
    attacker: &Cell,
    target: CellId,
    units: u32,
    take_garrison: bool,
) -> Result<u32, ActionError> {
    let cell = next.try_cell_mut(target)?;
    cell.vacate();
    cell.occupy(attacker.ownership.clone(), units);
    cell.unit_type = attacker.unit_type;
    cell.retreat_streak = 0;
    let released = if take_garrison {
        fort::cancel(cell)
    } else {
        fort::abandon(cell);
        0
    };
    if released > 0 {
        tracing::info!(cell = %target, released, "fort torn down after capture");
    }
    next.try_cell_mut(attacker.id)?.vacate();
    Ok(released)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::ScriptedRng;
    use crate::core::types::PlayerId;
    use crate::world::{blank_world, Building, FortState};

    fn stack(units: u32, streak: u32) -> Cell {
        let mut cell = Cell::new(CellId::new(0, 0));
        cell.occupy(Ownership::army(PlayerId(0)), units);
        cell.retreat_streak = streak;
        cell
    }

    fn duel(att_units: u32, def_units: u32) -> (WorldModel, CellId, CellId) {
        let mut world = blank_world(5, 5);
        let a = CellId::new(2, 1);
        let d = CellId::new(2, 2);
        world.set_occupant(a, Ownership::army(PlayerId(0)), att_units);
        world.set_occupant(d, Ownership::army(PlayerId(1)), def_units);
        (world, a, d)
    }

    #[test]
    fn test_power_and_probability() {
        assert!((combat_power(5, 80.0) - 9.0).abs() < 1e-12);
        assert_eq!(win_probability(0.0, 0.0), 0.0);
        assert!((win_probability(3.0, 1.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_battle_draw_decides_winner() {
        let att = stack(5, 0);
        let def = stack(5, 0);
        let rep = Reputation::new(50.0, 50.0);

        let won = resolve_battle(&att, &def, rep, 50.0, &mut ScriptedRng::constant(0.49));
        assert_eq!(won.winner, Side::Attacker);
        assert_eq!((won.attacker_survivors, won.defender_survivors), (3, 0));

        let lost = resolve_battle(&att, &def, rep, 50.0, &mut ScriptedRng::constant(0.5));
        assert_eq!(lost.winner, Side::Defender);
        assert_eq!((lost.attacker_survivors, lost.defender_survivors), (0, 3));
    }

    #[test]
    fn test_single_unit_winner_survives() {
        let att = stack(1, 0);
        let def = stack(1, 0);
        let result = resolve_battle(&att, &def, Reputation::default(), 50.0, &mut ScriptedRng::constant(0.0));
        assert_eq!(result.attacker_survivors, 1);
    }

    #[test]
    fn test_retreat_streak_penalty() {
        assert_eq!(resolve_retreat(&stack(10, 0)).survivors, 7);
        let third = resolve_retreat(&stack(10, 3));
        assert!((third.survival_rate - 0.4).abs() < 1e-9);
        assert_eq!(third.survivors, 4);
        assert_eq!(resolve_retreat(&stack(10, 9)).survivors, 3);
        assert_eq!(resolve_retreat(&stack(1, 9)).survivors, 1);
    }

    #[test]
    fn test_surrender_split() {
        let feared = resolve_surrender(10, Reputation::new(100.0, 100.0));
        assert_eq!(
            feared,
            SurrenderResult {
                deaths: 5,
                recruited: 3,
                escaped: 2
            }
        );
        let mild = resolve_surrender(10, Reputation::new(50.0, 50.0));
        assert_eq!((mild.deaths, mild.recruited, mild.escaped), (1, 1, 8));
        let total = resolve_surrender(7, Reputation::new(20.0, 90.0));
        assert_eq!(total.deaths + total.recruited + total.escaped, 7);
    }

    #[test]
    fn test_engage_attacker_wins_and_takes_cell() {
        let (world, a, d) = duel(5, 4);
        let out = engage(&world, a, d, Engagement::Fight, &mut ScriptedRng::constant(0.1)).unwrap();
        let held = out.world.cell(d).unwrap();
        assert_eq!(held.ownership.army_owner(), Some(PlayerId(0)));
        assert_eq!(held.unit_count, 3);
        assert!(out.world.cell(a).unwrap().is_empty());

        // 4 kills, 2 losses: +1 fear, +1 justice for the winner
        assert_eq!(out.world.players[0].reputation, Reputation::new(51.0, 51.0));
        assert_eq!(out.world.players[1].reputation, Reputation::new(49.0, 47.0));
        assert!(out.world.check_invariants().is_ok());
    }

    #[test]
    fn test_engage_defender_holds() {
        let (world, a, d) = duel(2, 8);
        let out = engage(&world, a, d, Engagement::Fight, &mut ScriptedRng::constant(0.9)).unwrap();
        assert!(out.world.cell(a).unwrap().is_empty());
        assert_eq!(out.world.cell(d).unwrap().unit_count, 4);
        // Defender killed 2 and lost 4: +3 fear, +1 justice
        assert_eq!(out.world.players[1].reputation, Reputation::new(53.0, 51.0));
    }

    #[test]
    fn test_mercenary_bounty() {
        let mut world = blank_world(5, 5);
        let a = CellId::new(1, 1);
        let m = CellId::new(1, 2);
        world.set_occupant(a, Ownership::army(PlayerId(0)), 6);
        world.set_occupant(m, Ownership::Mercenary, 3);
        let out = engage(&world, a, m, Engagement::Fight, &mut ScriptedRng::constant(0.0)).unwrap();
        match out.report {
            CombatReport::Battle { bounty, .. } => assert_eq!(bounty, 150),
            other => panic!("unexpected report {:?}", other),
        }
        assert_eq!(out.world.players[0].gold, 1150);
    }

    #[test]
    fn test_retreat_moves_away_from_enemy() {
        let (world, a, d) = duel(5, 10);
        let out = engage(&world, a, d, Engagement::Retreat, &mut ScriptedRng::constant(0.0)).unwrap();
        let CombatReport::Retreat { refuge, result, .. } = out.report else {
            panic!("expected retreat");
        };
        // (1,2) and (2,3) both sit two steps from (2,1); the first one wins
        assert_eq!(refuge, Some(CellId::new(1, 2)));
        let fled = out.world.cell(CellId::new(1, 2)).unwrap();
        assert_eq!(fled.unit_count, result.survivors);
        assert_eq!(fled.retreat_streak, 1);
        assert_eq!(out.world.cell(d).unwrap().ownership.army_owner(), Some(PlayerId(0)));
        assert_eq!(out.world.cell(d).unwrap().unit_count, 5);
    }

    #[test]
    fn test_retreat_without_room_destroys_band() {
        let mut world = blank_world(5, 5);
        let d = CellId::new(0, 0);
        let a = CellId::new(0, 1);
        world.set_occupant(d, Ownership::army(PlayerId(1)), 4);
        world.set_occupant(a, Ownership::army(PlayerId(0)), 3);
        world.set_occupant(CellId::new(1, 0), Ownership::Bandit, 1);
        let out = engage(&world, a, d, Engagement::Retreat, &mut ScriptedRng::constant(0.0)).unwrap();
        assert!(matches!(out.report, CombatReport::Retreat { refuge: None, .. }));
        assert_eq!(out.world.cells.iter().filter(|c| c.ownership.army_owner() == Some(PlayerId(1))).count(), 0);
    }

    #[test]
    fn test_retreat_from_fort_conserves_units() {
        let (mut world, a, d) = duel(4, 5);
        let fort_cell = world.cell_mut(d).unwrap();
        fort_cell.building = Some(Building::Fort);
        fort_cell.fort = FortState::Complete { garrison_units: 5 };
        let out = engage(&world, a, d, Engagement::Retreat, &mut ScriptedRng::constant(0.0)).unwrap();
        let CombatReport::Retreat { refuge, released, result, .. } = out.report else {
            panic!("expected retreat");
        };
        assert_eq!(released, 0);
        // floor(5 × 0.7) = 3 flee, the attacker walks in with its 4
        assert_eq!(result.survivors, 3);
        let taken = out.world.cell(d).unwrap();
        assert_eq!(taken.unit_count, 4);
        assert_eq!(taken.building, None);
        assert!(taken.fort.is_none());
        let fled = out.world.cell(refuge.unwrap()).unwrap().unit_count;
        assert_eq!(fled, 3);
        let total: u32 = out.world.cells.iter().map(|c| c.unit_count).sum();
        assert_eq!(total, 7);
    }

    #[test]
    fn test_surrender_captures_fort_and_releases_garrison() {
        let (mut world, a, d) = duel(4, 6);
        let fort_cell = world.cell_mut(d).unwrap();
        fort_cell.building = Some(Building::Fort);
        fort_cell.fort = FortState::UnderConstruction {
            stage: 2,
            turns_in_stage: 1,
            garrison_units: 6,
        };
        world.players[0].reputation = Reputation::new(0.0, 100.0);
        let out = engage(&world, a, d, Engagement::Surrender, &mut ScriptedRng::constant(0.0)).unwrap();
        // 6 surrender: none executed, floor(6 × 0.7) = 4 recruited
        let held = out.world.cell(d).unwrap();
        assert_eq!(held.unit_count, 4 + 4 + 6);
        assert_eq!(held.building, None);
        assert!(held.fort.is_none());
        assert!(matches!(out.report, CombatReport::Surrender { released: 6, .. }));
    }

    #[test]
    fn test_engage_rejects_friendly_and_empty_targets() {
        let (mut world, a, d) = duel(4, 4);
        world.set_occupant(d, Ownership::army(PlayerId(0)), 2);
        assert!(matches!(
            engage(&world, a, d, Engagement::Fight, &mut ScriptedRng::constant(0.0)),
            Err(ActionError::InvalidTarget { .. })
        ));
        world.cell_mut(d).unwrap().vacate();
        assert!(matches!(
            engage(&world, a, d, Engagement::Fight, &mut ScriptedRng::constant(0.0)),
            Err(ActionError::InvalidTarget { .. })
        ));
        assert!(matches!(
            engage(&world, a, CellId::new(9, 9), Engagement::Fight, &mut ScriptedRng::constant(0.0)),
            Err(ActionError::CellNotFound(_))
        ));
    }

    #[test]
    fn test_bandit_side_uses_neutral_reputation() {
        let world = blank_world(5, 5);
        let rep = side_reputation(&world, &Ownership::Bandit);
        assert_eq!(rep.fear, 50.0);
        assert_eq!(rep.justice, 0.0);
        assert!(same_side(&Ownership::Bandit, &Ownership::Bandit));
        assert!(!same_side(&Ownership::Bandit, &Ownership::Mercenary));
        assert!(!same_side(&Ownership::Empty, &Ownership::Empty));
    }
}
