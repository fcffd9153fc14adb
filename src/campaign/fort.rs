//! Fortification construction
//!
//! A fort goes through three construction stages before completing. Each
//! sweep adds a turn to the current stage; after `fort_turns_per_stage`
//! turns the stage advances. The garrison that started the work keeps
//! holding the cell and cannot march out while the fort stands.

use super::turn::{TurnEvent, TurnReport};
use crate::core::config::rules;
use crate::core::error::ActionError;
use crate::core::types::{CellId, PlayerId};
use crate::world::{Building, Cell, FortState, WorldModel};

/// Last construction stage before completion
pub const FINAL_STAGE: u8 = 3;

/// Check whether construction may start on `cell`
///
/// Checks run in a fixed order so the first failing reason is reported:
/// existing fort, castle, ownership, garrison size, treasury.
pub fn check_eligibility(cell: &Cell, player_gold: u32) -> Result<(), ActionError> {
    let rules = rules();
    match cell.building {
        Some(Building::Fort) => {
            return Err(ActionError::Ineligible {
                cell: cell.id,
                reason: "a fort already stands here",
            })
        }
        Some(Building::Castle) => {
            return Err(ActionError::Ineligible {
                cell: cell.id,
                reason: "castles cannot be fortified",
            })
        }
        None => {}
    }
    if cell.ownership.army_owner().is_none() {
        return Err(ActionError::Ineligible {
            cell: cell.id,
            reason: "only an army can build a fort",
        });
    }
    if cell.unit_count < rules.fort_min_units {
        return Err(ActionError::InsufficientUnits {
            need: rules.fort_min_units,
            have: cell.unit_count,
        });
    }
    if player_gold < rules.fort_cost {
        return Err(ActionError::InsufficientGold {
            need: rules.fort_cost,
            have: player_gold,
        });
    }
    Ok(())
}

/// Begin construction on a cell held by `player`, charging the build cost
pub fn start_construction(
    world: &WorldModel,
    at: CellId,
    player: PlayerId,
) -> Result<WorldModel, ActionError> {
    let cell = world.try_cell(at)?;
    let gold = world.try_player(player)?.gold;
    check_eligibility(cell, gold)?;
    if cell.ownership.army_owner() != Some(player) {
        return Err(ActionError::NotControlled(at));
    }

    let cost = rules().fort_cost;
    let mut next = world.clone();
    next.try_player_mut(player)?.gold -= cost;
    let cell = next.try_cell_mut(at)?;
    cell.building = Some(Building::Fort);
    cell.fort = FortState::UnderConstruction {
        stage: 1,
        turns_in_stage: 0,
        garrison_units: cell.unit_count,
    };

    tracing::info!(cell = %at, garrison = cell.unit_count, "{} began a fort", player);
    Ok(next)
}

/// One turn of construction progress
pub fn progress(state: FortState) -> FortState {
    let per_stage = rules().fort_turns_per_stage;
    match state {
        FortState::UnderConstruction {
            stage,
            turns_in_stage,
            garrison_units,
        } => {
            let turns = turns_in_stage + 1;
            if turns < per_stage {
                FortState::UnderConstruction {
                    stage,
                    turns_in_stage: turns,
                    garrison_units,
                }
            } else if stage >= FINAL_STAGE {
                FortState::Complete { garrison_units }
            } else {
                FortState::UnderConstruction {
                    stage: stage + 1,
                    turns_in_stage: 0,
                    garrison_units,
                }
            }
        }
        other => other,
    }
}

/// Tear down a fort after the cell changed hands
///
/// Clears the building and returns the frozen garrison into the cell's
/// active count. Returns the number of units released.
pub fn cancel(cell: &mut Cell) -> u32 {
    let released = cell.fort.garrison_units();
    if cell.fort.is_none() {
        return 0;
    }
    cell.fort = FortState::None;
    cell.building = None;
    cell.unit_count += released;
    released
}

/// Clear a fort whose garrison marched out, crediting nobody
///
/// Returns the garrison figure that was dropped.
pub fn abandon(cell: &mut Cell) -> u32 {
    let dropped = cell.fort.garrison_units();
    cell.fort = FortState::None;
    if cell.building == Some(Building::Fort) {
        cell.building = None;
    }
    dropped
}

/// Advance every fort under construction by one turn
pub fn progress_all(world: &WorldModel) -> TurnReport {
    let mut next = world.clone();
    let mut events = Vec::new();

    for cell in next.cells.iter_mut() {
        let before = cell.fort;
        if !matches!(before, FortState::UnderConstruction { .. }) {
            continue;
        }
        let after = progress(before);
        cell.fort = after;
        match (before, after) {
            (_, FortState::Complete { .. }) => {
                tracing::info!(cell = %cell.id, "fort completed");
                events.push(TurnEvent::FortCompleted { cell: cell.id });
            }
            (
                FortState::UnderConstruction { stage: old, .. },
                FortState::UnderConstruction { stage: new, .. },
            ) if new != old => {
                tracing::debug!(cell = %cell.id, stage = new, "fort stage advanced");
                events.push(TurnEvent::FortAdvanced {
                    cell: cell.id,
                    stage: new,
                });
            }
            _ => {}
        }
    }

    TurnReport {
        world: next,
        events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{blank_world, Ownership};

    fn garrisoned(units: u32) -> (WorldModel, CellId) {
        let mut world = blank_world(5, 5);
        let at = CellId::new(2, 2);
        world.set_occupant(at, Ownership::army(PlayerId(0)), units);
        (world, at)
    }

    #[test]
    fn test_start_construction_freezes_garrison_and_charges() {
        let (world, at) = garrisoned(5);
        let next = start_construction(&world, at, PlayerId(0)).unwrap();
        let cell = next.cell(at).unwrap();
        assert_eq!(cell.building, Some(Building::Fort));
        assert_eq!(
            cell.fort,
            FortState::UnderConstruction {
                stage: 1,
                turns_in_stage: 0,
                garrison_units: 5
            }
        );
        // Garrison keeps occupying the cell
        assert_eq!(cell.unit_count, 5);
        assert_eq!(next.players[0].gold, 500);
        // Input snapshot untouched
        assert_eq!(world.players[0].gold, 1000);
    }

    #[test]
    fn test_eligibility_order() {
        let (mut world, at) = garrisoned(2);
        world.players[0].gold = 100;
        // Both units and gold are short: units reported first
        assert_eq!(
            start_construction(&world, at, PlayerId(0)).unwrap_err(),
            ActionError::InsufficientUnits { need: 3, have: 2 }
        );

        let (mut world, at) = garrisoned(4);
        world.players[0].gold = 499;
        assert_eq!(
            start_construction(&world, at, PlayerId(0)).unwrap_err(),
            ActionError::InsufficientGold { need: 500, have: 499 }
        );
    }

    #[test]
    fn test_castle_and_existing_fort_rejected() {
        let (mut world, at) = garrisoned(5);
        world.cell_mut(at).unwrap().building = Some(Building::Castle);
        assert!(matches!(
            start_construction(&world, at, PlayerId(0)),
            Err(ActionError::Ineligible { .. })
        ));

        let (world, at) = garrisoned(5);
        let built = start_construction(&world, at, PlayerId(0)).unwrap();
        assert!(matches!(
            start_construction(&built, at, PlayerId(0)),
            Err(ActionError::Ineligible { .. })
        ));
    }

    #[test]
    fn test_cannot_fortify_enemy_or_neutral_cell() {
        let (world, at) = garrisoned(5);
        assert_eq!(
            start_construction(&world, at, PlayerId(1)).unwrap_err(),
            ActionError::NotControlled(at)
        );

        let mut world = blank_world(5, 5);
        world.set_occupant(at, Ownership::Mercenary, 5);
        assert!(matches!(
            start_construction(&world, at, PlayerId(0)),
            Err(ActionError::Ineligible { .. })
        ));
    }

    #[test]
    fn test_six_ticks_to_complete() {
        let mut state = FortState::UnderConstruction {
            stage: 1,
            turns_in_stage: 0,
            garrison_units: 5,
        };
        let mut stages = Vec::new();
        for _ in 0..6 {
            state = progress(state);
            stages.push(state);
        }
        assert!(matches!(stages[0], FortState::UnderConstruction { stage: 1, turns_in_stage: 1, .. }));
        assert!(matches!(stages[1], FortState::UnderConstruction { stage: 2, turns_in_stage: 0, .. }));
        assert!(matches!(stages[3], FortState::UnderConstruction { stage: 3, .. }));
        assert!(matches!(stages[4], FortState::UnderConstruction { stage: 3, turns_in_stage: 1, .. }));
        assert_eq!(stages[5], FortState::Complete { garrison_units: 5 });
        // Complete is terminal
        assert_eq!(progress(stages[5]), stages[5]);
    }

    #[test]
    fn test_cancel_returns_garrison() {
        let (world, at) = garrisoned(5);
        let mut built = start_construction(&world, at, PlayerId(0)).unwrap();
        let cell = built.cell_mut(at).unwrap();
        cell.unit_count = 2;
        assert_eq!(cancel(cell), 5);
        assert_eq!(cell.unit_count, 7);
        assert_eq!(cell.building, None);
        assert!(cell.fort.is_none());
        assert_eq!(cancel(cell), 0);
    }

    #[test]
    fn test_abandon_credits_nobody() {
        let (world, at) = garrisoned(5);
        let mut built = start_construction(&world, at, PlayerId(0)).unwrap();
        let cell = built.cell_mut(at).unwrap();
        assert_eq!(abandon(cell), 5);
        assert_eq!(cell.unit_count, 5);
        assert_eq!(cell.building, None);
        assert!(cell.fort.is_none());
    }

    #[test]
    fn test_progress_all_reports_stage_changes() {
        let (world, at) = garrisoned(3);
        let mut world = start_construction(&world, at, PlayerId(0)).unwrap();
        let mut seen = Vec::new();
        for _ in 0..6 {
            let report = progress_all(&world);
            world = report.world;
            seen.extend(report.events);
        }
        assert_eq!(
            seen,
            vec![
                TurnEvent::FortAdvanced { cell: at, stage: 2 },
                TurnEvent::FortAdvanced { cell: at, stage: 3 },
                TurnEvent::FortCompleted { cell: at },
            ]
        );
        assert!(world.cell(at).unwrap().is_trade_post());
    }
}
