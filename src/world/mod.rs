//! World model: the grid, its cells and the two nations
//!
//! A `WorldModel` is a value. Rule operations borrow one snapshot and return
//! a new one; nothing mutates a world another system is looking at.

pub mod cell;
pub mod player;
pub mod setup;

pub use cell::{
    Building, Cell, DriftOutcome, DriftState, FortState, MerchantInfo, MerchantPhase, Ownership,
};
pub use player::{clamp_axis, Player, Reputation};

use serde::{Deserialize, Serialize};

use crate::campaign::map::{adjacent4, adjacent6};
use crate::core::error::ActionError;
use crate::core::types::{CellId, PlayerId, Turn};

/// Range of values in the trade relation matrix
pub const RELATION_LIMIT: i32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldModel {
    pub rows: i32,
    pub cols: i32,
    /// Row-major, `rows * cols` entries
    pub cells: Vec<Cell>,
    pub turn: Turn,
    pub current_player: PlayerId,
    pub players: [Player; 2],
    /// `trade_relations[a][b]`: how player `a` regards player `b`
    pub trade_relations: Option<[[i32; 2]; 2]>,
    /// Bandit attacks rolled by the last sweep, waiting for the defender to answer
    #[serde(default)]
    pub pending_assaults: Vec<Assault>,
}

/// A gang that chose to attack an army this round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assault {
    pub bandit: CellId,
    pub target: CellId,
}

impl WorldModel {
    /// Empty board with the given nations, turn 1, player 0 to move
    pub fn new(rows: i32, cols: i32, players: [Player; 2]) -> Self {
        let cells = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| Cell::new(CellId::new(row, col))))
            .collect();
        Self {
            rows,
            cols,
            cells,
            turn: 1,
            current_player: PlayerId::FIRST,
            players,
            trade_relations: None,
            pending_assaults: Vec::new(),
        }
    }

    pub fn contains(&self, id: CellId) -> bool {
        (0..self.rows).contains(&id.row) && (0..self.cols).contains(&id.col)
    }

    fn index_of(&self, id: CellId) -> Option<usize> {
        if self.contains(id) {
            Some((id.row * self.cols + id.col) as usize)
        } else {
            None
        }
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.index_of(id).and_then(|i| self.cells.get(i))
    }

    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.index_of(id).and_then(move |i| self.cells.get_mut(i))
    }

    pub fn try_cell(&self, id: CellId) -> Result<&Cell, ActionError> {
        self.cell(id).ok_or(ActionError::CellNotFound(id))
    }

    pub fn try_cell_mut(&mut self, id: CellId) -> Result<&mut Cell, ActionError> {
        self.cell_mut(id).ok_or(ActionError::CellNotFound(id))
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.index())
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id.index())
    }

    pub fn try_player(&self, id: PlayerId) -> Result<&Player, ActionError> {
        self.player(id).ok_or(ActionError::PlayerNotFound(id))
    }

    pub fn try_player_mut(&mut self, id: PlayerId) -> Result<&mut Player, ActionError> {
        self.player_mut(id).ok_or(ActionError::PlayerNotFound(id))
    }

    /// In-bounds cells reachable through the six-direction set
    pub fn neighbors(&self, id: CellId) -> Vec<CellId> {
        adjacent6(id).filter(|n| self.contains(*n)).collect()
    }

    /// In-bounds cells reachable through the four-direction set
    pub fn cardinal_neighbors(&self, id: CellId) -> Vec<CellId> {
        adjacent4(id).filter(|n| self.contains(*n)).collect()
    }

    /// Cells matching `pred`, in row-major order
    pub fn cells_where(&self, pred: impl Fn(&Cell) -> bool) -> Vec<CellId> {
        self.cells.iter().filter(|c| pred(c)).map(|c| c.id).collect()
    }

    pub fn merchant_cells(&self) -> Vec<CellId> {
        self.cells_where(|c| c.merchant().is_some())
    }

    pub fn bandit_cells(&self) -> Vec<CellId> {
        self.cells_where(|c| c.ownership == Ownership::Bandit)
    }

    /// First castle currently held by `player`'s army
    pub fn castle_of(&self, player: PlayerId) -> Option<CellId> {
        self.cells
            .iter()
            .find(|c| c.building == Some(Building::Castle) && c.ownership.army_owner() == Some(player))
            .map(|c| c.id)
    }

    pub fn complete_forts_of(&self, player: PlayerId) -> Vec<CellId> {
        self.cells_where(|c| c.fort.is_complete() && c.ownership.army_owner() == Some(player))
    }

    pub fn merchant_count(&self, player: PlayerId) -> usize {
        self.cells
            .iter()
            .filter(|c| c.merchant().map(|m| m.owner) == Some(player))
            .count()
    }

    /// How `from` regards `to`; 0 when no relations are tracked
    pub fn relation(&self, from: PlayerId, to: PlayerId) -> i32 {
        self.trade_relations
            .and_then(|m| m.get(from.index()).and_then(|row| row.get(to.index())).copied())
            .unwrap_or(0)
    }

    /// Shift a relation entry, clamped to `[-100, 100]`
    pub fn adjust_relation(&mut self, from: PlayerId, to: PlayerId, delta: i32) {
        let matrix = self.trade_relations.get_or_insert([[0; 2]; 2]);
        if let Some(entry) = matrix
            .get_mut(from.index())
            .and_then(|row| row.get_mut(to.index()))
        {
            *entry = (*entry + delta).clamp(-RELATION_LIMIT, RELATION_LIMIT);
        }
    }

    /// Put an occupant on a cell, replacing whatever stood there.
    /// Ids off the board are ignored.
    pub fn set_occupant(&mut self, id: CellId, ownership: Ownership, units: u32) {
        if let Some(cell) = self.cell_mut(id) {
            cell.vacate();
            cell.occupy(ownership, units);
        }
    }

    /// Remove the pending assault of `bandit` on `target`. Returns false when there is none.
    pub fn take_assault(&mut self, bandit: CellId, target: CellId) -> bool {
        let wanted = Assault { bandit, target };
        match self.pending_assaults.iter().position(|a| *a == wanted) {
            Some(i) => {
                self.pending_assaults.remove(i);
                true
            }
            None => false,
        }
    }

    /// Check structural invariants, returning the first violation found
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.cells.len() != (self.rows * self.cols) as usize {
            return Err(format!(
                "expected {} cells, found {}",
                self.rows * self.cols,
                self.cells.len()
            ));
        }
        if self.turn < 1 {
            return Err("turn counter below 1".into());
        }
        for (i, cell) in self.cells.iter().enumerate() {
            let expected = CellId::new(i as i32 / self.cols, i as i32 % self.cols);
            if cell.id != expected {
                return Err(format!("cell {} stored at slot of {}", cell.id, expected));
            }
            if cell.is_empty() != (cell.unit_count == 0) {
                return Err(format!(
                    "cell {} has {} units under {:?}",
                    cell.id, cell.unit_count, cell.ownership
                ));
            }
            if !cell.fort.is_none() && cell.building != Some(Building::Fort) {
                return Err(format!("cell {} has fort progress without a fort", cell.id));
            }
        }
        for player in &self.players {
            let rep = player.reputation;
            if !(0.0..=100.0).contains(&rep.fear) || !(0.0..=100.0).contains(&rep.justice) {
                return Err(format!("{} reputation out of range: {:?}", player.id, rep));
            }
            if !(0.0..=1.0).contains(&player.tax_rate) {
                return Err(format!("{} tax rate {} out of range", player.id, player.tax_rate));
            }
        }
        if let Some(matrix) = self.trade_relations {
            if matrix.iter().flatten().any(|v| v.abs() > RELATION_LIMIT) {
                return Err("trade relation outside [-100, 100]".into());
            }
        }
        Ok(())
    }
}

/// Empty board with two 1000-gold nations at 50/50 reputation
#[cfg(test)]
pub(crate) fn blank_world(rows: i32, cols: i32) -> WorldModel {
    WorldModel::new(
        rows,
        cols,
        [
            Player::new(PlayerId(0), "North", 1000, 0.15),
            Player::new(PlayerId(1), "South", 1000, 0.20),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> WorldModel {
        blank_world(5, 6)
    }

    #[test]
    fn test_cells_row_major() {
        let world = blank();
        assert_eq!(world.cells.len(), 30);
        assert_eq!(world.cell(CellId::new(2, 3)).map(|c| c.id), Some(CellId::new(2, 3)));
        assert!(world.cell(CellId::new(5, 0)).is_none());
        assert!(world.cell(CellId::new(0, -1)).is_none());
        assert!(world.check_invariants().is_ok());
    }

    #[test]
    fn test_try_cell_reports_missing_id() {
        let world = blank();
        let err = world.try_cell(CellId::new(9, 9)).unwrap_err();
        assert_eq!(err, ActionError::CellNotFound(CellId::new(9, 9)));
    }

    #[test]
    fn test_corner_neighbors_filtered() {
        let world = blank();
        // Even row corner: only right and down-right are on the grid
        let n = world.neighbors(CellId::new(0, 0));
        assert_eq!(n, vec![CellId::new(0, 1), CellId::new(1, 0)]);
    }

    #[test]
    fn test_invariant_catches_units_on_empty_cell() {
        let mut world = blank();
        if let Some(cell) = world.cell_mut(CellId::new(1, 1)) {
            cell.unit_count = 3;
        }
        assert!(world.check_invariants().is_err());
    }

    #[test]
    fn test_set_occupant_replaces() {
        let mut world = blank();
        let id = CellId::new(2, 2);
        world.set_occupant(id, Ownership::Bandit, 2);
        world.set_occupant(id, Ownership::army(PlayerId(1)), 4);
        let cell = world.cell(id).unwrap();
        assert_eq!(cell.ownership.army_owner(), Some(PlayerId(1)));
        assert_eq!(cell.unit_count, 4);
        assert_eq!(world.bandit_cells(), Vec::<CellId>::new());
    }

    #[test]
    fn test_relation_adjust_clamps() {
        let mut world = blank();
        assert_eq!(world.relation(PlayerId(0), PlayerId(1)), 0);
        world.adjust_relation(PlayerId(0), PlayerId(1), 250);
        assert_eq!(world.relation(PlayerId(0), PlayerId(1)), 100);
        assert_eq!(world.relation(PlayerId(1), PlayerId(0)), 0);
    }
}
