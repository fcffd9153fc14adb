//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset grid position of a cell. Fixed for the life of the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    pub row: i32,
    pub col: i32,
}

impl CellId {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn offset(&self, dr: i32, dc: i32) -> Self {
        Self::new(self.row + dr, self.col + dc)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

/// One of the two nations. Player 0 moves first each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl PlayerId {
    pub const FIRST: PlayerId = PlayerId(0);
    pub const SECOND: PlayerId = PlayerId(1);

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn opponent(&self) -> PlayerId {
        if self.0 == 0 {
            Self::SECOND
        } else {
            Self::FIRST
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.0)
    }
}

/// Troop kind. Only affects how far a stack may move in one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitType {
    #[default]
    Infantry,
    Cavalry,
    Scout,
}

impl UnitType {
    /// Neighbour steps allowed per move action
    pub fn move_range(&self) -> u32 {
        match self {
            Self::Infantry => 1,
            Self::Cavalry => 3,
            Self::Scout => 2,
        }
    }
}

/// Turn counter, starts at 1
pub type Turn = u32;
