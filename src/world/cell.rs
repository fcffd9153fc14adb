//! Cells and what can occupy them

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::core::types::{CellId, PlayerId, UnitType};

/// Permanent structure on a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Building {
    Castle,
    Fort,
}

/// Fortification progress
///
/// `garrison_units` is the stack size frozen when construction began. The
/// garrison keeps occupying the cell; the frozen figure is what cancellation
/// hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FortState {
    #[default]
    None,
    UnderConstruction {
        stage: u8,
        turns_in_stage: u32,
        garrison_units: u32,
    },
    Complete {
        garrison_units: u32,
    },
}

impl FortState {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    pub fn garrison_units(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::UnderConstruction { garrison_units, .. } | Self::Complete { garrison_units } => {
                *garrison_units
            }
        }
    }
}

/// Caravan lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MerchantPhase {
    #[default]
    Idle,
    Outbound,
    AtTarget,
    Returning,
}

/// State carried by a caravan cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantInfo {
    pub owner: PlayerId,
    pub gold: u32,
    /// Remaining path, consumed from the front
    pub route: VecDeque<CellId>,
    pub phase: MerchantPhase,
    pub destination: Option<CellId>,
    pub origin: Option<CellId>,
    pub round_trips: u32,
    pub dwell_turns_left: u32,
    /// Set once a detour has been tried for the current blockage
    pub detour_attempted: bool,
}

impl MerchantInfo {
    pub fn new(owner: PlayerId, gold: u32) -> Self {
        Self {
            owner,
            gold,
            route: VecDeque::new(),
            phase: MerchantPhase::Idle,
            destination: None,
            origin: None,
            round_trips: 0,
            dwell_turns_left: 0,
            detour_attempted: false,
        }
    }

    /// Drop the trip plan after a delivery. The caravan stays idle where it is.
    pub fn clear_trip(&mut self) {
        self.gold = 0;
        self.route.clear();
        self.phase = MerchantPhase::Idle;
        self.destination = None;
        self.dwell_turns_left = 0;
        self.detour_attempted = false;
    }
}

/// Who holds a cell. Exactly one occupant kind at a time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Ownership {
    #[default]
    Empty,
    Army {
        player: PlayerId,
        /// Rounds left on a temporary mercenary hire
        lease_turns: Option<u32>,
    },
    Mercenary,
    Merchant(MerchantInfo),
    Bandit,
}

impl Ownership {
    pub fn army(player: PlayerId) -> Self {
        Self::Army {
            player,
            lease_turns: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Player whose army holds the cell
    pub fn army_owner(&self) -> Option<PlayerId> {
        match self {
            Self::Army { player, .. } => Some(*player),
            _ => None,
        }
    }

    /// Player an army or caravan answers to
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Self::Army { player, .. } => Some(*player),
            Self::Merchant(info) => Some(info.owner),
            _ => None,
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, Self::Mercenary | Self::Bandit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftOutcome {
    Dead,
    Alive,
}

/// Reputation drift scratch. Stored for the presentation layer, never read by the rules.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriftState {
    /// Accumulated drift in percentage points
    pub delta_pp: f64,
    pub last: Option<DriftOutcome>,
}

/// One hex tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub ownership: Ownership,
    pub unit_count: u32,
    pub unit_type: Option<UnitType>,
    pub building: Option<Building>,
    pub fort: FortState,
    pub has_road: bool,
    pub retreat_streak: u32,
    pub drift: DriftState,
}

impl Cell {
    pub fn new(id: CellId) -> Self {
        Self {
            id,
            ownership: Ownership::Empty,
            unit_count: 0,
            unit_type: None,
            building: None,
            fort: FortState::None,
            has_road: false,
            retreat_streak: 0,
            drift: DriftState::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ownership.is_empty()
    }

    /// Put an occupant on the cell. Zero units leaves it empty.
    pub fn occupy(&mut self, ownership: Ownership, units: u32) {
        if units == 0 {
            self.vacate();
            return;
        }
        if self.unit_type.is_none() {
            self.unit_type = Some(UnitType::Infantry);
        }
        self.ownership = ownership;
        self.unit_count = units;
    }

    /// Remove whatever occupies the cell. Buildings and roads stay.
    pub fn vacate(&mut self) {
        self.ownership = Ownership::Empty;
        self.unit_count = 0;
        self.unit_type = None;
    }

    pub fn merchant(&self) -> Option<&MerchantInfo> {
        match &self.ownership {
            Ownership::Merchant(info) => Some(info),
            _ => None,
        }
    }

    pub fn merchant_mut(&mut self) -> Option<&mut MerchantInfo> {
        match &mut self.ownership {
            Ownership::Merchant(info) => Some(info),
            _ => None,
        }
    }

    /// Castle or completed fort, i.e. somewhere a caravan can trade
    pub fn is_trade_post(&self) -> bool {
        match self.building {
            Some(Building::Castle) => true,
            Some(Building::Fort) => self.fort.is_complete(),
            None => false,
        }
    }
}
