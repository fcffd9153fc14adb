//! Hex Marches - turn-based hex-grid strategy rules
//!
//! Two nations, a neutral mercenary band, roaming bandits and trade
//! caravans on an offset hex grid. Every rule is a pure function from one
//! `WorldModel` snapshot to the next; randomness is injected.

pub mod campaign;
pub mod core;
pub mod world;

pub use crate::campaign::{apply_action, end_turn, Action, ActionReport, Outcome, TurnEvent};
pub use crate::core::{RandomSource, RulesConfig, SimRng};
pub use crate::world::WorldModel;
