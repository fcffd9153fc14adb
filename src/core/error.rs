use thiserror::Error;

use crate::core::types::{CellId, PlayerId};

/// Why an action was refused.
///
/// Refusal never changes state: every operation borrows the current
/// snapshot, so on `Err` the caller still holds the world it started with.
/// The `Display` text is the reason shown to the player or fed back to the AI.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("no cell at {0}")]
    CellNotFound(CellId),

    #[error("no such player: {0}")]
    PlayerNotFound(PlayerId),

    #[error("it is not {actor}'s turn")]
    NotYourTurn { actor: PlayerId },

    #[error("cell {0} is not controlled by the acting player")]
    NotControlled(CellId),

    #[error("cell {to} is out of reach from {from}")]
    OutOfReach { from: CellId, to: CellId },

    #[error("invalid target at {cell}: {reason}")]
    InvalidTarget { cell: CellId, reason: &'static str },

    #[error("not allowed at {cell}: {reason}")]
    Ineligible { cell: CellId, reason: &'static str },

    #[error("not enough gold: need {need}, have {have}")]
    InsufficientGold { need: u32, have: u32 },

    #[error("not enough units: need {need}, have {have}")]
    InsufficientUnits { need: u32, have: u32 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid rules: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Action refused: {0}")]
    Action(#[from] ActionError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
