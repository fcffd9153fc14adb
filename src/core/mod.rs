pub mod config;
pub mod error;
pub mod rng;
pub mod types;

pub use config::{rules, set_rules, RulesConfig};
pub use error::{ActionError, ConfigError, EngineError};
pub use rng::{RandomSource, ScriptedRng, SimRng};
pub use types::{CellId, PlayerId, Turn, UnitType};
