//! Campaign rules: everything that turns one world snapshot into the next

pub mod actions;
pub mod bandit;
pub mod battle;
pub mod fort;
pub mod map;
pub mod mercenary;
pub mod merchant;
pub mod reputation;
pub mod route;
pub mod trade;
pub mod turn;

pub use actions::{apply_action, Action, ActionReport, Outcome};
pub use battle::{engage, CombatReport, Engagement};
pub use map::{cardinal4, hex_distance, neighbors6};
pub use mercenary::MercenaryChoice;
pub use route::{plan_detour, plan_route};
pub use trade::{TradeDecision, TradeRequest};
pub use turn::{end_turn, TurnEvent, TurnReport};

/// Slack absorbing binary rounding before a floor, so 10 x 0.4 counts as 4
const FLOOR_EPSILON: f64 = 1e-9;

/// Floor a non-negative formula result to a whole count
pub(crate) fn floor_count(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    (value + FLOOR_EPSILON).floor() as u32
}
