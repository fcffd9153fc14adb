use serde::{Deserialize, Serialize};

use crate::core::types::PlayerId;

/// Upper bound of both reputation axes
pub const REPUTATION_MAX: f64 = 100.0;

/// Fear and justice, each kept in `[0, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reputation {
    pub fear: f64,
    pub justice: f64,
}

impl Reputation {
    pub fn new(fear: f64, justice: f64) -> Self {
        Self {
            fear: clamp_axis(fear),
            justice: clamp_axis(justice),
        }
    }
}

impl Default for Reputation {
    fn default() -> Self {
        Self::new(50.0, 50.0)
    }
}

/// Clamp one reputation axis into range. NaN collapses to 0.
pub fn clamp_axis(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, REPUTATION_MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub reputation: Reputation,
    pub gold: u32,
    /// Share of incoming caravan profit kept as tax, in `[0, 1]`
    pub tax_rate: f64,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, gold: u32, tax_rate: f64) -> Self {
        Self {
            id,
            name: name.into(),
            reputation: Reputation::default(),
            gold,
            tax_rate: tax_rate.clamp(0.0, 1.0),
        }
    }

    pub fn with_reputation(mut self, reputation: Reputation) -> Self {
        self.reputation = reputation;
        self
    }

    pub fn can_afford(&self, cost: u32) -> bool {
        self.gold >= cost
    }
}
