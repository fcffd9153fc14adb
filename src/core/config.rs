//! Rules configuration with documented constants
//!
//! Gameplay tunables live here so a scenario can override them from a TOML
//! file. Formula coefficients that define how a rule works (survival rates,
//! reputation curves) stay as `pub const` next to the code that uses them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::core::error::ConfigError;

/// Tunables for one game
///
/// Any field missing from a TOML override keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    // === BOARD ===
    /// Grid height in rows
    pub rows: i32,

    /// Grid width in columns
    ///
    /// Both dimensions must be at least 5 so the seeded castles, armies and
    /// the mercenary band land on distinct cells.
    pub cols: i32,

    // === NATIONS ===
    /// Treasury each player starts with
    pub starting_gold: u32,

    /// Starting fear and justice for both players
    pub starting_fear: f64,
    pub starting_justice: f64,

    /// Tax levied on deliveries into each player's territory, by player index
    pub tax_rates: [f64; 2],

    /// Units in each seeded castle and field army
    pub starting_army_units: u32,

    /// Size of the neutral band placed at the board centre
    pub starting_mercenary_units: u32,

    // === FORTIFICATION ===
    /// Gold deducted when construction starts
    pub fort_cost: u32,

    /// Minimum garrison needed to start building
    pub fort_min_units: u32,

    /// Turns spent in each of the three construction stages
    ///
    /// At 2, a fort completes after 6 sweeps.
    pub fort_turns_per_stage: u32,

    // === NEUTRALS ===
    /// Fear assumed for mercenary and bandit sides in combat
    pub neutral_fear: f64,

    /// Lease length of a temporary mercenary hire, in rounds
    pub mercenary_lease_turns: u32,

    /// List price per mercenary unit for a permanent hire
    pub mercenary_unit_price: u32,

    /// Gold paid per unit when a mercenary band is destroyed in battle
    pub mercenary_bounty_per_unit: u32,

    /// Chance per round that a bandit gang appears near a merchant
    pub bandit_spawn_chance: f64,

    /// Largest gang a spawn can produce
    pub bandit_max_units: u32,

    /// Manhattan radius around castles, forts and armies where bandits never spawn
    pub bandit_exclusion_radius: i32,

    // === TRADE ===
    /// Units escorting a freshly spawned caravan
    pub merchant_units: u32,

    /// Cargo loaded on dispatch when the caravan is empty
    pub merchant_base_cargo: u32,

    /// Upper bound of the random cargo a spawned caravan carries
    pub merchant_max_spawn_cargo: u32,

    /// Turns a caravan trades at its destination before heading home
    pub merchant_dwell_turns: u32,

    /// Completed round trips after which outbound traffic paves cells
    ///
    /// At 2, the third outbound leg lays the road.
    pub paving_round_trips: u32,

    /// Cells a returning caravan covers per turn on a road
    pub road_speed: usize,

    /// Safety cap on greedy route construction
    pub route_iteration_cap: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            rows: 7,
            cols: 7,

            starting_gold: 10_000,
            starting_fear: 50.0,
            starting_justice: 50.0,
            tax_rates: [0.15, 0.20],
            starting_army_units: 5,
            starting_mercenary_units: 3,

            fort_cost: 500,
            fort_min_units: 3,
            fort_turns_per_stage: 2,

            neutral_fear: 50.0,
            mercenary_lease_turns: 5,
            mercenary_unit_price: 100,
            mercenary_bounty_per_unit: 50,
            bandit_spawn_chance: 0.10,
            bandit_max_units: 3,
            bandit_exclusion_radius: 2,

            merchant_units: 2,
            merchant_base_cargo: 50,
            merchant_max_spawn_cargo: 100,
            merchant_dwell_turns: 2,
            paving_round_trips: 2,
            road_speed: 3,
            route_iteration_cap: 1000,
        }
    }
}

impl RulesConfig {
    /// Validate that values are internally consistent
    pub fn validate(&self) -> Result<(), String> {
        if self.rows < 5 || self.cols < 5 {
            return Err(format!(
                "board must be at least 5x5, got {}x{}",
                self.rows, self.cols
            ));
        }

        for (i, rate) in self.tax_rates.iter().enumerate() {
            if !(0.0..=1.0).contains(rate) {
                return Err(format!("tax rate for player {} ({}) outside [0, 1]", i, rate));
            }
        }

        for (name, value) in [
            ("starting_fear", self.starting_fear),
            ("starting_justice", self.starting_justice),
            ("neutral_fear", self.neutral_fear),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(format!("{} ({}) outside [0, 100]", name, value));
            }
        }

        if !(0.0..=1.0).contains(&self.bandit_spawn_chance) {
            return Err(format!(
                "bandit_spawn_chance ({}) outside [0, 1]",
                self.bandit_spawn_chance
            ));
        }

        if self.bandit_max_units == 0 || self.merchant_units == 0 {
            return Err("bandit_max_units and merchant_units must be positive".into());
        }

        if self.merchant_max_spawn_cargo < self.merchant_base_cargo {
            return Err(format!(
                "merchant_max_spawn_cargo ({}) below merchant_base_cargo ({})",
                self.merchant_max_spawn_cargo, self.merchant_base_cargo
            ));
        }

        if self.fort_turns_per_stage == 0 || self.road_speed == 0 || self.route_iteration_cap == 0 {
            return Err("fort_turns_per_stage, road_speed and route_iteration_cap must be positive".into());
        }

        Ok(())
    }

    /// Parse a (possibly partial) TOML override and validate it
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let rules: RulesConfig = toml::from_str(content)?;
        rules.validate().map_err(ConfigError::Invalid)?;
        Ok(rules)
    }

    /// Load rules from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

static RULES: OnceLock<RulesConfig> = OnceLock::new();

/// Get the global rules (initializes with defaults if not set)
pub fn rules() -> &'static RulesConfig {
    RULES.get_or_init(RulesConfig::default)
}

/// Set the global rules (can only be called once)
///
/// Returns Err if rules were already set or read.
pub fn set_rules(rules: RulesConfig) -> Result<(), RulesConfig> {
    RULES.set(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_valid() {
        assert!(RulesConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let rules = RulesConfig::from_toml_str("rows = 9\nfort_cost = 750\n").unwrap();
        assert_eq!(rules.rows, 9);
        assert_eq!(rules.fort_cost, 750);
        assert_eq!(rules.cols, 7);
        assert_eq!(rules.merchant_dwell_turns, 2);
    }

    #[test]
    fn test_small_board_rejected() {
        let err = RulesConfig::from_toml_str("rows = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_tax_rate_rejected() {
        let rules = RulesConfig {
            tax_rates: [0.15, 1.5],
            ..Default::default()
        };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = RulesConfig::from_toml_str("rows = \"seven\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
