//! Fear and justice
//!
//! Both axes feed quadratic response curves: a nation at 50 fear has a
//! quarter of the fear power of one at 100.

use crate::world::{clamp_axis, Reputation};

/// Justice lost per point of fear gained in [`adjust_reputation`]
pub const FEAR_JUSTICE_COUPLING: f64 = 0.7;

/// Kills above this count earn the winner the larger justice bonus
pub const DECISIVE_KILLS: u32 = 5;
/// Own losses above this count earn the winner the larger fear bonus
pub const COSTLY_CASUALTIES: u32 = 3;

pub const LOSER_JUSTICE_DELTA: f64 = -3.0;
pub const LOSER_FEAR_DELTA: f64 = -1.0;

/// `(fear / 100)^2`
pub fn fear_power(fear: f64) -> f64 {
    (fear / 100.0).powi(2)
}

/// `(justice / 100)^2`
pub fn justice_power(justice: f64) -> f64 {
    (justice / 100.0).powi(2)
}

/// Apply independent deltas to both axes, clamping each
pub fn apply_delta(rep: Reputation, fear_delta: f64, justice_delta: f64) -> Reputation {
    Reputation {
        fear: clamp_axis(rep.fear + fear_delta),
        justice: clamp_axis(rep.justice + justice_delta),
    }
}

/// Shift fear and let justice move the other way by 0.7x the fear actually gained
///
/// The coupling uses the clamped fear change, so a nation already at 100
/// fear loses no justice.
pub fn adjust_reputation(rep: Reputation, fear_delta: f64) -> Reputation {
    let fear = clamp_axis(rep.fear + fear_delta);
    let fear_change = fear - rep.fear;
    Reputation {
        fear,
        justice: clamp_axis(rep.justice - fear_change * FEAR_JUSTICE_COUPLING),
    }
}

/// Reputation shift for a battle's winner
///
/// `kills` counts enemy units destroyed, `casualties` own units lost.
pub fn winner_deltas(kills: u32, casualties: u32) -> (f64, f64) {
    let justice = if kills > DECISIVE_KILLS { 2.0 } else { 1.0 };
    let fear = if casualties > COSTLY_CASUALTIES { 3.0 } else { 1.0 };
    (fear, justice)
}

/// Reputation after a battle, for either side
pub fn after_battle(rep: Reputation, won: bool, kills: u32, casualties: u32) -> Reputation {
    if won {
        let (fear, justice) = winner_deltas(kills, casualties);
        apply_delta(rep, fear, justice)
    } else {
        apply_delta(rep, LOSER_FEAR_DELTA, LOSER_JUSTICE_DELTA)
    }
}
