//! Injectable randomness
//!
//! Every probabilistic rule draws from a [`RandomSource`] passed in by the
//! caller. Games use [`SimRng`]; tests script exact draws with [`ScriptedRng`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Uniform generator over `[0, 1)`.
pub trait RandomSource {
    fn next_f64(&mut self) -> f64;

    /// Bernoulli draw: true when the next value falls under `p`
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform index into a slice of `len` items. `len` must be non-zero.
    fn pick_index(&mut self, len: usize) -> usize {
        let idx = (self.next_f64() * len as f64) as usize;
        idx.min(len.saturating_sub(1))
    }

    /// Uniform integer in `lo..=hi`
    fn range_inclusive(&mut self, lo: u32, hi: u32) -> u32 {
        let span = hi.saturating_sub(lo) + 1;
        lo + ((self.next_f64() * span as f64) as u32).min(span - 1)
    }
}

/// Fisher-Yates shuffle driven by a [`RandomSource`]
pub fn shuffle<T>(items: &mut [T], rng: &mut impl RandomSource) {
    for i in (1..items.len()).rev() {
        let j = rng.pick_index(i + 1);
        items.swap(i, j);
    }
}

/// ChaCha-backed source used by real games.
#[derive(Debug, Clone)]
pub struct SimRng(ChaCha8Rng);

impl SimRng {
    pub fn from_entropy() -> Self {
        Self(ChaCha8Rng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl RandomSource for SimRng {
    fn next_f64(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Replays a fixed list of draws. Once exhausted the last value repeats;
/// an empty script always yields 0.0.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRng {
    draws: Vec<f64>,
    cursor: usize,
}

impl ScriptedRng {
    pub fn new(draws: impl Into<Vec<f64>>) -> Self {
        Self {
            draws: draws.into(),
            cursor: 0,
        }
    }

    /// Always returns `value`
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Draws consumed so far
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ScriptedRng {
    fn next_f64(&mut self) -> f64 {
        let value = match self.draws.get(self.cursor) {
            Some(v) => *v,
            None => self.draws.last().copied().unwrap_or(0.0),
        };
        self.cursor += 1;
        value
    }
}
