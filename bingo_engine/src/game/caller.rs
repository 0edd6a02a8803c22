//! Random number caller for a single bet tier.

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::entities::BingoNumber;

/// Draws each number of the 75-ball universe at most once per round.
///
/// An optional script is drawn first on every round before falling back to
/// uniform random draws; this is how recorded rounds are replayed.
#[derive(Debug)]
pub struct NumberCaller {
    rng: StdRng,
    remaining: Vec<BingoNumber>,
    script: Vec<BingoNumber>,
    script_pos: usize,
}

impl Default for NumberCaller {
    fn default() -> Self {
        Self::new()
    }
}

impl NumberCaller {
    /// Caller seeded from the operating system.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Reproducible caller.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Draw `script` in order before drawing at random.
    #[must_use]
    pub fn with_script(mut self, script: Vec<BingoNumber>) -> Self {
        self.script = script;
        self.script_pos = 0;
        self
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            remaining: BingoNumber::all().collect(),
            script: Vec::new(),
            script_pos: 0,
        }
    }

    /// Refill the pool for a new round.
    pub fn reset(&mut self) {
        self.remaining = BingoNumber::all().collect();
        self.script_pos = 0;
    }

    /// Draw the next number, or `None` once all 75 have been called.
    pub fn draw(&mut self) -> Option<BingoNumber> {
        while let Some(&scripted) = self.script.get(self.script_pos) {
            self.script_pos += 1;
            if let Some(idx) = self.remaining.iter().position(|&n| n == scripted) {
                return Some(self.remaining.swap_remove(idx));
            }
        }

        if self.remaining.is_empty() {
            return None;
        }
        let idx = self.rng.random_range(0..self.remaining.len());
        Some(self.remaining.swap_remove(idx))
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}
