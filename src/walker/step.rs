//! Step sources for the walk
//!
//! Uses the xoshiro256++ PRNG. Each process derives its own seed by mixing
//! its rank into a base seed, so walkers started in the same instant still
//! draw different sequences.

use crate::comm::Rank;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of unit steps
pub trait StepSource: Send {
    /// Next step, either `-1` or `+1`
    fn next_step(&mut self) -> i64;
}

/// Fair coin-flip steps
pub struct RandomSteps {
    rng: Xoshiro256PlusPlus,
}

impl RandomSteps {
    /// Create a step source with a specific seed
    ///
    /// Useful for reproducible tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    /// Create the step source for `rank` from a run-wide base seed
    pub fn for_rank(rank: Rank, base_seed: u64) -> Self {
        Self::with_seed(rank_seed(rank, base_seed))
    }
}

impl StepSource for RandomSteps {
    #[inline]
    fn next_step(&mut self) -> i64 {
        if self.rng.gen_bool(0.5) {
            1
        } else {
            -1
        }
    }
}

/// Fold a rank into a base seed
///
/// Distinct ranks always give distinct seeds for the same base.
pub fn rank_seed(rank: Rank, base_seed: u64) -> u64 {
    base_seed ^ (u64::from(rank) + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Wall-clock base seed (nanoseconds since the epoch)
pub fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
