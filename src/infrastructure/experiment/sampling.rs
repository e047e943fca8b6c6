//! Sampling gate deciding whether candidates run
//!
//! `ignore` always wins over `force`. Forced runs are counted as runs but
//! never as hits, so they do not distort the hit rate.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::SamplingStrategy;

#[derive(Debug)]
struct GateState {
    runs: u64,
    hits: u64,
    rng: StdRng,
}

/// Per-experiment sampling gate
#[derive(Debug)]
pub struct SamplingGate {
    percentage: u8,
    strategy: SamplingStrategy,
    state: Mutex<GateState>,
}

impl SamplingGate {
    /// Create a gate; a `seed` makes sampling and ordering deterministic
    pub fn new(percentage: u8, strategy: SamplingStrategy, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self::with_rng(percentage, strategy, rng)
    }

    pub fn with_rng(percentage: u8, strategy: SamplingStrategy, rng: StdRng) -> Self {
        Self {
            percentage: percentage.min(100),
            strategy,
            state: Mutex::new(GateState {
                runs: 0,
                hits: 0,
                rng,
            }),
        }
    }

    /// Decide whether candidates execute for this run
    pub fn should_run(&self, force: bool, ignore: bool) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.runs += 1;

        if ignore {
            return false;
        }

        if force {
            return true;
        }

        let sampled = match self.strategy {
            SamplingStrategy::Random => state.rng.gen_range(0..100) < self.percentage,
            SamplingStrategy::HitRate => {
                state.hits * 100 < u64::from(self.percentage) * state.runs
            }
        };

        if sampled {
            state.hits += 1;
        }

        sampled
    }

    /// Shuffle dispatch order with the gate's RNG
    pub fn shuffle<B>(&self, items: &mut [B]) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        items.shuffle(&mut state.rng);
    }

    pub fn runs(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .runs
    }

    pub fn hits(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .hits
    }

    /// Ratio of sampled runs to all runs
    pub fn hit_rate(&self) -> f64 {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.runs == 0 {
            0.0
        } else {
            state.hits as f64 / state.runs as f64
        }
    }

    pub fn percentage(&self) -> u8 {
        self.percentage
    }
}
