//! Deterministic random number generation for synthetic histories.
//!
//! RULE: nothing in the crate calls a platform RNG. Synthetic data is
//! drawn from a SeededRng derived from (seed XOR stream index), so each
//! stream is reproducible in isolation and adding a stream never
//! perturbs the others.
//!
//! The scoring pipeline itself uses no randomness at all.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct SeededRng {
    inner: Pcg64Mcg,
}

impl SeededRng {
    pub fn new(seed: u64, stream: u64) -> Self {
        let derived_seed = seed ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n). Returns 0 when n is 0.
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform float in [low, high).
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Multiplies `value` by a factor in [1 - spread, 1 + spread), rounded to cents.
    pub fn jitter(&mut self, value: f64, spread: f64) -> f64 {
        let factor = self.uniform(1.0 - spread, 1.0 + spread);
        (value * factor * 100.0).round() / 100.0
    }
}

/// Stable stream assignments. Append only: reordering changes every seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum Stream {
    Income = 0,
    Essential = 1,
    Discretionary = 2,
    Obligations = 3,
    Incidents = 4,
}

impl Stream {
    pub fn rng(self, seed: u64) -> SeededRng {
        SeededRng::new(seed, self as u64)
    }
}
