//! Simplex sampler — uniform candidate compositions over the simplex.
//!
//! Draws each coordinate as an Exponential(1) variate via the inverse
//! CDF (`x = -ln(u)`, `u` uniform on the open interval) and normalizes
//! by the sum. Normalized i.i.d. Exponential(1) draws are distributed
//! as a symmetric Dirichlet(1,...,1), i.e. uniform over the simplex, so
//! no dedicated Dirichlet sampler is needed and the per-coordinate draw
//! maps onto any "suggest a float in [0,1]" primitive.

use rand::distributions::Open01;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Draws candidate compositions. Owns its RNG; one instance per run.
pub struct SimplexSampler {
    rng: StdRng,
}

impl SimplexSampler {
    /// Sampler seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sampler for reproducible runs and tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw a composition of length `n`: every entry ≥ 0, entries sum
    /// to 1 (within floating tolerance). `n = 0` yields an empty vector;
    /// the search loop rejects zero components before sampling.
    pub fn sample(&mut self, n: usize) -> Vec<f64> {
        let draws: Vec<f64> = (0..n)
            .map(|_| {
                // Open01 excludes both endpoints, so ln never sees 0,
                // but u can still round close enough to 1 that -ln(u)
                // underflows to 0.
                let u: f64 = self.rng.sample(Open01);
                -u.ln()
            })
            .collect();
        Self::normalize(draws)
    }

    /// Normalize raw non-negative draws onto the simplex.
    ///
    /// An all-zero draw (every uniform rounded to 1) would divide by
    /// zero; it falls back to the uniform split instead of producing
    /// NaN.
    pub(crate) fn normalize(mut draws: Vec<f64>) -> Vec<f64> {
        let n = draws.len();
        if n == 0 {
            return draws;
        }
        let total: f64 = draws.iter().sum();
        if total <= 0.0 {
            return vec![1.0 / n as f64; n];
        }
        for d in &mut draws {
            *d /= total;
        }
        draws
    }
}

impl Default for SimplexSampler {
    fn default() -> Self {
        Self::new()
    }
}
