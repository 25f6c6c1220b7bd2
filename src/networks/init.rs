//! Parameter Initialization
//!
//! Xavier/Glorot uniform initialization: element variance approximates
//! `gain^2 * 2 / (fan_in + fan_out)`. Deterministic given an explicit seed;
//! unseeded callers get entropy, isolated here so tests can always inject.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::networks::dense::Matrix;

/// Build a seeded generator, falling back to entropy when no seed is given.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Initialize one weight matrix of shape [fan_out][fan_in].
///
/// Samples uniformly from [-b, b] with `b = gain * sqrt(6 / (fan_in +
/// fan_out))`, which gives the Xavier variance.
pub fn xavier_matrix(fan_in: usize, fan_out: usize, gain: f64, rng: &mut StdRng) -> Matrix {
    let bound = gain * (6.0 / (fan_in + fan_out) as f64).sqrt();
    (0..fan_out)
        .map(|_| (0..fan_in).map(|_| rng.gen_range(-bound..bound)).collect())
        .collect()
}
