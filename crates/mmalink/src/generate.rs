//! Random operand generation.
//!
//! Elements are drawn uniformly from `[0, 100)`. Callers pass the RNG, so a
//! seeded [`StdRng`] reproduces the same operands.

use mmalink_frame::{Matrix, Result};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const ELEMENT_MIN: f32 = 0.0;
pub const ELEMENT_MAX: f32 = 100.0;

/// RNG seeded from `seed`, or from OS entropy when `None`.
pub fn seedable_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(value) => StdRng::seed_from_u64(value),
        None => StdRng::from_entropy(),
    }
}

/// A `rows × cols` matrix of uniform values in `[0, 100)`.
pub fn random_matrix<R: Rng + ?Sized>(rng: &mut R, rows: usize, cols: usize) -> Result<Matrix> {
    let dist = Uniform::new(ELEMENT_MIN, ELEMENT_MAX);
    Matrix::from_fn(rows, cols, |_, _| dist.sample(rng))
}

/// Operands for an `(rows × inner) · (inner × cols)` product.
pub fn random_operands<R: Rng + ?Sized>(
    rng: &mut R,
    rows: usize,
    inner: usize,
    cols: usize,
) -> Result<(Matrix, Matrix)> {
    let a = random_matrix(rng, rows, inner)?;
    let b = random_matrix(rng, inner, cols)?;
    Ok((a, b))
}
