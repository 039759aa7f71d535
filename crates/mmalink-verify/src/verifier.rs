use std::fmt;

use mmalink_frame::Matrix;
use tracing::debug;

use crate::error::{Result, VerifyError};

/// How close two elements must be to count as equal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Tolerance {
    /// Exactly equal values. Bit-identical values (including NaN payloads)
    /// are also equal, so every matrix equals itself.
    #[default]
    Exact,
    /// `|a - b| <= eps`.
    Absolute(f32),
    /// `|a - b| <= eps * max(|a|, |b|)`.
    Relative(f32),
}

impl Tolerance {
    /// Whether `a` and `b` are equal under this tolerance. Symmetric.
    pub fn accepts(self, a: f32, b: f32) -> bool {
        if a == b || a.to_bits() == b.to_bits() {
            return true;
        }
        // Overflowed or NaN elements only match themselves.
        if !a.is_finite() || !b.is_finite() {
            return false;
        }
        match self {
            Tolerance::Exact => false,
            Tolerance::Absolute(eps) => (a - b).abs() <= eps,
            Tolerance::Relative(eps) => (a - b).abs() <= eps * a.abs().max(b.abs()),
        }
    }

    fn validate(self) -> Result<()> {
        match self {
            Tolerance::Exact => Ok(()),
            Tolerance::Absolute(eps) | Tolerance::Relative(eps) => {
                if eps.is_nan() || eps < 0.0 {
                    Err(VerifyError::InvalidTolerance(eps))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// First element where two matrices disagree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mismatch {
    pub row: usize,
    pub col: usize,
    pub expected: f32,
    pub actual: f32,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "element ({}, {}): expected {}, got {}",
            self.row, self.col, self.expected, self.actual
        )
    }
}

/// Exact element-wise equality. Shapes must match.
pub fn compare(a: &Matrix, b: &Matrix) -> Result<bool> {
    compare_with(a, b, Tolerance::Exact)
}

/// Element-wise equality under `tolerance`. Shapes must match.
pub fn compare_with(a: &Matrix, b: &Matrix, tolerance: Tolerance) -> Result<bool> {
    Ok(first_mismatch(a, b, tolerance)?.is_none())
}

/// Locate the first (row-major) element where `actual` departs from
/// `expected` under `tolerance`.
pub fn first_mismatch(
    expected: &Matrix,
    actual: &Matrix,
    tolerance: Tolerance,
) -> Result<Option<Mismatch>> {
    tolerance.validate()?;
    if expected.shape() != actual.shape() {
        return Err(VerifyError::DimensionMismatch {
            operation: "compare",
            left: expected.shape(),
            right: actual.shape(),
        });
    }

    let cols = expected.cols();
    let found = expected
        .as_slice()
        .iter()
        .zip(actual.as_slice())
        .position(|(&e, &a)| !tolerance.accepts(e, a))
        .map(|index| Mismatch {
            row: index / cols,
            col: index % cols,
            expected: expected.as_slice()[index],
            actual: actual.as_slice()[index],
        });

    if let Some(mismatch) = &found {
        debug!(%mismatch, ?tolerance, "matrices differ");
    }
    Ok(found)
}
