//! Local reference computation.
//!
//! [`classify_compatibility`] is diagnostic only and never decides whether a
//! product is attempted; [`multiply`] enforces `cols(A) == rows(B)` itself.

use std::fmt;

use mmalink_frame::Matrix;
use tracing::debug;

use crate::error::{Result, VerifyError};

/// Shape relationship between two operands, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompatibilityClass {
    /// Same rows and same cols.
    EqualShape,
    /// Same rows, B has more cols.
    WiderB,
    /// A has more rows, same cols.
    TallerA,
    /// A has fewer rows and more cols.
    ShrunkSquare,
    /// A has more rows and fewer cols.
    GrownSquare,
    /// `cols(A) == rows(B)` and none of the above.
    ChainCompatible,
    Unclassified,
}

impl CompatibilityClass {
    /// Numeric code used in device-side logs (0 for unclassified).
    pub fn code(self) -> u8 {
        match self {
            CompatibilityClass::EqualShape => 1,
            CompatibilityClass::WiderB => 2,
            CompatibilityClass::TallerA => 3,
            CompatibilityClass::ShrunkSquare => 4,
            CompatibilityClass::GrownSquare => 5,
            CompatibilityClass::ChainCompatible => 6,
            CompatibilityClass::Unclassified => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CompatibilityClass::EqualShape => "equal-shape",
            CompatibilityClass::WiderB => "wider-b",
            CompatibilityClass::TallerA => "taller-a",
            CompatibilityClass::ShrunkSquare => "shrunk-square",
            CompatibilityClass::GrownSquare => "grown-square",
            CompatibilityClass::ChainCompatible => "chain-compatible",
            CompatibilityClass::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for CompatibilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify the shape relationship of `a` and `b`. First match wins.
pub fn classify_compatibility(a: &Matrix, b: &Matrix) -> CompatibilityClass {
    let (ar, ac) = (a.rows(), a.cols());
    let (br, bc) = (b.rows(), b.cols());

    let class = if ar == br && ac == bc {
        CompatibilityClass::EqualShape
    } else if ar == br && ac < bc {
        CompatibilityClass::WiderB
    } else if ar > br && ac == bc {
        CompatibilityClass::TallerA
    } else if ar < br && ac > bc {
        CompatibilityClass::ShrunkSquare
    } else if ar > br && ac < bc {
        CompatibilityClass::GrownSquare
    } else if ac == br {
        CompatibilityClass::ChainCompatible
    } else {
        CompatibilityClass::Unclassified
    };

    debug!(a = %a.shape(), b = %b.shape(), %class, "classified operand shapes");
    class
}

/// Whether `a · b` is defined.
pub fn is_multipliable(a: &Matrix, b: &Matrix) -> bool {
    a.shape().chains_into(&b.shape())
}

/// Standard matrix product `a · b`.
///
/// Each element is accumulated in `f32`, left to right over the inner
/// dimension, so results are reproducible bit for bit.
pub fn multiply(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    if !is_multipliable(a, b) {
        return Err(VerifyError::DimensionMismatch {
            operation: "multiply",
            left: a.shape(),
            right: b.shape(),
        });
    }

    let product = Matrix::from_fn(a.rows(), b.cols(), |i, j| {
        let mut acc = 0.0f32;
        for (k, &lhs) in a.row(i).iter().enumerate() {
            acc += lhs * b[(k, j)];
        }
        acc
    })?;
    Ok(product)
}

#[cfg(test)]
mod tests {
    use mmalink_frame::Shape;

    use super::*;

    fn filled(rows: usize, cols: usize) -> Matrix {
        Matrix::from_fn(rows, cols, |r, c| (r * cols + c) as f32).unwrap()
    }

    #[test]
    fn multiply_two_by_two() {
        let a = Matrix::from_rows(&[[1.0f32, 2.0], [3.0, 4.0]]).unwrap();
        let b = Matrix::from_rows(&[[5.0f32, 6.0], [7.0, 8.0]]).unwrap();
        let expected = Matrix::from_rows(&[[19.0f32, 22.0], [43.0, 50.0]]).unwrap();
        assert_eq!(multiply(&a, &b).unwrap(), expected);
    }

    #[test]
    fn multiply_rectangular() {
        let a = filled(2, 3);
        let b = filled(3, 4);
        let product = multiply(&a, &b).unwrap();

        assert_eq!(product.shape(), Shape::new(2, 4));
        // Row 1 of A is [3, 4, 5]; column 2 of B is [2, 6, 10].
        assert_eq!(product[(1, 2)], 3.0 * 2.0 + 4.0 * 6.0 + 5.0 * 10.0);
    }

    #[test]
    fn multiply_by_identity() {
        let a = filled(3, 3);
        let identity = Matrix::from_fn(3, 3, |r, c| if r == c { 1.0 } else { 0.0 }).unwrap();
        assert_eq!(multiply(&a, &identity).unwrap(), a);
    }

    #[test]
    fn multiply_rejects_inner_mismatch() {
        let a = filled(2, 3);
        let b = filled(2, 3);
        let err = multiply(&a, &b).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::DimensionMismatch { operation: "multiply", left, right }
                if left == Shape::new(2, 3) && right == Shape::new(2, 3)
        ));
    }

    #[test]
    fn accumulation_order_is_left_to_right() {
        let a = Matrix::from_rows(&[[1.0e8f32, 1.0, -1.0e8]]).unwrap();
        let b = Matrix::from_rows(&[[1.0f32], [1.0], [1.0]]).unwrap();
        // (1e8 + 1) rounds back to 1e8 in f32, so the sum is exactly zero.
        assert_eq!(multiply(&a, &b).unwrap()[(0, 0)], 0.0);
    }

    #[test]
    fn square_operands_are_equal_shape_and_chain() {
        let a = filled(2, 2);
        let b = filled(2, 2);
        assert_eq!(classify_compatibility(&a, &b), CompatibilityClass::EqualShape);
        assert!(is_multipliable(&a, &b));
    }

    #[test]
    fn classification_table() {
        let cases = [
            ((2, 3), (2, 5), CompatibilityClass::WiderB),
            ((4, 3), (2, 3), CompatibilityClass::TallerA),
            ((2, 5), (3, 4), CompatibilityClass::ShrunkSquare),
            ((4, 2), (3, 5), CompatibilityClass::GrownSquare),
            ((2, 3), (3, 4), CompatibilityClass::ChainCompatible),
            ((2, 3), (4, 5), CompatibilityClass::Unclassified),
        ];
        for ((ar, ac), (br, bc), expected) in cases {
            let class = classify_compatibility(&filled(ar, ac), &filled(br, bc));
            assert_eq!(class, expected, "{ar}x{ac} vs {br}x{bc}");
        }
    }

    #[test]
    fn classification_never_gates_multiply() {
        // Wider-B but not multipliable: classifier reports, multiply refuses.
        let a = filled(2, 3);
        let b = filled(2, 5);
        assert_eq!(classify_compatibility(&a, &b), CompatibilityClass::WiderB);
        assert!(multiply(&a, &b).is_err());

        // Shrunk-square and multipliable.
        let a = filled(1, 3);
        let b = filled(3, 1);
        assert_eq!(
            classify_compatibility(&a, &b),
            CompatibilityClass::ShrunkSquare
        );
        assert!(multiply(&a, &b).is_ok());
    }

    #[test]
    fn codes_and_names() {
        assert_eq!(CompatibilityClass::EqualShape.code(), 1);
        assert_eq!(CompatibilityClass::ChainCompatible.code(), 6);
        assert_eq!(CompatibilityClass::Unclassified.code(), 0);
        assert_eq!(CompatibilityClass::GrownSquare.to_string(), "grown-square");
    }
}
