use mmalink_frame::Shape;

/// Errors that can occur while computing or checking products.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The operation's algebraic precondition on shapes does not hold.
    #[error("dimension mismatch in {operation}: {left} vs {right}")]
    DimensionMismatch {
        operation: &'static str,
        left: Shape,
        right: Shape,
    },

    /// A tolerance parameter was negative or NaN.
    #[error("invalid tolerance {0}")]
    InvalidTolerance(f32),

    /// The computed product could not be represented as a matrix.
    #[error("invalid product: {0}")]
    Frame(#[from] mmalink_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
