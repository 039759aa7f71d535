/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The byte source ended, or announced an impossible shape, before a
    /// complete matrix frame was read.
    #[error("malformed matrix frame: {0}")]
    MalformedFrame(String),

    /// Slot numbers other than 1 and 2 have no opcode.
    #[error("invalid operand slot {0} (expected 1 or 2)")]
    InvalidSlot(u32),

    /// Rows are ragged, empty, or exceed the 32-bit dimension field.
    #[error("invalid matrix shape: {0}")]
    InvalidShape(String),

    /// The frame announces more elements than the configured maximum.
    #[error("matrix too large ({elements} elements, max {max})")]
    PayloadTooLarge { elements: u64, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
