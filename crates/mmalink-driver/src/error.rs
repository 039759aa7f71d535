use std::time::Duration;

use mmalink_frame::{FrameError, Slot};
use mmalink_transport::TransportError;
use mmalink_verify::VerifyError;

use crate::session::SessionState;

/// Errors that can occur while driving the accelerator.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The channel was not open when an operation needed it.
    #[error("channel closed")]
    ChannelClosed,

    /// Transport-level error.
    #[error("channel error: {0}")]
    Channel(#[from] TransportError),

    /// Frame-level error (malformed result, invalid slot, stream I/O).
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The device answered an operand frame with something other than ACK.
    #[error("device replied 0x{observed:02X} instead of ACK (0x06) to operand {slot}")]
    ProtocolNack { slot: Slot, observed: u8 },

    /// A bounded wait expired.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// An operation was called out of handshake order.
    #[error("{operation} requires state {expected}, session is {actual}")]
    InvalidState {
        operation: &'static str,
        expected: SessionState,
        actual: SessionState,
    },

    /// The session already failed and cannot be resumed.
    #[error("session failed earlier; start a new session")]
    SessionFailed,

    /// Reference computation or comparison error.
    #[error("verification error: {0}")]
    Verify(#[from] VerifyError),

    /// The reference computation thread panicked.
    #[error("reference worker panicked")]
    ReferenceWorker,
}

impl DriverError {
    /// Stable kind name for reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DriverError::ChannelClosed => "channel-closed",
            DriverError::Channel(TransportError::Closed | TransportError::HungUp) => {
                "channel-closed"
            }
            DriverError::Channel(_) => "channel-error",
            DriverError::Frame(FrameError::MalformedFrame(_)) => "malformed-frame",
            DriverError::Frame(FrameError::InvalidSlot(_)) => "invalid-slot",
            DriverError::Frame(FrameError::PayloadTooLarge { .. }) => "malformed-frame",
            DriverError::Frame(FrameError::InvalidShape(_)) => "invalid-shape",
            DriverError::Frame(FrameError::Io(_)) => "channel-error",
            DriverError::ProtocolNack { .. } => "protocol-nack",
            DriverError::Timeout { .. } => "timeout",
            DriverError::InvalidState { .. } => "invalid-state",
            DriverError::SessionFailed => "session-failed",
            DriverError::Verify(VerifyError::DimensionMismatch { .. }) => "dimension-mismatch",
            DriverError::Verify(_) => "verification-error",
            DriverError::ReferenceWorker => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
