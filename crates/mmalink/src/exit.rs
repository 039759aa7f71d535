use std::fmt;
use std::io;

use mmalink_driver::DriverError;
use mmalink_frame::FrameError;
use mmalink_transport::TransportError;
use mmalink_verify::VerifyError;

pub const SUCCESS: i32 = 0;
/// Also used when the device result fails verification.
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { ref source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        TransportError::UnsupportedBaud(_) => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::InvalidSlot(_) | FrameError::InvalidShape(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        FrameError::MalformedFrame(_) | FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn verify_error(context: &str, err: VerifyError) -> CliError {
    match err {
        VerifyError::DimensionMismatch { .. } | VerifyError::InvalidTolerance(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        VerifyError::Frame(err) => frame_error(context, err),
    }
}

/// Map a driver failure to an exit code, keeping its kind in the message.
pub fn driver_error(context: &str, err: DriverError) -> CliError {
    let kind = err.kind();
    let context = format!("{context} [{kind}]");
    match err {
        DriverError::Channel(err) => transport_error(&context, err),
        DriverError::Frame(err) => frame_error(&context, err),
        DriverError::Verify(err) => verify_error(&context, err),
        DriverError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        DriverError::ChannelClosed | DriverError::ProtocolNack { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        DriverError::InvalidState { .. }
        | DriverError::SessionFailed
        | DriverError::ReferenceWorker => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mmalink_frame::Slot;

    use super::*;

    #[test]
    fn timeouts_map_to_124() {
        let err = driver_error(
            "multiply failed",
            DriverError::Timeout {
                operation: "await completion",
                timeout: Duration::from_millis(50),
            },
        );
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.contains("[timeout]"));
    }

    #[test]
    fn nack_reports_observed_byte() {
        let err = driver_error(
            "multiply failed",
            DriverError::ProtocolNack {
                slot: Slot::Operand2,
                observed: 0x15,
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.contains("0x15"));
        assert!(err.message.contains("[protocol-nack]"));
    }

    #[test]
    fn malformed_result_is_data_invalid() {
        let err = driver_error(
            "multiply failed",
            DriverError::Frame(FrameError::MalformedFrame("short payload".into())),
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn missing_device_is_transport_error() {
        let err = transport_error(
            "open failed",
            TransportError::Open {
                path: "/dev/ttyMISSING".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
