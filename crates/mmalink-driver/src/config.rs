use std::time::Duration;

use mmalink_frame::FrameConfig;

/// Timeouts and limits for one device session.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Bound on waiting for the ACK after an operand frame.
    pub ack_timeout: Duration,
    /// Bound on waiting for DONE after START.
    pub completion_timeout: Duration,
    /// Read timeout applied while receiving the result frame.
    pub result_timeout: Duration,
    /// Sleep between polls of the receive queue while waiting for a status byte.
    pub poll_interval: Duration,
    /// Codec limits for the result frame.
    pub frame: FrameConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(5),
            completion_timeout: Duration::from_secs(30),
            result_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(5),
            frame: FrameConfig::default(),
        }
    }
}
