use std::path::PathBuf;
use std::time::Duration;

/// Line rate used by the accelerator firmware unless told otherwise.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Configuration for opening a serial channel.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Character device or Unix socket path.
    pub path: PathBuf,
    /// Line rate in bits per second. Ignored for socket bridges.
    pub baud_rate: u32,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl SerialConfig {
    /// Configuration for `path` with default line settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Some(Duration::from_secs(1)),
            write_timeout: Some(Duration::from_secs(5)),
        }
    }

    /// Override the line rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}
