use std::path::Path;

use mmalink_transport::{SerialConfig, SerialPort, SerialStream};
use tracing::debug;

use crate::config::DriverConfig;
use crate::error::Result;
use crate::session::Session;

/// Open the device at `path` with default line settings and timeouts.
pub fn connect(path: impl AsRef<Path>) -> Result<Session<SerialStream>> {
    connect_with_config(
        &SerialConfig::new(path.as_ref()),
        DriverConfig::default(),
    )
}

/// Open the device described by `serial` and start a session on it.
pub fn connect_with_config(
    serial: &SerialConfig,
    config: DriverConfig,
) -> Result<Session<SerialStream>> {
    let stream = SerialPort::open(serial)?;
    debug!(
        path = ?serial.path,
        transport = SerialPort::transport_name(&serial.path),
        "session channel ready"
    );
    Ok(Session::with_config(stream, config))
}
