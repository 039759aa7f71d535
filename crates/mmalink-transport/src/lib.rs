//! Serial channel abstraction for the MMA host link.
//!
//! Provides a unified byte-stream interface over the ways the accelerator can
//! be reached:
//! - A serial character device (`/dev/ttyUSB0`, `/dev/ttyACM0`, a pty)
//! - A Unix domain socket bridge (a device emulator or a tty multiplexer)
//!
//! This is the lowest layer of mmalink. Everything else builds on top of
//! the [`SerialChannel`] trait and the [`SerialStream`] type provided here.

pub mod config;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod tty;

pub use config::{SerialConfig, DEFAULT_BAUD_RATE};
pub use error::{Result, TransportError};
pub use traits::{SerialChannel, SerialStream};

#[cfg(unix)]
pub use tty::SerialPort;
