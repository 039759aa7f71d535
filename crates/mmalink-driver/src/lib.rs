//! Host-side protocol driver for the MMA serial link.
//!
//! A [`Session`] walks one multiply through the device handshake:
//! operand 1 → ACK, operand 2 → ACK, START, wait for DONE, GET_RESULT.
//! [`multiply_and_verify`] runs a whole session and checks the device's
//! answer against a reference product computed alongside it.

pub mod config;
#[cfg(unix)]
pub mod connector;
pub mod emulator;
pub mod error;
pub mod job;
pub mod session;

pub use config::DriverConfig;
#[cfg(unix)]
pub use connector::{connect, connect_with_config};
pub use emulator::{DeviceEmulator, EmulatorConfig, EmulatorStats};
pub use error::{DriverError, Result};
pub use job::{multiply_and_verify, JobReport};
pub use session::{Session, SessionState};
