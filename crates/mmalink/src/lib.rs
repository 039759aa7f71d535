//! Host-side driver for the MMA matrix multiplication accelerator.
//!
//! mmalink sends two operand matrices to the accelerator over a serial link,
//! drives the START/DONE handshake, reads back the product and checks it
//! against a locally computed reference.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial channel abstraction (tty, Unix socket bridge)
//! - [`frame`]: matrix wire codec and command bytes
//! - [`verify`]: reference product and result comparison
//! - [`driver`]: session state machine, verified multiply, device emulator
//! - [`generate`]: seeded random operands

pub mod generate;

/// Re-export transport types.
pub mod transport {
    pub use mmalink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mmalink_frame::*;
}

/// Re-export verification types.
pub mod verify {
    pub use mmalink_verify::*;
}

/// Re-export driver types.
pub mod driver {
    pub use mmalink_driver::*;
}
