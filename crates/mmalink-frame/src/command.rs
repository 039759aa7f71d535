//! Single-byte opcodes and status codes.
//!
//! Host → device: slot select (0x01, 0x02), START (0x03), GET_RESULT (0x04).
//! Device → host: DONE (0x05), ACK (0x06).

use std::fmt;

use crate::error::{FrameError, Result};

/// Select operand slot 1; an operand frame follows.
pub const SELECT_OPERAND_1: u8 = 0x01;

/// Select operand slot 2; an operand frame follows.
pub const SELECT_OPERAND_2: u8 = 0x02;

/// Start multiplying the loaded operands.
pub const START: u8 = 0x03;

/// Request the result frame.
pub const GET_RESULT: u8 = 0x04;

/// Computation complete.
pub const DONE: u8 = 0x05;

/// Operand frame received.
pub const ACK: u8 = 0x06;

/// Operand position on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Operand1,
    Operand2,
}

impl Slot {
    /// The 1-based slot number.
    pub fn number(self) -> u32 {
        match self {
            Slot::Operand1 => 1,
            Slot::Operand2 => 2,
        }
    }
}

impl TryFrom<u32> for Slot {
    type Error = FrameError;

    fn try_from(slot: u32) -> Result<Self> {
        match slot {
            1 => Ok(Slot::Operand1),
            2 => Ok(Slot::Operand2),
            other => Err(FrameError::InvalidSlot(other)),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.number())
    }
}

/// A host → device command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectSlot(Slot),
    Start,
    GetResult,
}

impl Command {
    /// The opcode byte sent on the wire.
    pub fn opcode(self) -> u8 {
        match self {
            // Masked low byte of the slot number.
            Command::SelectSlot(slot) => (slot.number() & 0xFF) as u8,
            Command::Start => START,
            Command::GetResult => GET_RESULT,
        }
    }
}

/// Build the slot-select opcode for a 1-based slot number.
pub fn build_slot_select(slot: u32) -> Result<u8> {
    Ok(Command::SelectSlot(Slot::try_from(slot)?).opcode())
}

/// A device → host status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ack,
    Done,
    Other(u8),
}

impl Status {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            ACK => Status::Ack,
            DONE => Status::Done,
            other => Status::Other(other),
        }
    }

    pub fn byte(self) -> u8 {
        match self {
            Status::Ack => ACK,
            Status::Done => DONE,
            Status::Other(byte) => byte,
        }
    }
}

/// Returns a human-readable name for a protocol byte.
pub fn opcode_name(byte: u8) -> &'static str {
    match byte {
        SELECT_OPERAND_1 => "SELECT_OPERAND_1",
        SELECT_OPERAND_2 => "SELECT_OPERAND_2",
        START => "START",
        GET_RESULT => "GET_RESULT",
        DONE => "DONE",
        ACK => "ACK",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_select_opcodes() {
        assert_eq!(build_slot_select(1).unwrap(), SELECT_OPERAND_1);
        assert_eq!(build_slot_select(2).unwrap(), SELECT_OPERAND_2);
    }

    #[test]
    fn slot_select_rejects_other_numbers() {
        for slot in [0, 3, 255, 257, u32::MAX] {
            assert!(matches!(
                build_slot_select(slot),
                Err(FrameError::InvalidSlot(s)) if s == slot
            ));
        }
    }

    #[test]
    fn command_opcodes() {
        assert_eq!(Command::Start.opcode(), 0x03);
        assert_eq!(Command::GetResult.opcode(), 0x04);
        assert_eq!(Command::SelectSlot(Slot::Operand2).opcode(), 0x02);
    }

    #[test]
    fn status_classification() {
        assert_eq!(Status::from_byte(0x06), Status::Ack);
        assert_eq!(Status::from_byte(0x05), Status::Done);
        assert_eq!(Status::from_byte(0x15), Status::Other(0x15));
        assert_eq!(Status::Other(0x15).byte(), 0x15);
    }

    #[test]
    fn names() {
        assert_eq!(opcode_name(START), "START");
        assert_eq!(opcode_name(ACK), "ACK");
        assert_eq!(opcode_name(0xEE), "UNKNOWN");
        assert_eq!(Slot::Operand1.to_string(), "slot 1");
    }
}
