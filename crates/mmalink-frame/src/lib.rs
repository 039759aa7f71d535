//! Matrix wire codec and command framing for the MMA serial protocol.
//!
//! Everything that crosses the link is either a single-byte opcode/status or
//! a matrix frame:
//! - A 4-byte big-endian row count M
//! - A 4-byte big-endian column count N
//! - M×N big-endian IEEE-754 `f32` values, row-major
//!
//! The codec is pure. [`FrameReader`] and [`FrameWriter`] move frames over
//! any blocking `Read` / `Write` stream.

pub mod codec;
pub mod command;
pub mod error;
pub mod matrix;
pub mod reader;
pub mod writer;

pub use codec::{
    decode, decode_matrix, encode, encode_matrix, encoded_len, FrameConfig, DEFAULT_MAX_ELEMENTS,
    DIM_HEADER_SIZE, ELEMENT_SIZE,
};
pub use command::{
    build_slot_select, opcode_name, Command, Slot, Status, ACK, DONE, GET_RESULT,
    SELECT_OPERAND_1, SELECT_OPERAND_2, START,
};
pub use error::{FrameError, Result};
pub use matrix::{Matrix, Shape};
pub use reader::FrameReader;
pub use writer::FrameWriter;
