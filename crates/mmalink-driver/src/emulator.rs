//! Software stand-in for the accelerator.
//!
//! [`DeviceEmulator`] speaks the device side of the protocol over any
//! blocking `Read + Write` stream: it ACKs each operand frame, multiplies on
//! START and announces DONE, and answers GET_RESULT with the product frame.
//! Faults (NACKs, chatter before DONE, slow completion, a wrong product) can
//! be injected through [`EmulatorConfig`].

use std::io::{Read, Write};
use std::time::Duration;

use mmalink_frame::{
    opcode_name, FrameConfig, FrameReader, FrameWriter, Matrix, ACK, DONE, GET_RESULT,
    SELECT_OPERAND_1, SELECT_OPERAND_2, START,
};
use mmalink_verify::multiply;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Device behaviour knobs.
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Delay between START and DONE.
    pub completion_delay: Duration,
    /// Byte sent after each operand frame. `0x06` acknowledges.
    pub ack_byte: u8,
    /// Bytes emitted after START, before DONE.
    pub chatter: Vec<u8>,
    /// Perturb the first element of every result.
    pub corrupt_result: bool,
    pub frame: FrameConfig,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            completion_delay: Duration::ZERO,
            ack_byte: ACK,
            chatter: Vec::new(),
            corrupt_result: false,
            frame: FrameConfig::default(),
        }
    }
}

/// Counters for one served connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmulatorStats {
    pub operands: usize,
    pub multiplies: usize,
    pub results: usize,
    /// Opcodes the emulator did not recognise.
    pub ignored: usize,
}

#[derive(Debug, Default)]
pub struct DeviceEmulator {
    config: EmulatorConfig,
}

impl DeviceEmulator {
    pub fn new(config: EmulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Serve one host connection until it closes.
    ///
    /// Returns when the host hangs up between commands. A frame cut short
    /// by the host is an error.
    pub fn serve<S: Read + Write>(&self, mut stream: S) -> Result<EmulatorStats> {
        let mut stats = EmulatorStats::default();
        let mut operands: [Option<Matrix>; 2] = [None, None];
        let mut result: Option<Matrix> = None;

        loop {
            let opcode = match FrameReader::new(&mut stream).read_byte()? {
                Some(byte) => byte,
                None => {
                    debug!(?stats, "host closed connection");
                    return Ok(stats);
                }
            };

            match opcode {
                SELECT_OPERAND_1 | SELECT_OPERAND_2 => {
                    let index = usize::from(opcode - SELECT_OPERAND_1);
                    let matrix = FrameReader::with_config(&mut stream, self.config.frame.clone())
                        .read_matrix()?;
                    debug!(slot = index + 1, shape = %matrix.shape(), "operand received");
                    operands[index] = Some(matrix);
                    stats.operands += 1;
                    FrameWriter::new(&mut stream).send_status(&[self.config.ack_byte])?;
                }
                START => {
                    result = self.compute(&operands);
                    if !self.config.completion_delay.is_zero() {
                        std::thread::sleep(self.config.completion_delay);
                    }
                    if result.is_some() {
                        stats.multiplies += 1;
                        let mut reply = self.config.chatter.clone();
                        reply.push(DONE);
                        FrameWriter::new(&mut stream).send_status(&reply)?;
                    }
                }
                GET_RESULT => match result.as_ref() {
                    Some(product) => {
                        FrameWriter::new(&mut stream).send_matrix(product)?;
                        stats.results += 1;
                    }
                    None => warn!("GET_RESULT before a completed multiply; ignoring"),
                },
                other => {
                    warn!(
                        opcode = format_args!("0x{other:02X}"),
                        name = opcode_name(other),
                        "unexpected opcode"
                    );
                    stats.ignored += 1;
                }
            }
        }
    }

    // A missing or incompatible operand pair never reaches DONE.
    fn compute(&self, operands: &[Option<Matrix>; 2]) -> Option<Matrix> {
        let (Some(a), Some(b)) = (&operands[0], &operands[1]) else {
            warn!("START before both operands were loaded");
            return None;
        };
        let product = match multiply(a, b) {
            Ok(product) => product,
            Err(err) => {
                warn!(error = %err, "cannot multiply loaded operands");
                return None;
            }
        };
        info!(shape = %product.shape(), "multiply complete");

        if !self.config.corrupt_result {
            return Some(product);
        }
        let (rows, cols) = (product.rows(), product.cols());
        let mut data = product.into_vec();
        // Flip the lowest mantissa bit so the change survives any magnitude.
        data[0] = f32::from_bits(data[0].to_bits() ^ 1);
        Matrix::from_vec(rows, cols, data).ok()
    }
}
