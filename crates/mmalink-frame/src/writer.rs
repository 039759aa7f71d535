use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::codec::{encode_matrix, encoded_len};
use crate::command::{opcode_name, Command, Slot};
use crate::error::{FrameError, Result};
use crate::matrix::Matrix;

/// Writes commands and operand frames to any `Write` stream.
///
/// An operand frame (slot select + matrix) is assembled in one buffer and
/// written as a single unit, then flushed.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
        }
    }

    /// Send `[slot opcode][M][N][elements]` and flush. Returns bytes written.
    pub fn send_operand(&mut self, slot: Slot, matrix: &Matrix) -> Result<usize> {
        self.buf.clear();
        self.buf.reserve(1 + encoded_len(matrix));
        self.buf.put_u8(Command::SelectSlot(slot).opcode());
        encode_matrix(matrix, &mut self.buf);
        trace!(%slot, bytes = self.buf.len(), "writing operand frame");
        self.write_buf()?;
        Ok(self.buf.len())
    }

    /// Send a single command opcode and flush.
    pub fn send_command(&mut self, command: Command) -> Result<()> {
        self.buf.clear();
        self.buf.put_u8(command.opcode());
        trace!(opcode = opcode_name(command.opcode()), "writing command");
        self.write_buf()
    }

    /// Send a bare `[M][N][elements]` frame and flush (device side of
    /// GET_RESULT). Returns bytes written.
    pub fn send_matrix(&mut self, matrix: &Matrix) -> Result<usize> {
        self.buf.clear();
        self.buf.reserve(encoded_len(matrix));
        encode_matrix(matrix, &mut self.buf);
        trace!(shape = %matrix.shape(), bytes = self.buf.len(), "writing result frame");
        self.write_buf()?;
        Ok(self.buf.len())
    }

    /// Send raw status bytes (ACK, DONE, or anything else) and flush.
    pub fn send_status(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(bytes);
        trace!(count = bytes.len(), "writing status bytes");
        self.write_buf()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn write_buf(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => {
                    return Err(FrameError::Io(std::io::Error::new(
                        ErrorKind::WriteZero,
                        format!("stream accepted {offset} of {} frame bytes", self.buf.len()),
                    )))
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::codec::decode;

    #[test]
    fn operand_frame_layout() {
        let m = Matrix::from_rows(&[[1.0f32, 2.0], [3.0, 4.0]]).unwrap();
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        let written = writer.send_operand(Slot::Operand2, &m).unwrap();
        let wire = writer.into_inner().into_inner();

        assert_eq!(written, 1 + 8 + 16);
        assert_eq!(wire.len(), written);
        assert_eq!(wire[0], 0x02);
        assert_eq!(decode(&wire[1..]).unwrap(), m);
    }

    #[test]
    fn commands_are_single_bytes() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_command(Command::Start).unwrap();
        writer.send_command(Command::GetResult).unwrap();
        assert_eq!(writer.get_ref().get_ref().as_slice(), &[0x03, 0x04]);
    }

    #[test]
    fn short_writes_are_completed() {
        let m = Matrix::from_fn(3, 3, |r, c| (r + c) as f32).unwrap();
        let mut writer = FrameWriter::new(OneBytePerWrite::default());
        writer.send_operand(Slot::Operand1, &m).unwrap();

        let wire = &writer.get_ref().bytes;
        assert_eq!(wire[0], 0x01);
        assert_eq!(decode(&wire[1..]).unwrap(), m);
    }

    #[test]
    fn result_frame_has_no_opcode() {
        let m = Matrix::from_rows(&[[7.5f32]]).unwrap();
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_status(&[0x06, 0x05]).unwrap();
        let written = writer.send_matrix(&m).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(written, 12);
        assert_eq!(&wire[..2], &[0x06, 0x05]);
        assert_eq!(decode(&wire[2..]).unwrap(), m);
    }

    #[test]
    fn write_zero_is_an_error() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send_command(Command::Start).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WriteZero));
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send_command(Command::GetResult).unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[derive(Default)]
    struct OneBytePerWrite {
        bytes: Vec<u8>,
    }

    impl Write for OneBytePerWrite {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match buf.first() {
                Some(&b) => {
                    self.bytes.push(b);
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }
}
