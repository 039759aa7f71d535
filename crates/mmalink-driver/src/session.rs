use std::fmt;
use std::io::ErrorKind;
use std::time::{Duration, Instant};

use mmalink_frame::{
    opcode_name, Command, FrameError, FrameReader, FrameWriter, Matrix, Slot, Status,
};
use mmalink_transport::{SerialChannel, TransportError};
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::error::{DriverError, Result};

/// Handshake progress. Only moves forward; any error lands in `Failed`.
///
/// Each operand state means that operand has been sent (and, once the call
/// returns successfully, acknowledged).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    SendingOperand1,
    SendingOperand2,
    Started,
    AwaitingCompletion,
    FetchingResult,
    Done,
    Failed,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::SendingOperand1 => "sending-operand-1",
            SessionState::SendingOperand2 => "sending-operand-2",
            SessionState::Started => "started",
            SessionState::AwaitingCompletion => "awaiting-completion",
            SessionState::FetchingResult => "fetching-result",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        }
    }

    /// Whether the link is mid-exchange and would be out of sync if abandoned.
    fn in_flight(self) -> bool {
        !matches!(
            self,
            SessionState::Idle | SessionState::Done | SessionState::Failed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One multiply handshake over an exclusively owned channel.
///
/// The first error fails the session and closes the channel. A session
/// dropped mid-exchange also closes it, so a desynchronized link is never
/// reused. [`Session::finish`] hands the channel back only after `Done`.
pub struct Session<C: SerialChannel> {
    channel: Option<C>,
    state: SessionState,
    config: DriverConfig,
}

impl<C: SerialChannel> Session<C> {
    /// Start a session with default timeouts.
    pub fn new(channel: C) -> Self {
        Self::with_config(channel, DriverConfig::default())
    }

    /// Start a session with explicit configuration.
    pub fn with_config(channel: C, config: DriverConfig) -> Self {
        Self {
            channel: Some(channel),
            state: SessionState::Idle,
            config,
        }
    }

    /// Current handshake state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Send an operand to `slot` (1 or 2) and wait for the device's ACK.
    ///
    /// Slot 1 must be sent first, then slot 2.
    pub fn send_matrix(&mut self, matrix: &Matrix, slot: u32) -> Result<()> {
        self.guarded(|session| {
            let slot = Slot::try_from(slot)?;
            let (expected, next) = match slot {
                Slot::Operand1 => (SessionState::Idle, SessionState::SendingOperand1),
                Slot::Operand2 => (SessionState::SendingOperand1, SessionState::SendingOperand2),
            };
            session.transition("send matrix", expected, next)?;

            let written = FrameWriter::new(session.open_channel()?).send_operand(slot, matrix)?;
            debug!(%slot, shape = %matrix.shape(), bytes = written, "operand frame sent");

            let ack_timeout = session.config.ack_timeout;
            let deadline = Instant::now() + ack_timeout;
            let observed = session.next_byte(deadline, "operand ACK wait", ack_timeout)?;
            match Status::from_byte(observed) {
                Status::Ack => {
                    debug!(%slot, "operand acknowledged");
                    Ok(())
                }
                _ => Err(DriverError::ProtocolNack { slot, observed }),
            }
        })
    }

    /// Tell the device to multiply the loaded operands. No reply is expected.
    pub fn start(&mut self) -> Result<()> {
        self.guarded(|session| {
            session.transition(
                "start",
                SessionState::SendingOperand2,
                SessionState::Started,
            )?;
            FrameWriter::new(session.open_channel()?).send_command(Command::Start)?;
            info!("multiply started");
            Ok(())
        })
    }

    /// Wait for DONE, discarding any other bytes the device emits first.
    pub fn await_completion(&mut self) -> Result<()> {
        self.guarded(|session| {
            session.transition(
                "await completion",
                SessionState::Started,
                SessionState::AwaitingCompletion,
            )?;

            let timeout = session.config.completion_timeout;
            let deadline = Instant::now() + timeout;
            let mut discarded = 0usize;
            loop {
                let byte = session.next_byte(deadline, "await completion", timeout)?;
                if Status::from_byte(byte) == Status::Done {
                    break;
                }
                debug!(
                    byte = format_args!("0x{byte:02X}"),
                    name = opcode_name(byte),
                    "discarding byte while awaiting DONE"
                );
                discarded += 1;
            }

            session.state = SessionState::FetchingResult;
            info!(discarded, "device reported completion");
            Ok(())
        })
    }

    /// Request and decode the device's result matrix.
    pub fn fetch_result(&mut self) -> Result<Matrix> {
        self.guarded(|session| {
            session.expect_state("fetch result", SessionState::FetchingResult)?;

            let result_timeout = session.config.result_timeout;
            let frame_config = session.config.frame.clone();
            let channel = session.open_channel()?;
            FrameWriter::new(&mut *channel).send_command(Command::GetResult)?;
            let previous_timeout = channel.read_timeout();
            channel.set_read_timeout(Some(result_timeout))?;

            let result = FrameReader::with_config(&mut *channel, frame_config)
                .read_matrix()
                .map_err(|err| timeout_or_frame(err, "result read", result_timeout))?;
            channel.set_read_timeout(previous_timeout)?;

            session.state = SessionState::Done;
            info!(shape = %result.shape(), "result received");
            Ok(result)
        })
    }

    /// Release the channel after a completed (or never started) session.
    ///
    /// The channel comes back with the read timeout it had when the session
    /// started.
    pub fn finish(mut self) -> Result<C> {
        match self.state {
            SessionState::Done | SessionState::Idle => {
                self.channel.take().ok_or(DriverError::ChannelClosed)
            }
            SessionState::Failed => Err(DriverError::SessionFailed),
            actual => Err(DriverError::InvalidState {
                operation: "finish",
                expected: SessionState::Done,
                actual,
            }),
        }
    }

    // Runs `op`; on error fails the session and closes the channel.
    fn guarded<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.state == SessionState::Failed {
            return Err(DriverError::SessionFailed);
        }
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(state = %self.state, kind = err.kind(), error = %err, "session failed");
                self.state = SessionState::Failed;
                if let Some(channel) = self.channel.as_mut() {
                    let _ = channel.close();
                }
                Err(err)
            }
        }
    }

    fn expect_state(&self, operation: &'static str, expected: SessionState) -> Result<()> {
        if self.state != expected {
            return Err(DriverError::InvalidState {
                operation,
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn transition(
        &mut self,
        operation: &'static str,
        expected: SessionState,
        next: SessionState,
    ) -> Result<()> {
        self.expect_state(operation, expected)?;
        self.state = next;
        Ok(())
    }

    fn open_channel(&mut self) -> Result<&mut C> {
        match self.channel.as_mut() {
            Some(channel) if channel.is_open() => Ok(channel),
            _ => Err(DriverError::ChannelClosed),
        }
    }

    // Polls the receive queue until one byte can be read or `deadline` passes.
    fn next_byte(
        &mut self,
        deadline: Instant,
        operation: &'static str,
        timeout: Duration,
    ) -> Result<u8> {
        let poll_interval = self.config.poll_interval;
        let channel = self.open_channel()?;
        loop {
            if channel.bytes_available()? > 0 {
                return match FrameReader::new(&mut *channel).read_byte() {
                    Ok(Some(byte)) => Ok(byte),
                    Ok(None) => Err(TransportError::HungUp.into()),
                    Err(err) => Err(timeout_or_frame(err, operation, timeout)),
                };
            }
            if channel.peer_hung_up()? {
                return Err(TransportError::HungUp.into());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(DriverError::Timeout { operation, timeout });
            }
            std::thread::sleep(poll_interval.min(deadline - now));
        }
    }
}

impl<C: SerialChannel> Drop for Session<C> {
    fn drop(&mut self) {
        if self.state.in_flight() {
            if let Some(channel) = self.channel.as_mut() {
                warn!(state = %self.state, "session abandoned mid-exchange; closing channel");
                let _ = channel.close();
            }
        }
    }
}

impl<C: SerialChannel> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field(
                "channel_open",
                &self.channel.as_ref().is_some_and(|c| c.is_open()),
            )
            .field("config", &self.config)
            .finish()
    }
}

fn timeout_or_frame(err: FrameError, operation: &'static str, timeout: Duration) -> DriverError {
    match err {
        FrameError::Io(io)
            if io.kind() == ErrorKind::TimedOut || io.kind() == ErrorKind::WouldBlock =>
        {
            DriverError::Timeout { operation, timeout }
        }
        FrameError::Io(io) if io.kind() == ErrorKind::NotConnected => DriverError::ChannelClosed,
        other => DriverError::Frame(other),
    }
}
