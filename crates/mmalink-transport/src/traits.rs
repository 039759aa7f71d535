use std::io::{Read, Write};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A byte-oriented duplex link to the accelerator.
///
/// Reads honour the configured read timeout: a read that sees no data in
/// time fails with `ErrorKind::TimedOut` or `ErrorKind::WouldBlock` instead
/// of blocking forever. Once closed, a channel never reopens.
pub trait SerialChannel: Read + Write {
    /// Whether the channel can still carry traffic.
    fn is_open(&self) -> bool;

    /// Number of received bytes that can be read without blocking.
    fn bytes_available(&self) -> Result<usize>;

    /// Whether the remote end has hung up. Bytes it sent before hanging up
    /// may still be queued; check [`bytes_available`](Self::bytes_available)
    /// first. Channels that cannot tell report `false`.
    fn peer_hung_up(&self) -> Result<bool> {
        Ok(false)
    }

    /// Timeout currently bounding blocking reads.
    fn read_timeout(&self) -> Option<Duration>;

    /// Bound subsequent blocking reads. `None` blocks indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;

    /// Release the underlying link. Idempotent.
    fn close(&mut self) -> Result<()>;
}

impl<C: SerialChannel + ?Sized> SerialChannel for &mut C {
    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn bytes_available(&self) -> Result<usize> {
        (**self).bytes_available()
    }

    fn peer_hung_up(&self) -> Result<bool> {
        (**self).peer_hung_up()
    }

    fn read_timeout(&self) -> Option<Duration> {
        (**self).read_timeout()
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// An open serial link: either a configured tty or a Unix socket bridge.
pub struct SerialStream {
    inner: Option<SerialStreamInner>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

enum SerialStreamInner {
    #[cfg(unix)]
    Tty(std::fs::File),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl SerialStream {
    /// Wrap an already configured tty file descriptor.
    #[cfg(unix)]
    pub(crate) fn from_tty(file: std::fs::File) -> Self {
        Self {
            inner: Some(SerialStreamInner::Tty(file)),
            read_timeout: None,
            write_timeout: None,
        }
    }

    /// Wrap a connected Unix stream (socket bridge or in-process pair).
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: Some(SerialStreamInner::Unix(stream)),
            read_timeout: None,
            write_timeout: None,
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        let timeout = timeout.map(clamp_timeout);
        self.write_timeout = timeout;
        match self.inner.as_ref() {
            None => Err(TransportError::Closed),
            #[cfg(unix)]
            Some(SerialStreamInner::Tty(_)) => Ok(()),
            #[cfg(unix)]
            Some(SerialStreamInner::Unix(stream)) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
        }
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<std::os::fd::RawFd> {
        use std::os::fd::AsRawFd;

        match self.inner.as_ref()? {
            SerialStreamInner::Tty(file) => Some(file.as_raw_fd()),
            SerialStreamInner::Unix(stream) => Some(stream.as_raw_fd()),
        }
    }
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let timeout = self.read_timeout;
        match self.inner.as_mut() {
            None => Err(closed_io_error()),
            #[cfg(unix)]
            Some(SerialStreamInner::Tty(file)) => {
                use std::os::fd::AsRawFd;

                crate::tty::wait_ready(file.as_raw_fd(), libc::POLLIN, timeout)?;
                file.read(buf)
            }
            #[cfg(unix)]
            Some(SerialStreamInner::Unix(stream)) => stream.read(buf),
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let timeout = self.write_timeout;
        match self.inner.as_mut() {
            None => Err(closed_io_error()),
            #[cfg(unix)]
            Some(SerialStreamInner::Tty(file)) => {
                use std::os::fd::AsRawFd;

                crate::tty::wait_ready(file.as_raw_fd(), libc::POLLOUT, timeout)?;
                file.write(buf)
            }
            #[cfg(unix)]
            Some(SerialStreamInner::Unix(stream)) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.inner.as_mut() {
            None => Err(closed_io_error()),
            #[cfg(unix)]
            Some(SerialStreamInner::Tty(file)) => {
                use std::os::fd::AsRawFd;

                crate::tty::drain(file.as_raw_fd())
            }
            #[cfg(unix)]
            Some(SerialStreamInner::Unix(stream)) => stream.flush(),
        }
    }
}

impl SerialChannel for SerialStream {
    fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    #[cfg(unix)]
    fn bytes_available(&self) -> Result<usize> {
        let fd = self.raw_fd().ok_or(TransportError::Closed)?;
        Ok(crate::tty::pending_bytes(fd)?)
    }

    #[cfg(unix)]
    fn peer_hung_up(&self) -> Result<bool> {
        let fd = self.raw_fd().ok_or(TransportError::Closed)?;
        Ok(crate::tty::hung_up(fd)?)
    }

    #[cfg(not(unix))]
    fn bytes_available(&self) -> Result<usize> {
        Err(TransportError::Closed)
    }

    fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        let timeout = timeout.map(clamp_timeout);
        self.read_timeout = timeout;
        match self.inner.as_ref() {
            None => Err(TransportError::Closed),
            #[cfg(unix)]
            Some(SerialStreamInner::Tty(_)) => Ok(()),
            #[cfg(unix)]
            Some(SerialStreamInner::Unix(stream)) => {
                stream.set_read_timeout(timeout).map_err(Into::into)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        match self.inner.take() {
            None => {}
            #[cfg(unix)]
            Some(SerialStreamInner::Tty(file)) => {
                debug!("closing serial device");
                drop(file);
            }
            #[cfg(unix)]
            Some(SerialStreamInner::Unix(stream)) => {
                debug!("closing serial bridge");
                let _ = stream.shutdown(std::net::Shutdown::Both);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.inner.as_ref() {
            None => "closed",
            #[cfg(unix)]
            Some(SerialStreamInner::Tty(_)) => "tty",
            #[cfg(unix)]
            Some(SerialStreamInner::Unix(_)) => "unix",
        };
        f.debug_struct("SerialStream")
            .field("type", &kind)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

// Socket timeouts reject a zero duration.
fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.max(Duration::from_millis(1))
}

fn closed_io_error() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotConnected, "serial channel closed")
}
