use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::SerialConfig;
use crate::error::{Result, TransportError};
use crate::traits::{SerialChannel, SerialStream};

/// Opens serial links to the accelerator.
///
/// A character device is switched to raw 8N1 at the configured baud rate.
/// A path that names a Unix socket is treated as a serial bridge and
/// connected directly; line settings do not apply there.
pub struct SerialPort;

impl SerialPort {
    /// Open and configure the link described by `config`.
    pub fn open(config: &SerialConfig) -> Result<SerialStream> {
        let path = config.path.as_path();
        let metadata = std::fs::metadata(path).map_err(|e| TransportError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut stream = if metadata.file_type().is_socket() {
            let stream = UnixStream::connect(path).map_err(|e| TransportError::Open {
                path: path.to_path_buf(),
                source: e,
            })?;
            info!(?path, "connected to serial bridge");
            SerialStream::from_unix(stream)
        } else {
            let speed = baud_constant(config.baud_rate)
                .ok_or(TransportError::UnsupportedBaud(config.baud_rate))?;
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(libc::O_NOCTTY)
                .open(path)
                .map_err(|e| TransportError::Open {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            configure_raw(file.as_raw_fd(), speed).map_err(|e| TransportError::Configure {
                path: path.to_path_buf(),
                source: e,
            })?;
            info!(?path, baud = config.baud_rate, "opened serial device");
            SerialStream::from_tty(file)
        };

        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        Ok(stream)
    }

    /// Whether `baud_rate` can be requested on this platform.
    pub fn supports_baud(baud_rate: u32) -> bool {
        baud_constant(baud_rate).is_some()
    }

    /// Transport name for diagnostics.
    pub fn transport_name(path: &Path) -> &'static str {
        match std::fs::metadata(path) {
            Ok(meta) if meta.file_type().is_socket() => "unix-socket-bridge",
            Ok(meta) if meta.file_type().is_char_device() => "serial-device",
            _ => "unknown",
        }
    }
}

fn baud_constant(baud_rate: u32) -> Option<libc::speed_t> {
    let speed = match baud_rate {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        #[cfg(target_os = "linux")]
        460800 => libc::B460800,
        #[cfg(target_os = "linux")]
        921600 => libc::B921600,
        _ => return None,
    };
    Some(speed)
}

fn configure_raw(fd: RawFd, speed: libc::speed_t) -> std::io::Result<()> {
    // SAFETY: an all-zero termios is a valid value to hand to tcgetattr,
    // which overwrites it before any field is read.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is an open descriptor and `tio` is a valid writable termios
    // for every call below.
    unsafe {
        if libc::tcgetattr(fd, &mut tio) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        libc::cfmakeraw(&mut tio);
        tio.c_cflag |= libc::CLOCAL | libc::CREAD;
        tio.c_cflag &= !(libc::CSTOPB | libc::PARENB);
        tio.c_cc[libc::VMIN] = 1;
        tio.c_cc[libc::VTIME] = 0;
        if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        // Drop anything the device sent before we took the line.
        if libc::tcflush(fd, libc::TCIOFLUSH) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    debug!(fd, "serial line set to raw 8N1");
    Ok(())
}

/// Block until `fd` is ready for `events` or `timeout` elapses.
pub(crate) fn wait_ready(
    fd: RawFd,
    events: libc::c_short,
    timeout: Option<Duration>,
) -> std::io::Result<()> {
    let timeout_ms: libc::c_int = match timeout {
        None => -1,
        Some(timeout) => timeout.as_micros().div_ceil(1000).min(libc::c_int::MAX as u128)
            as libc::c_int,
    };

    loop {
        let mut pfd = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        // SAFETY: `pfd` is a valid pollfd and the count passed is 1.
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if rc == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "serial channel timed out",
            ));
        }
        return Ok(());
    }
}

/// Number of received bytes waiting in the kernel queue for `fd`.
pub(crate) fn pending_bytes(fd: RawFd) -> std::io::Result<usize> {
    let mut pending: libc::c_int = 0;

    // SAFETY: `pending` is a valid writable c_int and `fd` is an open
    // descriptor owned by the caller for the duration of the call.
    let rc = unsafe { libc::ioctl(fd, libc::FIONREAD, &mut pending) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(pending.max(0) as usize)
}

/// Whether the far end of `fd` has hung up. Never blocks.
///
/// A descriptor that polls readable with nothing queued is at end of stream.
pub(crate) fn hung_up(fd: RawFd) -> std::io::Result<bool> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let rdhup = libc::POLLRDHUP;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let rdhup: libc::c_short = 0;
    let hangup = libc::POLLHUP | libc::POLLERR | rdhup;

    loop {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN | rdhup,
            revents: 0,
        };
        // SAFETY: `pfd` is a valid pollfd and the count passed is 1.
        let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(false);
        }
        if pfd.revents & hangup != 0 {
            return Ok(true);
        }
        return Ok(pfd.revents & libc::POLLIN != 0 && pending_bytes(fd)? == 0);
    }
}

/// Block until all queued output has been transmitted.
pub(crate) fn drain(fd: RawFd) -> std::io::Result<()> {
    loop {
        // SAFETY: `fd` is an open tty descriptor owned by the caller.
        let rc = unsafe { libc::tcdrain(fd) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixListener;

    use super::*;

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("mmalink-tty-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn common_baud_rates_supported() {
        for baud in [1200, 9600, 19200, 57600, 115200, 230400] {
            assert!(SerialPort::supports_baud(baud), "{baud} should be supported");
        }
        assert!(!SerialPort::supports_baud(12345));
        assert!(!SerialPort::supports_baud(0));
    }

    #[test]
    fn open_missing_path_fails() {
        let config = SerialConfig::new("/nonexistent/mmalink/ttyUSB9");
        let result = SerialPort::open(&config);
        assert!(matches!(result, Err(TransportError::Open { .. })));
    }

    #[test]
    fn open_unsupported_baud_fails_before_touching_device() {
        let dir = temp_dir("baud");
        let path = dir.join("not-a-tty");
        std::fs::write(&path, b"").unwrap();

        let config = SerialConfig::new(&path).with_baud_rate(12345);
        let result = SerialPort::open(&config);
        assert!(matches!(result, Err(TransportError::UnsupportedBaud(12345))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_regular_file_fails_configuration() {
        let dir = temp_dir("regular");
        let path = dir.join("plain-file");
        std::fs::write(&path, b"data").unwrap();

        let result = SerialPort::open(&SerialConfig::new(&path));
        assert!(matches!(result, Err(TransportError::Configure { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_socket_path_connects_bridge() {
        let dir = temp_dir("bridge");
        let path = dir.join("mma.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1];
            conn.read_exact(&mut buf).unwrap();
            conn.write_all(&[0x06]).unwrap();
            buf[0]
        });

        let mut stream = SerialPort::open(&SerialConfig::new(&path)).unwrap();
        assert_eq!(SerialPort::transport_name(&path), "unix-socket-bridge");
        stream.write_all(&[0x03]).unwrap();
        stream.flush().unwrap();

        let mut reply = [0u8; 1];
        stream.read_exact(&mut reply).unwrap();
        assert_eq!(reply, [0x06]);
        assert_eq!(server.join().unwrap(), 0x03);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn wait_ready_times_out_on_idle_fd() {
        let (left, _right) = UnixStream::pair().unwrap();
        let err = wait_ready(
            left.as_raw_fd(),
            libc::POLLIN,
            Some(Duration::from_millis(10)),
        )
        .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
    }
}
