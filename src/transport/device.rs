//! # Printer Ports
//!
//! A [`PrinterPort`] moves bytes to one physical (or simulated) printer.
//! Ports report *how many* bytes the device accepted, so the transport can
//! tell a clean failure from an ambiguous partial write.
//!
//! ## Available Ports
//!
//! - [`DevicePort`]: character device such as `/dev/usb/lp0` or a serial TTY
//! - [`StreamPort`]: any `Write` (stdout, a capture file)
//! - [`MockPort`](super::mock::MockPort): scripted port for tests
//!
//! ## TTY Configuration
//!
//! Serial devices are switched to raw mode so binary raster data is
//! transmitted unmodified:
//!
//! - **No input processing**: IGNBRK, BRKINT, PARMRK, ISTRIP, INLCR, IGNCR, ICRNL off
//! - **No flow control**: IXON, IXOFF, IXANY off (0x11/0x13 occur in raster data)
//! - **No output processing**: OPOST off (no CR/LF translation)
//! - **8-bit characters**: CS8, no parity
//! - **No echo, non-canonical**: ECHO, ECHONL, ICANON, ISIG, IEXTEN off
//!
//! ## Non-blocking Writes
//!
//! The device is opened with `O_NONBLOCK`; a write that would block waits in
//! `poll(2)` until the device drains or the write timeout expires. A stalled
//! printer therefore surfaces as a transient fault instead of hanging the
//! kiosk.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::DeviceFault;
use crate::protocol::commands::{self, StatusRequest};

/// How long to wait for a `DLE EOT` reply.
pub const STATUS_TIMEOUT: Duration = Duration::from_millis(300);

/// Byte sink for one printer.
pub trait PrinterPort: Send {
    /// Hand bytes to the device, waiting up to `timeout` for it to accept
    /// at least one. Returns the number accepted (always > 0 on success).
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize, DeviceFault>;

    /// Push buffered bytes to the device.
    fn flush(&mut self) -> Result<(), DeviceFault>;

    /// Send `DLE EOT n` and read the reply byte. `Ok(None)` when the device
    /// does not answer.
    ///
    /// A fault after part of the query reached the device must be passed
    /// through [`interrupted_query`].
    fn query_status(&mut self, request: StatusRequest) -> Result<Option<u8>, DeviceFault>;

    /// Drop any handle and open the device again.
    fn reconnect(&mut self) -> Result<(), DeviceFault>;

    /// Human-readable name for logs.
    fn describe(&self) -> String;
}

/// Classify a fault hit while writing a `DLE EOT` query.
///
/// Once `sent > 0` the printer holds an unfinished command that would swallow
/// the first bytes of whatever comes next, so a transient fault is no longer
/// safe to retry and is reported as recoverable. Fatal faults stay fatal.
pub fn interrupted_query(sent: usize, fault: DeviceFault) -> DeviceFault {
    match fault {
        DeviceFault::Transient(reason) if sent > 0 => DeviceFault::Recoverable(format!(
            "status query interrupted after {} byte(s): {}",
            sent, reason
        )),
        other => other,
    }
}

impl PrinterPort for Box<dyn PrinterPort> {
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize, DeviceFault> {
        (**self).write(data, timeout)
    }

    fn flush(&mut self) -> Result<(), DeviceFault> {
        (**self).flush()
    }

    fn query_status(&mut self, request: StatusRequest) -> Result<Option<u8>, DeviceFault> {
        (**self).query_status(request)
    }

    fn reconnect(&mut self) -> Result<(), DeviceFault> {
        (**self).reconnect()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// ============================================================================
// DEVICE PORT
// ============================================================================

/// # Character Device Port
///
/// ## Example
///
/// ```no_run
/// use std::time::Duration;
/// use snapreceipt::transport::device::{DevicePort, PrinterPort};
/// use snapreceipt::protocol::commands;
///
/// let mut port = DevicePort::open("/dev/usb/lp0")?;
/// port.write(&commands::init(), Duration::from_secs(1))?;
/// # Ok::<(), snapreceipt::error::DeviceFault>(())
/// ```
pub struct DevicePort {
    path: PathBuf,
    file: Option<File>,
}

impl DevicePort {
    /// A port for `path` that is not opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    /// Open the device immediately.
    ///
    /// ## Errors
    ///
    /// - Missing device: [`DeviceFault::Fatal`]
    /// - Device busy (held by another process): [`DeviceFault::Transient`]
    /// - Permission denied: [`DeviceFault::Recoverable`] (fix the udev rule
    ///   or group membership; the kiosk keeps running)
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeviceFault> {
        let mut port = Self::new(path.as_ref());
        port.reconnect()?;
        Ok(port)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn file(&mut self) -> Result<&mut File, DeviceFault> {
        self.file
            .as_mut()
            .ok_or_else(|| DeviceFault::Fatal(format!("{} is not open", self.path.display())))
    }

    /// Drop the handle after a fault that means the device went away.
    fn close_if_fatal(&mut self, fault: DeviceFault) -> DeviceFault {
        if matches!(fault, DeviceFault::Fatal(_)) {
            self.file = None;
        }
        fault
    }
}

impl PrinterPort for DevicePort {
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize, DeviceFault> {
        if data.is_empty() {
            return Ok(0);
        }
        let deadline = Instant::now() + timeout;
        let file = self.file()?;
        let fd = file.as_raw_fd();

        let result = loop {
            match file.write(data) {
                Ok(0) => break Err(DeviceFault::Transient("device accepted no data".into())),
                Ok(n) => break Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break Err(DeviceFault::Transient(format!(
                            "device did not accept data within {} ms",
                            timeout.as_millis()
                        )));
                    }
                    if let Err(fault) = wait_fd(fd, libc::POLLOUT, remaining) {
                        break Err(fault);
                    }
                }
                Err(e) => break Err(DeviceFault::from_io("write", &e)),
            }
        };

        result.map_err(|fault| self.close_if_fatal(fault))
    }

    fn flush(&mut self) -> Result<(), DeviceFault> {
        let result = self
            .file()?
            .flush()
            .map_err(|e| DeviceFault::from_io("flush", &e));
        result.map_err(|fault| self.close_if_fatal(fault))
    }

    fn query_status(&mut self, request: StatusRequest) -> Result<Option<u8>, DeviceFault> {
        let query = commands::status_query(request);
        let mut sent = 0;
        while sent < query.len() {
            match self.write(&query[sent..], STATUS_TIMEOUT) {
                Ok(n) => sent += n,
                Err(fault) => return Err(interrupted_query(sent, fault)),
            }
        }

        let file = self.file()?;
        let fd = file.as_raw_fd();
        let deadline = Instant::now() + STATUS_TIMEOUT;
        let mut reply = [0u8; 1];

        loop {
            match file.read(&mut reply) {
                Ok(1) => return Ok(Some(reply[0])),
                Ok(_) => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(None);
                    }
                    wait_fd(fd, libc::POLLIN, remaining)?;
                }
                // Write-only devices (some USB printer class drivers) cannot report status.
                Err(e) if e.raw_os_error() == Some(libc::EBADF) => return Ok(None),
                Err(e) => {
                    let fault = DeviceFault::from_io("status read", &e);
                    return Err(self.close_if_fatal(fault));
                }
            }
        }
    }

    fn reconnect(&mut self) -> Result<(), DeviceFault> {
        self.file = None;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(&self.path)
            .or_else(|_| {
                OpenOptions::new()
                    .write(true)
                    .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
                    .open(&self.path)
            })
            .map_err(|e| DeviceFault::from_io(&format!("open {}", self.path.display()), &e))?;

        let fd = file.as_raw_fd();
        if unsafe { libc::isatty(fd) } == 1 {
            configure_tty_raw(fd)?;
            debug!(device = %self.path.display(), "configured TTY raw mode");
        }

        info!(device = %self.path.display(), "printer device opened");
        self.file = Some(file);
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Block in `poll(2)` until `fd` is ready for `events` or `timeout` passes.
///
/// A hang-up or error condition on the descriptor means the device is gone.
fn wait_fd(fd: i32, events: libc::c_short, timeout: Duration) -> Result<(), DeviceFault> {
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    let ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

    let rc = unsafe { libc::poll(&mut pfd, 1, ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(());
        }
        return Err(DeviceFault::from_io("poll", &err));
    }
    if pfd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0 {
        return Err(DeviceFault::Fatal("device hung up".into()));
    }
    Ok(())
}

/// Configure a file descriptor for raw TTY mode.
///
/// See the module docs for the flags that are cleared.
fn configure_tty_raw(fd: i32) -> Result<(), DeviceFault> {
    use std::mem::MaybeUninit;

    let mut termios = MaybeUninit::uninit();
    let result = unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) };
    if result != 0 {
        return Err(DeviceFault::from_io("tcgetattr", &io::Error::last_os_error()));
    }
    let mut termios = unsafe { termios.assume_init() };

    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);

    termios.c_oflag &= !libc::OPOST;

    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);

    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    // Non-blocking reads: return immediately with whatever is available.
    termios.c_cc[libc::VMIN] = 0;
    termios.c_cc[libc::VTIME] = 0;

    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) };
    if result != 0 {
        return Err(DeviceFault::from_io("tcsetattr", &io::Error::last_os_error()));
    }

    Ok(())
}

// ============================================================================
// STREAM PORT
// ============================================================================

/// Writes the job to any [`Write`] sink, e.g. stdout or a capture file.
///
/// Streams never report printer status.
pub struct StreamPort<W: Write + Send> {
    name: String,
    writer: W,
}

impl<W: Write + Send> StreamPort<W> {
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl StreamPort<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new("stdout", io::stdout())
    }
}

impl<W: Write + Send> PrinterPort for StreamPort<W> {
    fn write(&mut self, data: &[u8], _timeout: Duration) -> Result<usize, DeviceFault> {
        loop {
            match self.writer.write(data) {
                Ok(0) if !data.is_empty() => {
                    return Err(DeviceFault::Fatal(format!("{} is closed", self.name)));
                }
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DeviceFault::from_io(&self.name, &e)),
            }
        }
    }

    fn flush(&mut self) -> Result<(), DeviceFault> {
        self.writer
            .flush()
            .map_err(|e| DeviceFault::from_io(&self.name, &e))
    }

    fn query_status(&mut self, _request: StatusRequest) -> Result<Option<u8>, DeviceFault> {
        Ok(None)
    }

    fn reconnect(&mut self) -> Result<(), DeviceFault> {
        Ok(())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_port_collects_bytes() {
        let mut port = StreamPort::new("buffer", Vec::new());
        let n = port.write(&[1, 2, 3], Duration::from_millis(10)).unwrap();
        assert_eq!(n, 3);
        port.flush().unwrap();
        assert_eq!(port.query_status(StatusRequest::Printer).unwrap(), None);
        assert_eq!(port.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn test_interrupted_query_classification() {
        let busy = || DeviceFault::Transient("busy".into());
        assert_eq!(interrupted_query(0, busy()), busy());
        assert!(matches!(interrupted_query(2, busy()), DeviceFault::Recoverable(ref m) if m.contains("2 byte")));
        assert_eq!(
            interrupted_query(1, DeviceFault::Fatal("gone".into())),
            DeviceFault::Fatal("gone".into())
        );
    }

    #[test]
    fn test_missing_device_is_fatal() {
        let result = DevicePort::open("/dev/snapreceipt-no-such-printer");
        assert!(matches!(result, Err(DeviceFault::Fatal(_))));
    }

    #[test]
    fn test_unopened_device_write_is_fatal() {
        let mut port = DevicePort::new("/dev/null");
        assert!(matches!(
            port.write(&[0], Duration::from_millis(1)),
            Err(DeviceFault::Fatal(_))
        ));
    }

    #[test]
    fn test_device_port_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.bin");
        std::fs::write(&path, b"").unwrap();

        let mut port = DevicePort::open(&path).unwrap();
        assert!(port.is_open());
        let n = port.write(&[0x1B, 0x40], Duration::from_millis(100)).unwrap();
        assert_eq!(n, 2);
        port.flush().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x1B, 0x40]);
    }
}
