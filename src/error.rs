//! # Error Types
//!
//! Each pipeline stage has its own error enum so callers can match on the
//! precise failure. [`KioskError`] wraps all of them for the binary and for
//! the session controller, and [`ErrorKind`] is the flat classification the
//! controller records as a session outcome.

use std::fmt;

use thiserror::Error;

/// Flat failure classification reported to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorKind {
    /// No frame arrived within the capture timeout.
    CaptureError,
    /// QR payload does not fit at the configured error-correction level.
    PayloadTooLarge,
    /// Composited receipt is taller than the configured maximum.
    LayoutOverflow,
    /// Canvas dimensions cannot be framed as printer commands.
    ProtocolEncodeError,
    /// Busy device or stalled I/O. Retried inside the transport; once the
    /// budget is spent it is reported as `RecoverableDeviceError`.
    TransientDeviceError,
    /// Paper out, cover open, or an ambiguous partial write.
    RecoverableDeviceError,
    /// Device missing or offline.
    FatalDeviceError,
    /// Anything that does not fit the taxonomy above (bad input file, config).
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::CaptureError => "CaptureError",
            ErrorKind::PayloadTooLarge => "PayloadTooLarge",
            ErrorKind::LayoutOverflow => "LayoutOverflow",
            ErrorKind::ProtocolEncodeError => "ProtocolEncodeError",
            ErrorKind::TransientDeviceError => "TransientDeviceError",
            ErrorKind::RecoverableDeviceError => "RecoverableDeviceError",
            ErrorKind::FatalDeviceError => "FatalDeviceError",
            ErrorKind::Other => "Other",
        };
        f.write_str(name)
    }
}

/// QR encoding failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QrError {
    #[error("QR payload of {len} bytes does not fit at error correction level {level}")]
    PayloadTooLarge { len: usize, level: String },

    #[error("QR payload is empty")]
    EmptyPayload,

    #[error("QR encoding failed: {0}")]
    Encode(String),
}

/// Compositor failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("receipt height {height} exceeds maximum of {max} dots")]
    Overflow { height: usize, max: usize },

    #[error("QR code of {modules} modules cannot fit in {width} dots")]
    QrTooWide { modules: usize, width: usize },

    #[error("frame has no pixels")]
    EmptyFrame,
}

/// Print codec failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("canvas has zero size ({width}x{height})")]
    EmptyCanvas { width: usize, height: usize },

    #[error("canvas width of {width_bytes} bytes exceeds the raster field limit")]
    TooWide { width_bytes: usize },

    #[error("band limit of {max_bytes} bytes cannot hold a single {width_bytes}-byte row")]
    BandTooSmall { max_bytes: usize, width_bytes: usize },

    #[error("malformed print stream at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
}

/// Classified printer device failure.
///
/// The classification drives the retry policy in
/// [`PrintTransport`](crate::transport::PrintTransport).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceFault {
    /// Busy or temporarily stalled; safe to retry while nothing was accepted.
    #[error("device busy: {0}")]
    Transient(String),

    /// Terminal for the current job but not for the device (paper out, cover open).
    #[error("device needs attention: {0}")]
    Recoverable(String),

    /// Device unreachable; printing disabled until it reappears.
    #[error("device unavailable: {0}")]
    Fatal(String),
}

impl DeviceFault {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceFault::Transient(_) => ErrorKind::TransientDeviceError,
            DeviceFault::Recoverable(_) => ErrorKind::RecoverableDeviceError,
            DeviceFault::Fatal(_) => ErrorKind::FatalDeviceError,
        }
    }

    /// Classify an I/O error raised by the device handle.
    pub fn from_io(context: &str, err: &std::io::Error) -> Self {
        use std::io::ErrorKind as Io;

        let msg = format!("{}: {}", context, err);
        match err.kind() {
            Io::WouldBlock | Io::TimedOut | Io::Interrupted => DeviceFault::Transient(msg),
            Io::NotFound | Io::BrokenPipe | Io::NotConnected | Io::ConnectionReset => {
                DeviceFault::Fatal(msg)
            }
            _ => match err.raw_os_error() {
                Some(libc::EBUSY) | Some(libc::EAGAIN) => DeviceFault::Transient(msg),
                Some(libc::ENODEV) | Some(libc::ENXIO) | Some(libc::ENOENT) => {
                    DeviceFault::Fatal(msg)
                }
                _ => DeviceFault::Recoverable(msg),
            },
        }
    }
}

/// Frame capture failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no frame within {0} ms")]
    Timeout(u128),

    #[error("camera source failed: {0}")]
    Source(String),
}

/// Settings validation and loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-level error type.
#[derive(Debug, Error)]
pub enum KioskError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("QR error: {0}")]
    Qr(#[from] QrError),

    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("printer error: {0}")]
    Device(#[from] DeviceFault),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Image decoding or saving
    #[error("image error: {0}")]
    Image(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KioskError {
    /// Classification recorded in the session outcome.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KioskError::Capture(_) => ErrorKind::CaptureError,
            KioskError::Qr(QrError::PayloadTooLarge { .. }) => ErrorKind::PayloadTooLarge,
            KioskError::Qr(_) => ErrorKind::Other,
            KioskError::Layout(_) => ErrorKind::LayoutOverflow,
            KioskError::Encode(_) => ErrorKind::ProtocolEncodeError,
            KioskError::Device(fault) => fault.kind(),
            KioskError::Config(_) | KioskError::Image(_) | KioskError::Io(_) => ErrorKind::Other,
        }
    }
}

impl From<image::ImageError> for KioskError {
    fn from(err: image::ImageError) -> Self {
        KioskError::Image(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_classification() {
        let busy = io::Error::from_raw_os_error(libc::EBUSY);
        assert!(matches!(
            DeviceFault::from_io("write", &busy),
            DeviceFault::Transient(_)
        ));

        let gone = io::Error::from_raw_os_error(libc::ENODEV);
        assert!(matches!(
            DeviceFault::from_io("write", &gone),
            DeviceFault::Fatal(_)
        ));

        let missing = io::Error::new(io::ErrorKind::NotFound, "no such device");
        assert!(matches!(
            DeviceFault::from_io("open", &missing),
            DeviceFault::Fatal(_)
        ));

        let stalled = io::Error::new(io::ErrorKind::TimedOut, "stalled");
        assert!(matches!(
            DeviceFault::from_io("write", &stalled),
            DeviceFault::Transient(_)
        ));
    }

    #[test]
    fn test_kind_mapping() {
        let err = KioskError::Qr(QrError::PayloadTooLarge {
            len: 5000,
            level: "H".into(),
        });
        assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);

        let err = KioskError::Layout(LayoutError::Overflow {
            height: 9000,
            max: 4000,
        });
        assert_eq!(err.kind(), ErrorKind::LayoutOverflow);

        let err = KioskError::Device(DeviceFault::Recoverable("paper out".into()));
        assert_eq!(err.kind(), ErrorKind::RecoverableDeviceError);
    }
}
