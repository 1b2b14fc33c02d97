//! # QR Encoder
//!
//! Turns the store URL into a square module grid using standard QR data and
//! Reed-Solomon encoding (the `qrcode` crate). The smallest version that
//! holds the payload at the configured error-correction level is chosen.
//!
//! The result is a plain boolean grid; scaling each module to whole printer
//! dots happens in the compositor.
//!
//! ```
//! use snapreceipt::qr::{self, QrLevel};
//!
//! let code = qr::encode("https://example.com", QrLevel::M).unwrap();
//! assert_eq!(code.size() % 4, 1); // 21, 25, 29, ... modules
//! ```

use qrcode::types::QrError as RawQrError;
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};

use crate::error::QrError;

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QrLevel {
    /// ~7% recovery
    L,
    /// ~15% recovery
    #[default]
    M,
    /// ~25% recovery
    Q,
    /// ~30% recovery
    H,
}

impl QrLevel {
    fn ec_level(self) -> EcLevel {
        match self {
            QrLevel::L => EcLevel::L,
            QrLevel::M => EcLevel::M,
            QrLevel::Q => EcLevel::Q,
            QrLevel::H => EcLevel::H,
        }
    }
}

impl std::fmt::Display for QrLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Square module grid; `true` = dark module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrBitmap {
    size: usize,
    modules: Vec<bool>,
}

impl QrBitmap {
    /// Modules per side.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.size && y < self.size && self.modules[y * self.size + x]
    }
}

/// Encoded payload together with its print scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub source: String,
    pub bitmap: QrBitmap,
    /// Dots per module as laid out on the receipt.
    pub module_dots: usize,
}

/// Encode `data` at the given level.
///
/// Fails with [`QrError::PayloadTooLarge`] when no QR version can hold the
/// data and with [`QrError::EmptyPayload`] for an empty string.
pub fn encode(data: &str, level: QrLevel) -> Result<QrBitmap, QrError> {
    if data.is_empty() {
        return Err(QrError::EmptyPayload);
    }

    // Segment modes (numeric, alphanumeric, byte) are chosen by the encoder,
    // so capacity is only known once it has tried.
    let too_large = || QrError::PayloadTooLarge {
        len: data.len(),
        level: level.to_string(),
    };
    let code = QrCode::with_error_correction_level(data, level.ec_level()).map_err(|e| match e {
        RawQrError::DataTooLong => too_large(),
        other => QrError::Encode(other.to_string()),
    })?;

    let size = code.width();
    let modules = code
        .to_colors()
        .into_iter()
        .map(|c| c == Color::Dark)
        .collect();

    Ok(QrBitmap { size, modules })
}
