//! # ESC/POS Commands
//!
//! Command builders for the subset of ESC/POS the kiosk sends: reset,
//! paper feed, cutter and real-time status. Raster graphics live in
//! [`raster`](super::raster).
//!
//! ## Escape Sequence Structure
//!
//! Commands follow these patterns:
//! - Two bytes: `ESC @`
//! - With parameters: `ESC d n`, `GS V m`, `DLE EOT n`
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 0x1234 is sent as bytes `[0x34, 0x12]`

use serde::{Deserialize, Serialize};

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix
///
/// Used for graphics (`GS v 0`) and the cutter (`GS V`).
pub const GS: u8 = 0x1D;

/// DLE (Data Link Escape) - Real-time command prefix
///
/// `DLE EOT` is processed as soon as it is received, even while the printer
/// is busy or offline.
pub const DLE: u8 = 0x10;

/// EOT (End of Transmission) - second byte of the status request
pub const EOT: u8 = 0x04;

// ============================================================================
// INITIALIZATION COMMANDS
// ============================================================================

/// # Initialize Printer (ESC @)
///
/// Clears the print buffer and resets modes to their power-on defaults.
/// Sent at the start of every job so a previous, interrupted job cannot
/// leave the printer mid-command.
///
/// ## Protocol Details
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
/// | Decimal | 27 64 |
///
/// ## Example
///
/// ```
/// use snapreceipt::protocol::commands;
///
/// assert_eq!(commands::init(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

// ============================================================================
// PAPER FEED
// ============================================================================

/// # Print and Feed n Lines (ESC d n)
///
/// | Format  | Bytes      |
/// |---------|------------|
/// | ASCII   | ESC d n    |
/// | Hex     | 1B 64 n    |
///
/// Moves the last printed row past the cutter blade. On an 80mm Epson the
/// blade sits roughly five default lines above the print head.
#[inline]
pub fn feed_lines(n: u8) -> Vec<u8> {
    vec![ESC, b'd', n]
}

// ============================================================================
// CUTTER CONTROL
// ============================================================================

/// Cutter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutMode {
    /// Cut the paper completely
    #[default]
    Full,
    /// Leave a small hinge so the receipt hangs from the printer
    Partial,
}

/// # Cut Paper (GS V m)
///
/// | Mode    | Bytes    |
/// |---------|----------|
/// | Full    | 1D 56 00 |
/// | Partial | 1D 56 01 |
///
/// ## Example
///
/// ```
/// use snapreceipt::protocol::commands::{self, CutMode};
///
/// assert_eq!(commands::cut(CutMode::Partial), vec![0x1D, 0x56, 0x01]);
/// ```
#[inline]
pub fn cut(mode: CutMode) -> Vec<u8> {
    let m = match mode {
        CutMode::Full => 0,
        CutMode::Partial => 1,
    };
    vec![GS, b'V', m]
}

// ============================================================================
// REAL-TIME STATUS
// ============================================================================

/// Which status byte `DLE EOT n` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusRequest {
    /// n = 1: printer status (bit 3 = offline)
    Printer = 1,
    /// n = 2: offline cause (bit 2 = cover open, bit 5 = paper end stop)
    OfflineCause = 2,
    /// n = 3: error cause
    ErrorCause = 3,
    /// n = 4: roll paper sensor (bits 5/6 = paper end)
    PaperSensor = 4,
}

/// # Transmit Real-time Status (DLE EOT n)
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | DLE EOT n |
/// | Hex     | 10 04 n  |
///
/// The printer answers with a single status byte. Fixed bits (1 and 4 set,
/// 0 and 7 clear) identify a genuine status reply.
#[inline]
pub fn status_query(request: StatusRequest) -> Vec<u8> {
    vec![DLE, EOT, request as u8]
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Convert a u16 to little-endian bytes (low byte first).
///
/// ```
/// use snapreceipt::protocol::commands::u16_le;
///
/// assert_eq!(u16_le(0x1234), [0x34, 0x12]);
/// ```
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert_eq!(init(), vec![0x1B, 0x40]);
    }

    #[test]
    fn test_feed_lines() {
        assert_eq!(feed_lines(0), vec![0x1B, 0x64, 0x00]);
        assert_eq!(feed_lines(6), vec![0x1B, 0x64, 0x06]);
    }

    #[test]
    fn test_cut() {
        assert_eq!(cut(CutMode::Full), vec![0x1D, 0x56, 0x00]);
        assert_eq!(cut(CutMode::Partial), vec![0x1D, 0x56, 0x01]);
    }

    #[test]
    fn test_status_query() {
        assert_eq!(status_query(StatusRequest::Printer), vec![0x10, 0x04, 0x01]);
        assert_eq!(status_query(StatusRequest::PaperSensor), vec![0x10, 0x04, 0x04]);
    }

    #[test]
    fn test_u16_le() {
        assert_eq!(u16_le(0), [0, 0]);
        assert_eq!(u16_le(512), [0x00, 0x02]);
        assert_eq!(u16_le(0xFFFF), [0xFF, 0xFF]);
    }
}
