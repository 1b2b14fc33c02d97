//! # Real-time Printer Status
//!
//! Interprets the single-byte replies to `DLE EOT n`.
//!
//! ## Status Bytes
//!
//! Every reply has bits 1 and 4 set and bits 0 and 7 clear; anything else
//! is not a status byte.
//!
//! | Request | Bit | Meaning |
//! |---------|-----|---------|
//! | n=1 printer | 3 | Offline |
//! | n=1 printer | 5 | Waiting for online recovery |
//! | n=2 offline cause | 2 | Cover open |
//! | n=2 offline cause | 3 | Paper being fed by the FEED button |
//! | n=2 offline cause | 5 | Printing stopped by paper end |
//! | n=4 paper sensor | 5, 6 | Roll paper end |

use serde::Serialize;

use crate::error::DeviceFault;

const FIXED_MASK: u8 = 0b1001_0011;
const FIXED_BITS: u8 = 0b0001_0010;

const PRINTER_OFFLINE: u8 = 0x08;
const PRINTER_RECOVERY_WAIT: u8 = 0x20;
const CAUSE_COVER_OPEN: u8 = 0x04;
const CAUSE_FEED_BUTTON: u8 = 0x08;
const CAUSE_PAPER_END: u8 = 0x20;
const SENSOR_PAPER_END: u8 = 0x60;

/// Coarse printer state as seen before a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrinterStatus {
    Ready,
    Busy,
    PaperOut,
    CoverOpen,
    Offline,
    /// The device did not answer (common for plain USB line printers).
    Unknown,
}

/// Whether `byte` has the fixed bit pattern of a status reply.
#[inline]
pub fn is_status_byte(byte: u8) -> bool {
    byte & FIXED_MASK == FIXED_BITS
}

impl PrinterStatus {
    /// Combine the replies to `DLE EOT 1`, `2` and `4`.
    ///
    /// ```
    /// use snapreceipt::transport::status::PrinterStatus;
    ///
    /// assert_eq!(PrinterStatus::from_replies(Some(0x12), None, Some(0x12)), PrinterStatus::Ready);
    /// assert_eq!(PrinterStatus::from_replies(Some(0x12), None, Some(0x72)), PrinterStatus::PaperOut);
    /// assert_eq!(PrinterStatus::from_replies(None, None, None), PrinterStatus::Unknown);
    /// ```
    pub fn from_replies(printer: Option<u8>, offline_cause: Option<u8>, paper: Option<u8>) -> Self {
        let Some(printer) = printer.filter(|&b| is_status_byte(b)) else {
            return PrinterStatus::Unknown;
        };
        let cause = offline_cause.filter(|&b| is_status_byte(b));
        let paper = paper.filter(|&b| is_status_byte(b));

        if paper.is_some_and(|p| p & SENSOR_PAPER_END != 0) {
            return PrinterStatus::PaperOut;
        }

        if printer & PRINTER_OFFLINE != 0 {
            return match cause {
                Some(c) if c & CAUSE_COVER_OPEN != 0 => PrinterStatus::CoverOpen,
                Some(c) if c & CAUSE_PAPER_END != 0 => PrinterStatus::PaperOut,
                Some(c) if c & CAUSE_FEED_BUTTON != 0 => PrinterStatus::Busy,
                _ => PrinterStatus::Offline,
            };
        }

        if printer & PRINTER_RECOVERY_WAIT != 0 {
            return PrinterStatus::Busy;
        }
        PrinterStatus::Ready
    }

    /// Status bytes a device in this state would report, in request order
    /// 1, 2, 4. Used by simulated ports.
    pub fn to_replies(self) -> [Option<u8>; 3] {
        match self {
            PrinterStatus::Ready => [Some(0x12), Some(0x12), Some(0x12)],
            PrinterStatus::Busy => [Some(0x12 | PRINTER_RECOVERY_WAIT), Some(0x12), Some(0x12)],
            PrinterStatus::PaperOut => [
                Some(0x12 | PRINTER_OFFLINE),
                Some(0x12 | CAUSE_PAPER_END),
                Some(0x12 | SENSOR_PAPER_END),
            ],
            PrinterStatus::CoverOpen => [
                Some(0x12 | PRINTER_OFFLINE),
                Some(0x12 | CAUSE_COVER_OPEN),
                Some(0x12),
            ],
            PrinterStatus::Offline => [Some(0x12 | PRINTER_OFFLINE), Some(0x12), Some(0x12)],
            PrinterStatus::Unknown => [None, None, None],
        }
    }

    /// Fault that blocks printing in this state, if any.
    pub fn fault(self) -> Option<DeviceFault> {
        match self {
            PrinterStatus::Ready | PrinterStatus::Unknown => None,
            PrinterStatus::Busy => Some(DeviceFault::Transient("printer busy".into())),
            PrinterStatus::PaperOut => Some(DeviceFault::Recoverable("paper out".into())),
            PrinterStatus::CoverOpen => Some(DeviceFault::Recoverable("cover open".into())),
            PrinterStatus::Offline => Some(DeviceFault::Fatal("printer offline".into())),
        }
    }
}

impl std::fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_bits() {
        assert!(is_status_byte(0x12));
        assert!(is_status_byte(0x1A));
        assert!(!is_status_byte(0x00));
        assert!(!is_status_byte(0x93));
    }

    #[test]
    fn test_offline_causes() {
        assert_eq!(
            PrinterStatus::from_replies(Some(0x1A), Some(0x16), None),
            PrinterStatus::CoverOpen
        );
        assert_eq!(
            PrinterStatus::from_replies(Some(0x1A), Some(0x32), None),
            PrinterStatus::PaperOut
        );
        assert_eq!(
            PrinterStatus::from_replies(Some(0x1A), Some(0x1A), None),
            PrinterStatus::Busy
        );
        assert_eq!(PrinterStatus::from_replies(Some(0x1A), None, None), PrinterStatus::Offline);
    }

    #[test]
    fn test_garbage_reply_is_unknown() {
        assert_eq!(PrinterStatus::from_replies(Some(0xFF), None, None), PrinterStatus::Unknown);
    }

    #[test]
    fn test_replies_round_trip() {
        for status in [
            PrinterStatus::Ready,
            PrinterStatus::Busy,
            PrinterStatus::PaperOut,
            PrinterStatus::CoverOpen,
            PrinterStatus::Offline,
            PrinterStatus::Unknown,
        ] {
            let [p, c, s] = status.to_replies();
            assert_eq!(PrinterStatus::from_replies(p, c, s), status);
        }
    }

    #[test]
    fn test_fault_classes() {
        assert!(PrinterStatus::Ready.fault().is_none());
        assert!(PrinterStatus::Unknown.fault().is_none());
        assert!(matches!(PrinterStatus::Busy.fault(), Some(DeviceFault::Transient(_))));
        assert!(matches!(PrinterStatus::CoverOpen.fault(), Some(DeviceFault::Recoverable(_))));
        assert!(matches!(PrinterStatus::Offline.fault(), Some(DeviceFault::Fatal(_))));
    }
}
