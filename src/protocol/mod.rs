//! # ESC/POS Print Codec
//!
//! Low-level builders for the ESC/POS byte stream that Epson-compatible
//! thermal receipt printers accept, plus a decoder for the same subset.
//!
//! ## Module Structure
//!
//! - [`commands`]: Init, feed, cut and real-time status commands
//! - [`raster`]: `GS v 0` raster bands and complete [`PrintJob`]s
//! - [`decode`]: Parse a job back into a canvas
//!
//! ## Usage Example
//!
//! ```
//! use snapreceipt::config::CodecSettings;
//! use snapreceipt::printer::PrinterConfig;
//! use snapreceipt::protocol::{decode, raster};
//! use snapreceipt::render::MonochromeCanvas;
//!
//! let mut canvas = MonochromeCanvas::new(512, 48);
//! canvas.fill_rect(0, 0, 512, 8);
//!
//! let job = raster::encode(&canvas, &PrinterConfig::default(), &CodecSettings::default()).unwrap();
//! assert_eq!(&job.as_bytes()[..2], &[0x1B, 0x40]);
//!
//! let decoded = decode::decode(job.as_bytes()).unwrap();
//! assert_eq!(decoded.canvas, Some(canvas));
//! ```
//!
//! ## Protocol Reference
//!
//! Command layouts follow the Epson "ESC/POS Application Programming Guide"
//! for the TM-T88 series.

pub mod commands;
pub mod decode;
pub mod raster;

pub use commands::CutMode;
pub use raster::PrintJob;
