//! # SnapReceipt - Photo Receipt Kiosk
//!
//! SnapReceipt turns a camera frame into a printed receipt on an ESC/POS
//! thermal printer. It provides:
//!
//! - **Session control**: Idle → Countdown → Capturing → Processing → Printing
//! - **Exposure correction**: Gain from face luminance
//! - **Layout**: Store header, dithered photo, footer and QR code
//! - **Protocol implementation**: ESC/POS raster encoder and decoder
//! - **Transport**: Character devices with retry and fault classification
//!
//! ## Quick Start
//!
//! ```no_run
//! use snapreceipt::{
//!     config::Settings,
//!     frame::NoFaces,
//!     pipeline,
//!     transport::{DevicePort, PrintTransport},
//! };
//!
//! let settings = Settings::default();
//!
//! // Frame in, print job out
//! let processed = pipeline::process_file("photo.jpg".as_ref(), &NoFaces, &settings)?;
//!
//! // Send to printer
//! let port = DevicePort::new("/dev/usb/lp0");
//! let mut transport = PrintTransport::new(Box::new(port), &settings.transport);
//! transport.send(&processed.job)?;
//!
//! # Ok::<(), snapreceipt::KioskError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`session`] | Kiosk state machine |
//! | [`pipeline`] | Frame → print job |
//! | [`exposure`] | Brightness estimator |
//! | [`qr`] | QR encoder |
//! | [`render`] | Canvas, dithering, text and compositor |
//! | [`protocol`] | ESC/POS command builders and decoder |
//! | [`transport`] | Printer ports and retry policy |
//! | [`frame`] | Frames, camera sources and face locators |
//! | [`runtime`] | Async kiosk loop |
//! | [`config`] | Settings |
//! | [`printer`] | Printer hardware presets |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Tested against the Epson TM-T88V (80mm paper, 180 DPI, 512 dots).
//! Other printers that accept `GS v 0` raster graphics should work with a
//! matching [`PrinterConfig`].

pub mod config;
pub mod error;
pub mod exposure;
pub mod frame;
pub mod pipeline;
pub mod printer;
pub mod protocol;
pub mod qr;
pub mod render;
pub mod runtime;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use config::Settings;
pub use error::{ErrorKind, KioskError};
pub use printer::PrinterConfig;
pub use session::Controller;
pub use transport::PrintTransport;
