//! # Printer Module
//!
//! Printer-specific hardware descriptions.
//!
//! - [`config`]: Printer hardware profiles and presets

pub mod config;

pub use config::PrinterConfig;
