//! # Printer Configuration
//!
//! Hardware profiles for ESC/POS receipt printers.
//!
//! ## Supported Printers
//!
//! | Model | Width (dots) | Resolution | Raster band limit |
//! |-------|--------------|------------|-------------------|
//! | Epson TM-T88V | 512 | 180 DPI | 64 KiB |
//! | Generic 58mm | 384 | 203 DPI | 16 KiB |
//! | Generic 80mm | 576 | 203 DPI | 32 KiB |
//!
//! ## Usage
//!
//! ```
//! use snapreceipt::printer::PrinterConfig;
//!
//! let config = PrinterConfig::from(PrinterConfig::TM_T88V);
//! println!("Print width: {} dots ({} bytes)",
//!          config.width_dots,
//!          config.width_bytes());
//! ```

use serde::{Deserialize, Serialize};

/// # Printer Configuration
///
/// Defines the hardware characteristics of a thermal printer.
///
/// - **width_dots**: Printable width in dots; the canvas width for the
///   lifetime of the device
/// - **dpi**: Resolution in dots per inch
/// - **max_band_bytes**: Largest raster payload a single `GS v 0` command may
///   carry; taller canvases are split into several bands
///
/// ## Calculations
///
/// ```text
/// dots_per_mm = dpi / 25.4
/// width_mm = width_dots / dots_per_mm
///
/// For TM-T88V:
///   dots_per_mm = 180 / 25.4 ≈ 7.09
///   width_mm = 512 / 7.09 ≈ 72.2mm
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterConfig {
    /// Printer model name
    pub name: String,

    /// Print width in dots (pixels)
    pub width_dots: u16,

    /// Resolution in dots per inch
    pub dpi: u16,

    /// Maximum raster data bytes per band command
    pub max_band_bytes: usize,
}

impl PrinterConfig {
    /// # Epson TM-T88V
    ///
    /// 80mm paper, 72.2mm printable (512 dots at 180 DPI), auto-cutter.
    pub const TM_T88V: PrinterConfigPreset = PrinterConfigPreset {
        name: "Epson TM-T88V",
        width_dots: 512,
        dpi: 180,
        max_band_bytes: 64 * 1024,
    };

    /// Generic 58mm printer (384 dots at 203 DPI).
    pub const GENERIC_58MM: PrinterConfigPreset = PrinterConfigPreset {
        name: "Generic 58mm",
        width_dots: 384,
        dpi: 203,
        max_band_bytes: 16 * 1024,
    };

    /// Generic 80mm printer (576 dots at 203 DPI).
    pub const GENERIC_80MM: PrinterConfigPreset = PrinterConfigPreset {
        name: "Generic 80mm",
        width_dots: 576,
        dpi: 203,
        max_band_bytes: 32 * 1024,
    };

    /// Look up a preset by short name (`tm-t88v`, `58mm`, `80mm`).
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "tm-t88v" | "tmt88v" | "epson" => Some(Self::TM_T88V.into()),
            "58mm" => Some(Self::GENERIC_58MM.into()),
            "80mm" => Some(Self::GENERIC_80MM.into()),
            _ => None,
        }
    }

    /// Width in bytes of one packed raster row.
    #[inline]
    pub fn width_bytes(&self) -> usize {
        (self.width_dots as usize).div_ceil(8)
    }

    /// Rows that fit in one raster band.
    #[inline]
    pub fn band_rows(&self) -> usize {
        self.max_band_bytes / self.width_bytes().max(1)
    }

    /// Calculate dots per millimeter
    ///
    /// ## Example
    ///
    /// ```
    /// use snapreceipt::printer::PrinterConfig;
    ///
    /// let config = PrinterConfig::from(PrinterConfig::GENERIC_58MM);
    /// assert!((config.dots_per_mm() - 8.0).abs() < 0.1);
    /// ```
    #[inline]
    pub fn dots_per_mm(&self) -> f32 {
        self.dpi as f32 / 25.4
    }

    /// Calculate print width in millimeters
    #[inline]
    pub fn width_mm(&self) -> f32 {
        self.width_dots as f32 / self.dots_per_mm()
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self::TM_T88V.into()
    }
}

/// `const`-friendly form of [`PrinterConfig`] used for the built-in presets.
#[derive(Debug, Clone, Copy)]
pub struct PrinterConfigPreset {
    pub name: &'static str,
    pub width_dots: u16,
    pub dpi: u16,
    pub max_band_bytes: usize,
}

impl From<PrinterConfigPreset> for PrinterConfig {
    fn from(p: PrinterConfigPreset) -> Self {
        Self {
            name: p.name.to_string(),
            width_dots: p.width_dots,
            dpi: p.dpi,
            max_band_bytes: p.max_band_bytes,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tm_t88v_dimensions() {
        let config = PrinterConfig::default();
        assert_eq!(config.width_dots, 512);
        assert_eq!(config.width_bytes(), 64);
        assert_eq!(config.band_rows(), 1024);
    }

    #[test]
    fn test_width_mm() {
        let config = PrinterConfig::default();
        assert!((config.width_mm() - 72.2).abs() < 0.5);
    }

    #[test]
    fn test_presets_by_name() {
        assert_eq!(PrinterConfig::preset("58mm").unwrap().width_dots, 384);
        assert_eq!(PrinterConfig::preset("TM-T88V").unwrap().dpi, 180);
        assert!(PrinterConfig::preset("laser").is_none());
    }
}
