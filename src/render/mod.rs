//! # Rendering Module
//!
//! Everything between a camera frame and a 1-bit receipt image.
//!
//! ## Modules
//!
//! - [`canvas`]: Packed 1-bit canvas in printer byte order
//! - [`dither`]: Bayer, Floyd-Steinberg, Atkinson and threshold dithering
//! - [`font`]: Spleen bitmap text and dotted rules
//! - [`compositor`]: Receipt layout (header, photo, footer, QR code)
//!
//! ## Usage Example
//!
//! ```
//! use snapreceipt::render::canvas::MonochromeCanvas;
//! use snapreceipt::render::font::{self, TextLine};
//!
//! let mut receipt = MonochromeCanvas::new(384, 0);
//! receipt.append(&font::render_lines(&[TextLine::new("Hello").scale(2)], 384));
//! receipt.append_blank(12);
//!
//! assert_eq!(receipt.width(), 384);
//! assert_eq!(receipt.height(), 48 + 12);
//! ```

pub mod canvas;
pub mod compositor;
pub mod dither;
pub mod font;

pub use canvas::MonochromeCanvas;
