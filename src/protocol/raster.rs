//! # Raster Graphics and Print Jobs
//!
//! Frames a [`MonochromeCanvas`] as an ESC/POS byte stream.
//!
//! ## Print Raster Bit Image (GS v 0)
//!
//! | Format | Bytes |
//! |--------|-------|
//! | ASCII  | GS v 0 m xL xH yL yH d1...dk |
//! | Hex    | 1D 76 30 m xL xH yL yH d1...dk |
//!
//! - `m`: scaling mode, always 0 (normal density)
//! - `xL xH`: width in **bytes**, little-endian
//! - `yL yH`: height in **rows**, little-endian
//! - `d1...dk`: `k = width_bytes * rows` bytes, row-major, MSB = leftmost dot
//!
//! Printers bound the data one command may carry, so tall receipts are sent
//! as several consecutive bands. Each band is a complete, self-describing
//! command; the printer stitches them without gaps.
//!
//! ## Job Layout
//!
//! ```text
//! ESC @                      initialize
//! GS v 0 ... (band 1)
//! GS v 0 ... (band 2)
//! ...
//! ESC d n                    feed past the cutter
//! GS V m                     cut
//! ```

use uuid::Uuid;

use super::commands::{self, GS, u16_le};
use crate::config::CodecSettings;
use crate::error::EncodeError;
use crate::printer::PrinterConfig;
use crate::render::MonochromeCanvas;

/// Bytes in a `GS v 0` header.
pub const RASTER_HEADER_LEN: usize = 8;

/// Build one `GS v 0` command.
///
/// ## Example
///
/// ```
/// use snapreceipt::protocol::raster;
///
/// let cmd = raster::raster_band(2, 1, &[0xFF, 0x00]);
/// assert_eq!(cmd, vec![0x1D, 0x76, 0x30, 0x00, 2, 0, 1, 0, 0xFF, 0x00]);
/// ```
pub fn raster_band(width_bytes: u16, rows: u16, data: &[u8]) -> Vec<u8> {
    debug_assert_eq!(
        data.len(),
        width_bytes as usize * rows as usize,
        "raster data length mismatch"
    );

    let mut cmd = Vec::with_capacity(RASTER_HEADER_LEN + data.len());
    cmd.extend([GS, b'v', b'0', 0]);
    cmd.extend(u16_le(width_bytes));
    cmd.extend(u16_le(rows));
    cmd.extend_from_slice(data);
    cmd
}

/// Rows per band for a canvas of `width_bytes` under `max_band_bytes`.
pub fn band_rows(width_bytes: usize, max_band_bytes: usize) -> Result<usize, EncodeError> {
    let rows = (max_band_bytes / width_bytes.max(1)).min(u16::MAX as usize);
    if rows == 0 {
        return Err(EncodeError::BandTooSmall {
            max_bytes: max_band_bytes,
            width_bytes,
        });
    }
    Ok(rows)
}

/// Immutable, fully framed byte stream for one receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    id: Uuid,
    bytes: Vec<u8>,
    rows: usize,
    bands: usize,
}

impl PrintJob {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raster rows in the job.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of `GS v 0` commands.
    pub fn bands(&self) -> usize {
        self.bands
    }
}

/// Encode a canvas into a print job.
///
/// Fails for zero-size canvases, canvases wider than the printer head, or
/// a band limit smaller than one row.
pub fn encode(
    canvas: &MonochromeCanvas,
    printer: &PrinterConfig,
    codec: &CodecSettings,
) -> Result<PrintJob, EncodeError> {
    if canvas.width() == 0 || canvas.height() == 0 {
        return Err(EncodeError::EmptyCanvas {
            width: canvas.width(),
            height: canvas.height(),
        });
    }

    let width_bytes = canvas.width_bytes();
    if width_bytes > printer.width_bytes() || width_bytes > u16::MAX as usize {
        return Err(EncodeError::TooWide { width_bytes });
    }
    let rows_per_band = band_rows(width_bytes, printer.max_band_bytes)?;

    let mut bytes = Vec::with_capacity(canvas.data().len() + 64);
    bytes.extend(commands::init());

    let mut bands = 0;
    let mut start = 0;
    while start < canvas.height() {
        let end = (start + rows_per_band).min(canvas.height());
        bytes.extend(raster_band(
            width_bytes as u16,
            (end - start) as u16,
            canvas.rows(start, end),
        ));
        bands += 1;
        start = end;
    }

    bytes.extend(commands::feed_lines(codec.feed_lines));
    bytes.extend(commands::cut(codec.cut));

    Ok(PrintJob {
        id: Uuid::new_v4(),
        bytes,
        rows: canvas.height(),
        bands,
    })
}
