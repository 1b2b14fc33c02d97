//! # Print Stream Decoder
//!
//! Parses the ESC/POS subset produced by [`raster::encode`](super::raster::encode)
//! back into a canvas. Used by the `inspect` command and by tests to prove
//! that a job prints exactly the bits that were composed.

use super::commands::{CutMode, DLE, EOT, ESC, GS};
use super::raster::RASTER_HEADER_LEN;
use crate::error::EncodeError;
use crate::render::MonochromeCanvas;

/// Summary of a decoded print stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedJob {
    /// Raster rows stitched from all bands; `None` if the stream had no image.
    pub canvas: Option<MonochromeCanvas>,
    pub initialized: bool,
    pub bands: usize,
    /// Total lines requested by `ESC d n` commands.
    pub feed_lines: u32,
    pub cut: Option<CutMode>,
    /// `DLE EOT n` requests found in the stream.
    pub status_queries: Vec<u8>,
}

/// Decode a byte stream.
///
/// All bands must share one width. Any byte that does not start a known
/// command is reported with its offset.
pub fn decode(bytes: &[u8]) -> Result<DecodedJob, EncodeError> {
    let mut job = DecodedJob::default();
    let mut pos = 0;

    let malformed = |offset: usize, reason: &str| EncodeError::Malformed {
        offset,
        reason: reason.to_string(),
    };
    let need = |pos: usize, n: usize, what: &str| {
        if pos + n > bytes.len() {
            Err(malformed(pos, &format!("truncated {}", what)))
        } else {
            Ok(())
        }
    };

    while pos < bytes.len() {
        match bytes[pos] {
            ESC => {
                need(pos, 2, "ESC command")?;
                match bytes[pos + 1] {
                    b'@' => {
                        job.initialized = true;
                        pos += 2;
                    }
                    b'd' => {
                        need(pos, 3, "ESC d")?;
                        job.feed_lines += bytes[pos + 2] as u32;
                        pos += 3;
                    }
                    _ => return Err(malformed(pos, "unknown ESC command")),
                }
            }
            GS => {
                need(pos, 2, "GS command")?;
                match bytes[pos + 1] {
                    b'v' => {
                        need(pos, RASTER_HEADER_LEN, "GS v 0 header")?;
                        if bytes[pos + 2] != b'0' {
                            return Err(malformed(pos, "unsupported GS v function"));
                        }
                        let width_bytes =
                            u16::from_le_bytes([bytes[pos + 4], bytes[pos + 5]]) as usize;
                        let rows = u16::from_le_bytes([bytes[pos + 6], bytes[pos + 7]]) as usize;
                        let len = width_bytes * rows;
                        let start = pos + RASTER_HEADER_LEN;
                        need(start, len, "raster data")?;

                        let band = MonochromeCanvas::from_packed(
                            width_bytes * 8,
                            rows,
                            bytes[start..start + len].to_vec(),
                        )
                        .ok_or_else(|| malformed(pos, "raster length mismatch"))?;

                        match job.canvas.as_mut() {
                            None => job.canvas = Some(band),
                            Some(canvas) if canvas.width_bytes() == width_bytes => {
                                canvas.append(&band)
                            }
                            Some(_) => return Err(malformed(pos, "band width changed")),
                        }
                        job.bands += 1;
                        pos = start + len;
                    }
                    b'V' => {
                        need(pos, 3, "GS V")?;
                        job.cut = Some(match bytes[pos + 2] {
                            0 | 48 => CutMode::Full,
                            1 | 49 => CutMode::Partial,
                            _ => return Err(malformed(pos, "unknown cut mode")),
                        });
                        pos += 3;
                    }
                    _ => return Err(malformed(pos, "unknown GS command")),
                }
            }
            DLE => {
                need(pos, 3, "DLE EOT")?;
                if bytes[pos + 1] != EOT {
                    return Err(malformed(pos, "unknown DLE command"));
                }
                job.status_queries.push(bytes[pos + 2]);
                pos += 3;
            }
            _ => return Err(malformed(pos, "unexpected byte")),
        }
    }

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecSettings;
    use crate::printer::PrinterConfig;
    use crate::protocol::commands::{self, StatusRequest};
    use crate::protocol::raster;

    #[test]
    fn test_decode_encoded_job() {
        let mut canvas = MonochromeCanvas::new(32, 7);
        canvas.fill_rect(2, 1, 20, 4);
        canvas.set(31, 6, true);

        let printer = PrinterConfig {
            name: "test".into(),
            width_dots: 32,
            dpi: 203,
            max_band_bytes: 8,
        };
        let job = raster::encode(&canvas, &printer, &CodecSettings::default()).unwrap();
        let decoded = decode(job.as_bytes()).unwrap();

        assert!(decoded.initialized);
        assert_eq!(decoded.bands, 4);
        assert_eq!(decoded.feed_lines, 6);
        assert_eq!(decoded.cut, Some(CutMode::Full));
        assert_eq!(decoded.canvas, Some(canvas));
    }

    #[test]
    fn test_status_queries_recorded() {
        let decoded = decode(&commands::status_query(StatusRequest::OfflineCause)).unwrap();
        assert_eq!(decoded.status_queries, vec![2]);
        assert!(decoded.canvas.is_none());
    }

    #[test]
    fn test_truncated_raster() {
        let mut bytes = raster::raster_band(2, 2, &[0; 4]);
        bytes.truncate(10);
        assert!(matches!(
            decode(&bytes),
            Err(EncodeError::Malformed { offset: 8, .. })
        ));
    }

    #[test]
    fn test_mixed_band_widths() {
        let mut bytes = raster::raster_band(1, 1, &[0xFF]);
        bytes.extend(raster::raster_band(2, 1, &[0xFF, 0xFF]));
        assert!(matches!(
            decode(&bytes),
            Err(EncodeError::Malformed { offset: 9, .. })
        ));
    }

    #[test]
    fn test_unknown_byte() {
        assert!(matches!(
            decode(b"hi"),
            Err(EncodeError::Malformed { offset: 0, .. })
        ));
    }
}
