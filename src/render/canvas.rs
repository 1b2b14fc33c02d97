//! # Monochrome Canvas
//!
//! A 1-bit image stored exactly as the printer consumes it: row-major,
//! `ceil(width / 8)` bytes per row, MSB = leftmost dot, 1 = black.
//!
//! The canvas grows downward as layout blocks are appended; its width never
//! changes after construction.

use std::path::Path;

use image::{GrayImage, Luma};

use crate::error::KioskError;

/// Packed 1-bit canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonochromeCanvas {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl MonochromeCanvas {
    /// A white canvas of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width.div_ceil(8) * height],
        }
    }

    /// Wrap already packed raster rows. Returns `None` if the length is wrong.
    pub fn from_packed(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        (data.len() == width.div_ceil(8) * height).then_some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width_bytes(&self) -> usize {
        self.width.div_ceil(8)
    }

    /// Packed raster bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Packed bytes of rows `start..end`.
    pub fn rows(&self, start: usize, end: usize) -> &[u8] {
        let wb = self.width_bytes();
        &self.data[start * wb..end * wb]
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let byte = self.data[y * self.width_bytes() + x / 8];
        (byte >> (7 - (x % 8))) & 1 == 1
    }

    /// Set one dot. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, black: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = y * self.width_bytes() + x / 8;
        let mask = 1 << (7 - (x % 8));
        if black {
            self.data[idx] |= mask;
        } else {
            self.data[idx] &= !mask;
        }
    }

    /// Fill a rectangle with black, clipped to the canvas.
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize) {
        for yy in y..(y + h).min(self.height) {
            for xx in x..(x + w).min(self.width) {
                self.set(xx, yy, true);
            }
        }
    }

    /// Append another canvas of the same width below this one.
    pub fn append(&mut self, other: &MonochromeCanvas) {
        debug_assert_eq!(self.width, other.width);
        self.data.extend_from_slice(&other.data);
        self.height += other.height;
    }

    /// Append `rows` white rows.
    pub fn append_blank(&mut self, rows: usize) {
        self.data
            .resize(self.data.len() + rows * self.width_bytes(), 0);
        self.height += rows;
    }

    /// Number of black dots.
    pub fn count_black(&self) -> usize {
        (0..self.height)
            .map(|y| (0..self.width).filter(|&x| self.get(x, y)).count())
            .sum()
    }

    /// Render to an 8-bit grayscale image (black dots become 0).
    pub fn to_gray_image(&self) -> GrayImage {
        let mut img = GrayImage::new(self.width as u32, self.height as u32);
        for y in 0..self.height {
            for x in 0..self.width {
                let color = if self.get(x, y) { 0u8 } else { 255u8 };
                img.put_pixel(x as u32, y as u32, Luma([color]));
            }
        }
        img
    }

    /// Save as a PNG preview.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), KioskError> {
        self.to_gray_image()
            .save(path.as_ref())
            .map_err(|e| KioskError::Image(format!("Failed to save PNG: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_msb_first() {
        let mut canvas = MonochromeCanvas::new(12, 2);
        canvas.set(0, 0, true);
        canvas.set(9, 1, true);

        assert_eq!(canvas.data(), &[0x80, 0x00, 0x00, 0x40]);
        assert!(canvas.get(0, 0));
        assert!(canvas.get(9, 1));
        assert!(!canvas.get(1, 0));

        canvas.set(0, 0, false);
        assert!(!canvas.get(0, 0));
    }

    #[test]
    fn test_out_of_bounds_is_ignored() {
        let mut canvas = MonochromeCanvas::new(8, 1);
        canvas.set(8, 0, true);
        canvas.set(0, 1, true);
        assert_eq!(canvas.count_black(), 0);
        assert!(!canvas.get(100, 100));
    }

    #[test]
    fn test_append_keeps_width() {
        let mut top = MonochromeCanvas::new(16, 2);
        let mut bottom = MonochromeCanvas::new(16, 3);
        bottom.fill_rect(0, 0, 16, 3);

        top.append(&bottom);
        top.append_blank(4);

        assert_eq!(top.width(), 16);
        assert_eq!(top.height(), 9);
        assert_eq!(top.count_black(), 48);
        assert_eq!(top.rows(2, 5), &[0xFF; 6]);
    }

    #[test]
    fn test_from_packed_checks_length() {
        assert!(MonochromeCanvas::from_packed(10, 2, vec![0; 4]).is_some());
        assert!(MonochromeCanvas::from_packed(10, 2, vec![0; 3]).is_none());
    }
}
