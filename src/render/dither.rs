//! # Dithering
//!
//! Reduces a grayscale intensity buffer to the 1-bit dots a thermal printer
//! can produce. Every algorithm here is deterministic: the same intensities
//! always give the same bit pattern, which keeps print streams reproducible.
//!
//! ## Intensity Convention
//!
//! Intensities are `f32` in `[0, 1]` where **0.0 = white** (no dot) and
//! **1.0 = black** (dot printed), matching the printer's bit meaning.
//!
//! ## Algorithms
//!
//! | Method | Speed | Quality | Artifacts |
//! |--------|-------|---------|-----------|
//! | Bayer 8x8 | Fast | Good | Regular cross-hatch |
//! | Floyd-Steinberg | Slower | Better | Worms in flat areas |
//! | Atkinson | Slower | Crisp, high contrast | Blown highlights |
//! | Threshold | Fastest | Poor | Banding |
//!
//! Bayer ordered dithering is the default: it has no error accumulation, so
//! a single changed pixel never alters distant dots.
//!
//! ## Bayer Thresholds
//!
//! The 8x8 matrix in [`BAYER8`] holds 0..=63 in recursive interleaved order.
//! Values are normalised to `(value + 0.5) / 64.0` so full white never
//! prints and full black always does.
//!
//! ## Usage Example
//!
//! ```
//! use snapreceipt::render::dither::{self, DitheringAlgorithm};
//!
//! // 50% gray, 16x2 pixels
//! let data = dither::generate_raster(16, 2, |_, _| 0.5, DitheringAlgorithm::Bayer);
//! assert_eq!(data.len(), 4); // 2 bytes per row, 2 rows
//!
//! let packed = dither::pack_row(&[true, true, false, false, true, false, true, false]);
//! assert_eq!(packed, vec![0b11001010]);
//! ```

use serde::{Deserialize, Serialize};

/// Dithering algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DitheringAlgorithm {
    /// Bayer 8x8 ordered dithering
    #[default]
    Bayer,
    /// Floyd-Steinberg error diffusion
    FloydSteinberg,
    /// Atkinson error diffusion (diffuses 6/8 of the error)
    Atkinson,
    /// Plain 50% threshold
    Threshold,
}

impl DitheringAlgorithm {
    /// Parse a CLI-style name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bayer" | "ordered" => Some(Self::Bayer),
            "floyd-steinberg" | "floyd_steinberg" | "fs" => Some(Self::FloydSteinberg),
            "atkinson" => Some(Self::Atkinson),
            "threshold" | "none" => Some(Self::Threshold),
            _ => None,
        }
    }
}

/// Bayer 8x8 dithering matrix
///
/// Values range from 0-63; low values switch on first as intensity rises.
pub const BAYER8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Get the Bayer threshold for a pixel position, in (0, 1).
#[inline]
pub fn threshold(x: usize, y: usize) -> f32 {
    let matrix_value = BAYER8[y & 7][x & 7];
    (matrix_value as f32 + 0.5) / 64.0
}

/// Ordered-dither decision for one pixel.
///
/// ```
/// use snapreceipt::render::dither::should_print;
///
/// assert!(should_print(0, 0, 1.0));
/// assert!(!should_print(0, 0, 0.0));
/// ```
#[inline]
pub fn should_print(x: usize, y: usize, intensity: f32) -> bool {
    intensity > threshold(x, y)
}

/// Pack a row of boolean pixel values into bytes.
///
/// Bit 7 (MSB) is the leftmost pixel; 1 = black. A row whose length is not a
/// multiple of 8 is padded with white on the right.
pub fn pack_row(pixels: &[bool]) -> Vec<u8> {
    let num_bytes = pixels.len().div_ceil(8);
    let mut bytes = vec![0u8; num_bytes];

    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel {
            let byte_idx = i / 8;
            let bit_idx = 7 - (i % 8); // MSB first
            bytes[byte_idx] |= 1 << bit_idx;
        }
    }

    bytes
}

/// Dither a row-major intensity buffer into packed raster rows.
///
/// `intensities.len()` must equal `width * height`.
pub fn dither_buffer(
    intensities: &[f32],
    width: usize,
    height: usize,
    algorithm: DitheringAlgorithm,
) -> Vec<u8> {
    debug_assert_eq!(intensities.len(), width * height);

    let bits = match algorithm {
        DitheringAlgorithm::Bayer => intensities
            .iter()
            .enumerate()
            .map(|(i, &v)| should_print(i % width.max(1), i / width.max(1), v))
            .collect(),
        DitheringAlgorithm::Threshold => intensities.iter().map(|&v| v > 0.5).collect(),
        DitheringAlgorithm::FloydSteinberg => diffuse(intensities, width, height, &FLOYD_STEINBERG),
        DitheringAlgorithm::Atkinson => diffuse(intensities, width, height, &ATKINSON),
    };

    let mut data = Vec::with_capacity(width.div_ceil(8) * height);
    for row in bits.chunks(width.max(1)).take(height) {
        data.extend(pack_row(row));
    }
    data
}

/// Generate a dithered raster image from an intensity function.
///
/// Returns `ceil(width / 8) * height` packed bytes.
pub fn generate_raster<F>(
    width: usize,
    height: usize,
    intensity_fn: F,
    algorithm: DitheringAlgorithm,
) -> Vec<u8>
where
    F: Fn(usize, usize) -> f32,
{
    let mut buffer = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            buffer.push(intensity_fn(x, y));
        }
    }
    dither_buffer(&buffer, width, height, algorithm)
}

/// Error diffusion kernel: `(dx, dy, weight)` with a common divisor.
struct Kernel {
    taps: &'static [(isize, usize, f32)],
    divisor: f32,
}

const FLOYD_STEINBERG: Kernel = Kernel {
    taps: &[(1, 0, 7.0), (-1, 1, 3.0), (0, 1, 5.0), (1, 1, 1.0)],
    divisor: 16.0,
};

const ATKINSON: Kernel = Kernel {
    taps: &[
        (1, 0, 1.0),
        (2, 0, 1.0),
        (-1, 1, 1.0),
        (0, 1, 1.0),
        (1, 1, 1.0),
        (0, 2, 1.0),
    ],
    divisor: 8.0,
};

/// Left-to-right, top-to-bottom error diffusion.
fn diffuse(intensities: &[f32], width: usize, height: usize, kernel: &Kernel) -> Vec<bool> {
    let mut work = intensities.to_vec();
    let mut out = vec![false; width * height];

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let old = work[idx];
            let on = old > 0.5;
            out[idx] = on;
            let err = old - if on { 1.0 } else { 0.0 };

            for &(dx, dy, weight) in kernel.taps {
                let nx = x as isize + dx;
                let ny = y + dy;
                if nx < 0 || nx as usize >= width || ny >= height {
                    continue;
                }
                work[ny * width + nx as usize] += err * weight / kernel.divisor;
            }
        }
    }

    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [DitheringAlgorithm; 4] = [
        DitheringAlgorithm::Bayer,
        DitheringAlgorithm::FloydSteinberg,
        DitheringAlgorithm::Atkinson,
        DitheringAlgorithm::Threshold,
    ];

    #[test]
    fn test_bayer_matrix_values() {
        let mut seen = [false; 64];
        for row in &BAYER8 {
            for &val in row {
                assert!(val < 64, "Matrix value {} out of range", val);
                assert!(!seen[val as usize], "Duplicate value {}", val);
                seen[val as usize] = true;
            }
        }
        assert!(seen.iter().all(|&s| s), "Not all values 0-63 present");
    }

    #[test]
    fn test_threshold_periodicity() {
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(threshold(x, y), threshold(x + 8, y + 8));
            }
        }
    }

    #[test]
    fn test_extremes_for_every_algorithm() {
        for algo in ALL {
            let black = generate_raster(24, 5, |_, _| 1.0, algo);
            assert!(black.iter().all(|&b| b == 0xFF), "{:?} black", algo);

            let white = generate_raster(24, 5, |_, _| 0.0, algo);
            assert!(white.iter().all(|&b| b == 0x00), "{:?} white", algo);
        }
    }

    #[test]
    fn test_gray_distribution() {
        for algo in [DitheringAlgorithm::Bayer, DitheringAlgorithm::FloydSteinberg] {
            let data = generate_raster(64, 64, |_, _| 0.5, algo);
            let ones: u32 = data.iter().map(|b| b.count_ones()).sum();
            let total = 64 * 64;
            assert!(
                ones > total * 2 / 5 && ones < total * 3 / 5,
                "{:?}: 50% gray printed {} of {} dots",
                algo,
                ones,
                total
            );
        }
    }

    #[test]
    fn test_deterministic() {
        let gradient = |x: usize, y: usize| ((x * 7 + y * 13) % 97) as f32 / 96.0;
        for algo in ALL {
            let a = generate_raster(50, 40, gradient, algo);
            let b = generate_raster(50, 40, gradient, algo);
            assert_eq!(a, b, "{:?} is not deterministic", algo);
        }
    }

    #[test]
    fn test_pack_row_8_pixels() {
        assert_eq!(pack_row(&[true; 8]), vec![0xFF]);
        assert_eq!(pack_row(&[false; 8]), vec![0x00]);
        assert_eq!(
            pack_row(&[true, false, true, false, true, false, true, false]),
            vec![0xAA]
        );
    }

    #[test]
    fn test_pack_row_padding() {
        assert_eq!(pack_row(&[true, true, true, true]), vec![0xF0]);
        let packed = pack_row(&[true; 9]);
        assert_eq!(packed, vec![0xFF, 0x80]);
        assert_eq!(pack_row(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_odd_width_rows_are_padded() {
        let data = generate_raster(12, 3, |_, _| 1.0, DitheringAlgorithm::Threshold);
        assert_eq!(data, vec![0xFF, 0xF0, 0xFF, 0xF0, 0xFF, 0xF0]);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(DitheringAlgorithm::parse("fs"), Some(DitheringAlgorithm::FloydSteinberg));
        assert_eq!(DitheringAlgorithm::parse("Bayer"), Some(DitheringAlgorithm::Bayer));
        assert_eq!(DitheringAlgorithm::parse("sierra"), None);
    }
}
